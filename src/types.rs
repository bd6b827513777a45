use crate::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A genomic region in 0-based half-open coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Region {
    #[serde(rename = "referenceName")]
    pub reference_name: String,
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl Region {
    pub fn start_or_min(&self) -> u64 {
        self.start.unwrap_or(0)
    }

    pub fn end_or_max(&self) -> u64 {
        self.end.unwrap_or(u64::MAX)
    }

    /// Parses `s` against the sequence names of an index.
    ///
    /// A string naming a sequence outright is taken whole, so names that
    /// contain `:` (`HLA-A*01:01`) are not split into name and position.
    pub fn parse_in<S: AsRef<str>>(s: &str, sequences: &[S]) -> Result<Self, Error> {
        let name = s.trim();
        if sequences.iter().any(|sequence| sequence.as_ref() == name) {
            return Ok(Region {
                reference_name: name.to_string(),
                start: None,
                end: None,
            });
        }
        name.parse()
    }
}

impl FromStr for Region {
    type Err = Error;

    /// Parses `chr`, `chr:beg` or `chr:beg-end` with 1-based inclusive
    /// positions, as the tabix command line accepts them.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidInput("empty region".to_string()));
        }

        let Some((name, range)) = s.rsplit_once(':') else {
            return Ok(Region {
                reference_name: s.to_string(),
                start: None,
                end: None,
            });
        };

        let range = range.replace(',', "");
        let (beg, end) = match range.split_once('-') {
            Some((beg, "")) => (parse_coordinate(beg, s)?, None),
            Some((beg, end)) => (parse_coordinate(beg, s)?, Some(parse_coordinate(end, s)?)),
            None => (parse_coordinate(&range, s)?, None),
        };

        if end.is_some_and(|end| end < beg) {
            return Err(Error::InvalidRange(format!("end before start in {s:?}")));
        }

        Ok(Region {
            reference_name: name.to_string(),
            start: Some(beg.saturating_sub(1)),
            end,
        })
    }
}

fn parse_coordinate(value: &str, region: &str) -> Result<u64, Error> {
    value
        .parse()
        .map_err(|_| Error::InvalidRange(format!("invalid position {value:?} in {region:?}")))
}

/// Query parameters for `GET /query/{id}`
#[derive(Debug, Deserialize, Default)]
pub struct QueryParams {
    #[serde(rename = "referenceName")]
    pub reference_name: Option<String>,
    pub start: Option<u64>,
    pub end: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct SequencesResponse {
    pub id: String,
    pub sequences: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FilesResponse {
    pub files: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub version: String,
    pub index_suffix: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whole_sequence() {
        let region: Region = "chr1".parse().unwrap();
        assert_eq!(region.reference_name, "chr1");
        assert_eq!((region.start, region.end), (None, None));
        assert_eq!(region.end_or_max(), u64::MAX);
    }

    #[test]
    fn test_parse_range_converts_to_zero_based() {
        let region: Region = "chr1:1,001-2,000".parse().unwrap();
        assert_eq!(region.start, Some(1000));
        assert_eq!(region.end, Some(2000));
    }

    #[test]
    fn test_parse_open_ended() {
        let region: Region = "chrX:500".parse().unwrap();
        assert_eq!((region.start, region.end), (Some(499), None));

        let region: Region = "chrX:500-".parse().unwrap();
        assert_eq!((region.start, region.end), (Some(499), None));
    }

    #[test]
    fn test_parse_name_with_colon() {
        let region: Region = "HLA-A*01:01:1-10".parse().unwrap();
        assert_eq!(region.reference_name, "HLA-A*01:01");
        assert_eq!((region.start, region.end), (Some(0), Some(10)));
    }

    #[test]
    fn test_parse_in_prefers_whole_sequence_name() {
        let sequences = ["chr1", "HLA-A*01:01"];

        let region = Region::parse_in("HLA-A*01:01", &sequences).unwrap();
        assert_eq!(region.reference_name, "HLA-A*01:01");
        assert_eq!((region.start, region.end), (None, None));

        let region = Region::parse_in("HLA-A*01:01:5-10", &sequences).unwrap();
        assert_eq!(region.reference_name, "HLA-A*01:01");
        assert_eq!((region.start, region.end), (Some(4), Some(10)));

        let region = Region::parse_in("chr1:100", &sequences).unwrap();
        assert_eq!((region.start, region.end), (Some(99), None));
    }

    #[test]
    fn test_parse_invalid() {
        assert!("".parse::<Region>().is_err());
        assert!("chr1:abc".parse::<Region>().is_err());
        assert!(matches!(
            "chr1:200-100".parse::<Region>(),
            Err(Error::InvalidRange(_))
        ));
    }
}
