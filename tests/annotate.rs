mod common;

use common::{bed_columns, small_bed, to_strings, write_indexed};
use std::sync::Arc;
use tabixr::annotate::{Annotator, Summary, TabixAnnotator};
use tabixr::registry::Registry;
use tabixr::Error;

#[test]
fn test_count_and_column_summaries() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_indexed(dir.path(), "peaks.bed.gz", &small_bed(), &bed_columns(), 32);
    let registry = Arc::new(Registry::new());

    let mut count = TabixAnnotator::new(Arc::clone(&registry), &path, "n_peaks", Summary::Count).unwrap();
    let mut names = TabixAnnotator::new(Arc::clone(&registry), &path, "peak", Summary::Column(4))
        .unwrap()
        .with_missing("NA");

    // both annotators share one open file
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.ref_count(&path), 2);

    assert_eq!(count.name(), "n_peaks");
    assert_eq!(count.value_for("chr1", 120, 160, &[]).unwrap(), "2");
    assert_eq!(count.value_for("chr1", 260, 300, &[]).unwrap(), ".");
    assert_eq!(names.value_for("chr1", 120, 160, &[]).unwrap(), "a,b");
    assert_eq!(names.value_for("chr3", 0, 10, &[]).unwrap(), "NA");

    count.close().unwrap();
    assert_eq!(registry.ref_count(&path), 1);
    assert!(matches!(
        count.value_for("chr1", 120, 160, &[]),
        Err(Error::FileClosed(_))
    ));

    drop(names);
    assert!(registry.is_empty());
}

#[test]
fn test_chrom_aliasing_is_opt_in() {
    let dir = tempfile::tempdir().unwrap();
    let lines = to_strings(&["1\t100\t200\ta", "2\t100\t200\tb"]);
    let path = write_indexed(dir.path(), "numeric.bed.gz", &lines, &bed_columns(), 64);
    let registry = Arc::new(Registry::new());

    let mut exact = TabixAnnotator::new(Arc::clone(&registry), &path, "exact", Summary::Count).unwrap();
    let mut aliased = TabixAnnotator::new(Arc::clone(&registry), &path, "aliased", Summary::Count)
        .unwrap()
        .with_chrom_aliasing(true);

    assert_eq!(exact.value_for("chr1", 150, 160, &[]).unwrap(), ".");
    assert_eq!(aliased.value_for("chr1", 150, 160, &[]).unwrap(), "1");
    assert_eq!(aliased.value_for("2", 150, 160, &[]).unwrap(), "1");
    assert_eq!(aliased.value_for("chr3", 150, 160, &[]).unwrap(), ".");
}

#[test]
fn test_missing_column_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_indexed(dir.path(), "peaks.bed.gz", &small_bed(), &bed_columns(), 64);
    let registry = Arc::new(Registry::new());

    let mut annotator =
        TabixAnnotator::new(Arc::clone(&registry), &path, "x", Summary::Column(9)).unwrap();

    assert!(matches!(
        annotator.value_for("chr1", 0, 1000, &[]),
        Err(Error::InvalidRecord(_))
    ));
}

#[test]
fn test_annotators_are_trait_objects() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_indexed(dir.path(), "peaks.bed.gz", &small_bed(), &bed_columns(), 64);
    let registry = Arc::new(Registry::new());

    let mut annotators: Vec<Box<dyn Annotator>> = vec![
        Box::new(TabixAnnotator::new(Arc::clone(&registry), &path, "count", Summary::Count).unwrap()),
        Box::new(TabixAnnotator::new(Arc::clone(&registry), &path, "name", Summary::Column(4)).unwrap()),
    ];

    let row = ["chr2", "0", "1000"];
    let values = annotators
        .iter_mut()
        .map(|a| a.value_for(row[0], 0, 1000, &row))
        .collect::<tabixr::Result<Vec<_>>>()
        .unwrap();
    assert_eq!(values, ["1", "d"]);

    for annotator in &mut annotators {
        annotator.close().unwrap();
    }
    assert!(registry.is_empty());
}
