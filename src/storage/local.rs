use super::Storage;
use crate::tabix::INDEX_SUFFIX;
use crate::{Error, Result};
use std::path::{Path, PathBuf};

pub struct LocalStorage {
    data_dir: PathBuf,
}

impl LocalStorage {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn make_file_path(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
            return Err(Error::InvalidInput(format!("invalid id: {id:?}")));
        }
        Ok(self.data_dir.join(id))
    }
}

impl Storage for LocalStorage {
    fn resolve(&self, id: &str) -> Result<PathBuf> {
        let path = self.make_file_path(id)?;
        if !path.is_file() {
            return Err(Error::NotFound(id.to_string()));
        }

        let mut index = path.as_os_str().to_owned();
        index.push(INDEX_SUFFIX);
        if !Path::new(&index).is_file() {
            return Err(Error::IndexNotFound(PathBuf::from(index)));
        }

        Ok(path)
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.ends_with(INDEX_SUFFIX) {
                continue;
            }
            if self.resolve(&name).is_ok() {
                ids.push(name);
            }
        }
        ids.sort();
        Ok(ids)
    }
}
