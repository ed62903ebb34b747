//! Storing records as files in a directory.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use rand::prelude::*;

use super::{SaveError, Store};

const EXT: &str = "nsh";

/// One file per key, in a single directory.
///
/// Writes go to a temporary file which is then renamed over the old one, so a crash mid-save leaves either the old
/// record or the new one, never half of each.
#[derive(Debug, Clone)]
pub struct FileStore(PathBuf);

impl FileStore {
    /// Use `dir`, creating it if needed.
    pub fn open(dir: impl AsRef<Path>) -> io::Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self(dir.as_ref().into()))
    }

    fn path(&self, key: &str) -> Result<PathBuf, SaveError> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, format!("bad key {:?}", key)).into());
        }
        Ok(self.0.join(format!("{}.{}", key, EXT)))
    }
}

impl Store for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SaveError> {
        match fs::read(self.path(key)?) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), SaveError> {
        let dest = self.path(key)?;
        let tmp = self.0.join(format!(".{}.{:08x}.tmp", key, thread_rng().gen::<u32>()));
        fs::write(&tmp, value)?;
        if let Err(e) = fs::rename(&tmp, &dest) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SaveError> {
        match fs::remove_file(self.path(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn set_get_remove() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::open(dir.path().join("state")).expect("open");
        assert_eq!(store.get("session").expect("read"), None);
        store.set("session", b"abc").expect("write");
        store.set("session", b"defg").expect("overwrite");
        assert_eq!(store.get("session").expect("read"), Some(b"defg".to_vec()));
        store.remove("session").expect("remove");
        store.remove("session").expect("removing twice is fine");
        assert_eq!(store.get("session").expect("read"), None);
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).expect("open");
        store.set("ftp_session", b"x").expect("write");
        let names: Vec<_> = fs::read_dir(dir.path())
            .expect("list")
            .map(|e| e.expect("entry").file_name().into_string().expect("utf8"))
            .collect();
        assert_eq!(names, vec!["ftp_session.nsh"]);
    }

    #[test]
    fn rejects_path_like_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).expect("open");
        assert!(store.set("../escape", b"x").is_err());
        assert!(store.get("").is_err());
    }
}
