//! Local object storage addressed by slash-separated paths such as
//! `client-maria-souza/contrato_maria_souza_1760000000.html`.

use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::error::{LawdeskError, Result};

pub struct ObjectStore {
    root: PathBuf,
}

impl ObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem location of an object. Paths may not escape the store.
    pub fn path_of(&self, object: &str) -> Result<PathBuf> {
        let relative = Path::new(object);
        let escapes = object.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(LawdeskError::PermissionDenied(format!(
                "object path '{object}' is outside storage"
            )));
        }
        Ok(self.root.join(relative))
    }

    pub fn upload(&self, object: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path_of(object)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        debug!(object, bytes = bytes.len(), "stored object");
        Ok(path)
    }

    pub fn download(&self, object: &str) -> Result<Vec<u8>> {
        let path = self.path_of(object)?;
        if !path.exists() {
            return Err(LawdeskError::ObjectNotFound(object.to_string()));
        }
        Ok(fs::read(path)?)
    }

    /// Remove an object; removing a missing object is not an error.
    pub fn delete(&self, object: &str) -> Result<()> {
        let path = self.path_of(object)?;
        if path.exists() {
            fs::remove_file(&path)?;
            debug!(object, "deleted object");
        }
        Ok(())
    }
}

/// Lowercase and replace anything but ASCII letters and digits with '_'.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_download_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new(dir.path());

        let path = store.upload("client-ana/doc.html", b"<p>oi</p>").unwrap();
        assert!(path.starts_with(dir.path()));
        assert_eq!(store.download("client-ana/doc.html").unwrap(), b"<p>oi</p>");

        store.delete("client-ana/doc.html").unwrap();
        assert!(matches!(
            store.download("client-ana/doc.html"),
            Err(LawdeskError::ObjectNotFound(_))
        ));
        store.delete("client-ana/doc.html").unwrap();
    }

    #[test]
    fn rejects_paths_outside_root() {
        let store = ObjectStore::new("/tmp/lawdesk-store");
        for bad in ["../secret", "/etc/passwd", "a/../../b", ""] {
            let err = store.path_of(bad).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::Permission, "{bad}");
        }
    }

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitize_name("Procuração Ad Judicia"), "procura__o_ad_judicia");
        assert_eq!(sanitize_name("Maria_Souza"), "maria_souza");
    }
}
