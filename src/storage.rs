//! Object storage for uploaded media.
//!
//! Controllers only see the [`ObjectStore`] trait: a local file goes in, a
//! durable public URL comes out. [`LocalObjectStore`] keeps objects under
//! `MEDIA_ROOT/objects` and the `/media/{file}` route serves them back.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::id::ObjectId;

const OBJECTS_SUBDIR: &str = "objects";

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("upload source {} does not exist", .0.display())]
    MissingSource(PathBuf),
    #[error("storing object {name}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// A stored object: its file name inside the store and its public URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub name: String,
    pub url: String,
    pub bytes: u64,
}

pub trait ObjectStore: Send + Sync {
    /// Copies `source` into the store. `original_name` only contributes the
    /// file extension.
    fn upload(&self, source: &Path, original_name: Option<&str>) -> Result<StoredObject, UploadError>;

    /// Local path of a stored object, if this store serves files from disk
    /// and `name` is a safe object name.
    fn locate(&self, _name: &str) -> Option<PathBuf> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    pub fn new(media_root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: media_root.into().join(OBJECTS_SUBDIR),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn url_for(&self, name: &str) -> String {
        format!("{}/media/{name}", self.public_base_url)
    }
}

/// Accepts only flat names such as `66f1c0ffee0000000000abcd.mp4`.
pub fn is_safe_object_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

fn extension_of(original_name: Option<&str>) -> Option<String> {
    let ext = Path::new(original_name?).extension()?.to_str()?;
    let ext = ext.to_ascii_lowercase();
    (!ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then_some(ext)
}

impl ObjectStore for LocalObjectStore {
    fn upload(&self, source: &Path, original_name: Option<&str>) -> Result<StoredObject, UploadError> {
        if !source.is_file() {
            return Err(UploadError::MissingSource(source.to_path_buf()));
        }

        let name = match extension_of(original_name) {
            Some(ext) => format!("{}.{ext}", ObjectId::new()),
            None => ObjectId::new().to_hex(),
        };
        let io_err = |source| UploadError::Io {
            name: name.clone(),
            source,
        };

        fs::create_dir_all(&self.root).map_err(io_err)?;
        let destination = self.root.join(&name);
        let bytes = fs::copy(source, &destination).map_err(io_err)?;

        Ok(StoredObject {
            url: self.url_for(&name),
            name,
            bytes,
        })
    }

    fn locate(&self, name: &str) -> Option<PathBuf> {
        is_safe_object_name(name).then(|| self.root.join(name))
    }
}
