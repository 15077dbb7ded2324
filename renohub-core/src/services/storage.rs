//! Image storage on the local filesystem
//!
//! Layout: `{data_dir}/images/{kind}/{entity_id}_{filename}`

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::validation::{Field, ValidationErrors};

/// Largest accepted upload (10 MiB)
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "svg"];

pub const IMAGE_EMPTY: &str = "Image file cannot be empty";
pub const IMAGE_TOO_LARGE: &str = "Image must be less than 10MB";
pub const IMAGE_BAD_TYPE: &str = "Image must be of type png, jpg or svg";
pub const IMAGE_BAD_NAME: &str = "Image must have a file name";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Profile,
    Job,
    Room,
}

impl ImageKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            ImageKind::Profile => "profile",
            ImageKind::Job => "job",
            ImageKind::Room => "room",
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Final path component of an uploaded name, with either separator style
fn base_name(filename: &str) -> &str {
    filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim()
}

fn has_allowed_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| ALLOWED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Check an upload; returns the sanitized file name
pub fn validate_image(filename: &str, bytes: &[u8]) -> std::result::Result<String, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let name = base_name(filename);

    if name.is_empty() || name == "." || name == ".." {
        errors.add(Field::Image, IMAGE_BAD_NAME);
    } else if !has_allowed_extension(name) {
        errors.add(Field::Image, IMAGE_BAD_TYPE);
    }

    if bytes.is_empty() {
        errors.add(Field::Image, IMAGE_EMPTY);
    } else if bytes.len() > MAX_IMAGE_BYTES {
        errors.add(Field::Image, IMAGE_TOO_LARGE);
    }

    errors.into_result(name.to_string())
}

pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            root: data_dir.join("images"),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validate and write an upload, replacing a file of the same name.
    /// Returns the path relative to the image root.
    pub fn save(&self, kind: ImageKind, entity_id: Uuid, filename: &str, bytes: &[u8]) -> Result<String> {
        let name = validate_image(filename, bytes)?;

        let dir = self.root.join(kind.dir_name());
        fs::create_dir_all(&dir)
            .map_err(|e| Error::Storage(format!("Cannot create {}: {}", dir.display(), e)))?;

        let stored = format!("{}_{}", entity_id, name);
        let path = dir.join(&stored);
        fs::write(&path, bytes)
            .map_err(|e| Error::Storage(format!("Cannot write {}: {}", path.display(), e)))?;

        Ok(format!("{}/{}", kind.dir_name(), stored))
    }

    /// Absolute path of a stored image
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Store an upload in place of `previous` and commit it with `persist`
    ///
    /// `previous` is removed only once `persist` has succeeded. If `persist`
    /// fails the new file is removed instead and `previous` stays on disk.
    pub fn replace<T>(
        &self,
        kind: ImageKind,
        entity_id: Uuid,
        filename: &str,
        bytes: &[u8],
        previous: Option<&str>,
        persist: impl FnOnce(String) -> Result<T>,
    ) -> Result<T> {
        let stored = self.save(kind, entity_id, filename, bytes)?;
        let same_file = previous == Some(stored.as_str());

        match persist(stored.clone()) {
            Ok(value) => {
                if let Some(previous) = previous.filter(|_| !same_file) {
                    self.remove(previous)?;
                }
                Ok(value)
            }
            Err(e) => {
                if !same_file {
                    let _ = self.remove(&stored);
                }
                Err(e)
            }
        }
    }

    /// Remove a stored image; a missing file is not an error
    pub fn remove(&self, relative: &str) -> Result<()> {
        match fs::remove_file(self.resolve(relative)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!("Cannot remove {}: {}", relative, e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_writes_under_kind_dir() {
        let dir = tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        let id = Uuid::new_v4();

        let relative = store.save(ImageKind::Job, id, "deck.PNG", b"png-bytes").unwrap();

        assert_eq!(relative, format!("job/{}_deck.PNG", id));
        let written = fs::read(dir.path().join("images").join(&relative)).unwrap();
        assert_eq!(written, b"png-bytes");
    }

    #[test]
    fn test_path_components_are_stripped() {
        let dir = tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        let id = Uuid::new_v4();

        let relative = store
            .save(ImageKind::Profile, id, "../../etc/me.jpg", b"x")
            .unwrap();
        assert_eq!(relative, format!("profile/{}_me.jpg", id));

        let relative = store
            .save(ImageKind::Room, id, "C:\\Users\\me\\room.svg", b"<svg/>")
            .unwrap();
        assert_eq!(relative, format!("room/{}_room.svg", id));
    }

    #[test]
    fn test_rejected_uploads() {
        let errors = validate_image("notes.txt", b"text").unwrap_err();
        assert!(errors.contains(Field::Image, IMAGE_BAD_TYPE));

        let errors = validate_image("empty.png", b"").unwrap_err();
        assert!(errors.contains(Field::Image, IMAGE_EMPTY));

        let big = vec![0u8; MAX_IMAGE_BYTES + 1];
        let errors = validate_image("big.jpeg", &big).unwrap_err();
        assert!(errors.contains(Field::Image, IMAGE_TOO_LARGE));

        let errors = validate_image("photos/", b"x").unwrap_err();
        assert!(errors.contains(Field::Image, IMAGE_BAD_NAME));
    }

    #[test]
    fn test_save_replaces_and_remove_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        let id = Uuid::new_v4();

        store.save(ImageKind::Job, id, "a.png", b"one").unwrap();
        let relative = store.save(ImageKind::Job, id, "a.png", b"two").unwrap();
        assert_eq!(fs::read(store.resolve(&relative)).unwrap(), b"two");

        store.remove(&relative).unwrap();
        store.remove(&relative).unwrap();
        assert!(!store.resolve(&relative).exists());
    }

    #[test]
    fn test_replace_removes_previous_after_commit() {
        let dir = tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        let id = Uuid::new_v4();
        let old = store.save(ImageKind::Room, id, "old.png", b"old").unwrap();

        let committed = store
            .replace(ImageKind::Room, id, "new.png", b"new", Some(&old), Ok)
            .unwrap();

        assert!(store.resolve(&committed).exists());
        assert!(!store.resolve(&old).exists());
    }

    #[test]
    fn test_failed_commit_keeps_previous_image() {
        let dir = tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        let id = Uuid::new_v4();
        let old = store.save(ImageKind::Profile, id, "old.png", b"old").unwrap();

        let err = store
            .replace(ImageKind::Profile, id, "new.png", b"new", Some(&old), |_| {
                Err::<(), _>(Error::database("disk full"))
            })
            .unwrap_err();

        assert!(matches!(err, Error::Database(_)));
        assert_eq!(fs::read(store.resolve(&old)).unwrap(), b"old");
        assert!(!store
            .resolve(&format!("profile/{}_new.png", id))
            .exists());
    }
}
