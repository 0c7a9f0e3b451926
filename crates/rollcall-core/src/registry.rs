//! Student registry: one reference face per student, mirrored to a directory
//! of `<name>.png` files.

use crate::types::FaceImage;
use image::{GrayImage, ImageFormat};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extension used for reference images written by the registry.
pub const REFERENCE_EXTENSION: &str = "png";

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("student not found: {0}")]
    NotFound(String),
    #[error("invalid student name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// A registered student and their reference face.
#[derive(Debug, Clone)]
pub struct StudentRecord {
    pub name: String,
    pub face: FaceImage,
    /// Backing file in the reference directory.
    pub path: PathBuf,
}

/// Whether [`Registry::register`] created or overwrote a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Added,
    Replaced,
}

/// Insertion-ordered, unique-by-name set of students.
pub struct Registry {
    dir: PathBuf,
    face_size: u32,
    students: Vec<StudentRecord>,
}

impl Registry {
    /// Rebuild the registry from the reference directory, creating it if
    /// missing.
    ///
    /// Every decodable image becomes a record keyed by its file stem.
    /// Unreadable files are skipped with a warning.
    pub fn load(dir: impl Into<PathBuf>, face_size: u32) -> Result<Self, RegistryError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| RegistryError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)
            .map_err(|source| RegistryError::Io {
                path: dir.clone(),
                source,
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        let mut registry = Self {
            dir,
            face_size,
            students: Vec::with_capacity(paths.len()),
        };

        for path in paths {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                tracing::warn!(path = %path.display(), "skipping file with non-UTF-8 name");
                continue;
            };
            // Stems with surrounding whitespace would never be found again by
            // the trimmed names the menu passes in.
            if !matches!(validate_name(name), Ok(valid) if valid == name) {
                tracing::warn!(path = %path.display(), "skipping file with unusable student name");
                continue;
            }
            if registry.contains(name) {
                tracing::warn!(name, path = %path.display(), "duplicate reference image, keeping the first");
                continue;
            }

            let gray = match image::open(&path) {
                Ok(img) => img.to_luma8(),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable reference image");
                    continue;
                }
            };

            registry.students.push(StudentRecord {
                name: name.to_string(),
                face: FaceImage::normalize(&gray, face_size),
                path,
            });
        }

        tracing::info!(
            dir = %registry.dir.display(),
            count = registry.students.len(),
            "loaded reference faces"
        );
        Ok(registry)
    }

    pub fn face_size(&self) -> u32 {
        self.face_size
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&StudentRecord> {
        self.students.iter().find(|s| s.name == name)
    }

    /// All records, in registry order.
    pub fn records(&self) -> &[StudentRecord] {
        &self.students
    }

    /// Registered names, in registry order. Clone the iterator to walk the
    /// list again.
    pub fn names(&self) -> impl Iterator<Item = &str> + Clone + '_ {
        self.students.iter().map(|s| s.name.as_str())
    }

    /// Store `face` as the reference for `name`, adding the student or
    /// overwriting their existing reference.
    pub fn register(&mut self, name: &str, face: &GrayImage) -> Result<Upsert, RegistryError> {
        let name = validate_name(name)?;
        let face = FaceImage::normalize(face, self.face_size);
        let path = self.reference_path(name);
        write_reference(&path, &face)?;

        match self.students.iter_mut().find(|s| s.name == name) {
            Some(existing) => {
                if existing.path != path {
                    remove_file_if_present(&existing.path)?;
                }
                existing.face = face;
                existing.path = path;
                tracing::info!(name, "replaced reference face");
                Ok(Upsert::Replaced)
            }
            None => {
                self.students.push(StudentRecord {
                    name: name.to_string(),
                    face,
                    path,
                });
                tracing::info!(name, "registered student");
                Ok(Upsert::Added)
            }
        }
    }

    /// Replace the reference face of an already registered student.
    pub fn update(&mut self, name: &str, face: &GrayImage) -> Result<(), RegistryError> {
        let name = validate_name(name)?;
        if !self.contains(name) {
            return Err(RegistryError::NotFound(name.to_string()));
        }
        self.register(name, face).map(|_| ())
    }

    /// Remove a student and delete their reference file.
    pub fn remove(&mut self, name: &str) -> Result<StudentRecord, RegistryError> {
        let name = name.trim();
        let idx = self
            .students
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;

        remove_file_if_present(&self.students[idx].path)?;
        let record = self.students.remove(idx);
        tracing::info!(name, "deleted student");
        Ok(record)
    }

    fn reference_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{REFERENCE_EXTENSION}"))
    }
}

/// Check that `name` is usable as a file stem; returns it trimmed.
pub fn validate_name(name: &str) -> Result<&str, RegistryError> {
    let trimmed = name.trim();
    let reason = if trimmed.is_empty() {
        Some("name is empty")
    } else if trimmed.contains(|c: char| matches!(c, '/' | '\\' | '\0')) {
        Some("name must not contain path separators")
    } else if trimmed.starts_with('.') {
        Some("name must not start with '.'")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(RegistryError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(trimmed),
    }
}

fn write_reference(path: &Path, face: &FaceImage) -> Result<(), RegistryError> {
    face.as_image()
        .save_with_format(path, ImageFormat::Png)
        .map_err(|source| RegistryError::Image {
            path: path.to_path_buf(),
            source,
        })
}

fn remove_file_if_present(path: &Path) -> Result<(), RegistryError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "reference file already gone");
            Ok(())
        }
        Err(source) => Err(RegistryError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::uniform;

    fn dir_listing(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_load_creates_missing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("reference_faces");

        let registry = Registry::load(&dir, 100).unwrap();
        assert!(dir.is_dir());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_load_skips_corrupt_files() {
        let tmp = tempfile::tempdir().unwrap();
        uniform(40, 40, 90).save(tmp.path().join("alice.png")).unwrap();
        std::fs::write(tmp.path().join("bob.png"), b"definitely not a png").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), b"hello").unwrap();
        uniform(40, 40, 30).save(tmp.path().join("carol.png")).unwrap();
        std::fs::create_dir(tmp.path().join("dave.png")).unwrap();

        let registry = Registry::load(tmp.path(), 100).unwrap();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, ["alice", "carol"]);
    }

    #[test]
    fn test_load_normalizes_size() {
        let tmp = tempfile::tempdir().unwrap();
        image::DynamicImage::ImageLuma8(uniform(30, 45, 200))
            .to_rgb8()
            .save(tmp.path().join("erin.jpg"))
            .unwrap();

        let registry = Registry::load(tmp.path(), 100).unwrap();
        let erin = registry.get("erin").unwrap();
        assert_eq!(erin.face.as_image().dimensions(), (100, 100));
        assert_eq!(erin.path, tmp.path().join("erin.jpg"));
    }

    #[test]
    fn test_load_duplicate_stem_keeps_first() {
        let tmp = tempfile::tempdir().unwrap();
        uniform(10, 10, 10).save(tmp.path().join("carol.jpg")).unwrap();
        uniform(10, 10, 250).save(tmp.path().join("carol.png")).unwrap();

        let registry = Registry::load(tmp.path(), 10).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("carol").unwrap().path, tmp.path().join("carol.jpg"));
    }

    #[test]
    fn test_load_skips_padded_stems() {
        let tmp = tempfile::tempdir().unwrap();
        uniform(10, 10, 60).save(tmp.path().join(" alice.png")).unwrap();
        uniform(10, 10, 70).save(tmp.path().join("bob .png")).unwrap();

        let mut registry = Registry::load(tmp.path(), 10).unwrap();
        assert!(registry.is_empty());

        // Registering the trimmed name creates exactly one record
        registry.register(" alice ", &uniform(10, 10, 60)).unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), ["alice"]);
        assert!(tmp.path().join("alice.png").is_file());
    }

    #[test]
    fn test_register_writes_fixed_size_file() {
        let tmp = tempfile::tempdir().unwrap();
        let mut registry = Registry::load(tmp.path(), 100).unwrap();

        let outcome = registry.register("alice", &uniform(63, 81, 120)).unwrap();
        assert_eq!(outcome, Upsert::Added);

        let path = tmp.path().join("alice.png");
        let stored = image::open(&path).unwrap();
        assert_eq!((stored.width(), stored.height()), (100, 100));
        assert_eq!(registry.get("alice").unwrap().face.size(), 100);
    }

    #[test]
    fn test_register_twice_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let mut registry = Registry::load(tmp.path(), 20).unwrap();

        registry.register("alice", &uniform(20, 20, 10)).unwrap();
        let outcome = registry.register("alice", &uniform(20, 20, 200)).unwrap();

        assert_eq!(outcome, Upsert::Replaced);
        assert_eq!(registry.len(), 1);
        assert_eq!(dir_listing(tmp.path()), ["alice.png"]);
        assert_eq!(registry.get("alice").unwrap().face.as_image().get_pixel(0, 0).0, [200]);

        // Survives a reload as a single record
        let reloaded = Registry::load(tmp.path(), 20).unwrap();
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn test_register_replaces_foreign_extension() {
        let tmp = tempfile::tempdir().unwrap();
        uniform(20, 20, 10).save(tmp.path().join("bob.jpg")).unwrap();
        let mut registry = Registry::load(tmp.path(), 20).unwrap();

        registry.register("bob", &uniform(20, 20, 99)).unwrap();
        assert_eq!(dir_listing(tmp.path()), ["bob.png"]);
    }

    #[test]
    fn test_register_trims_name() {
        let tmp = tempfile::tempdir().unwrap();
        let mut registry = Registry::load(tmp.path(), 20).unwrap();
        registry.register("  frank ", &uniform(20, 20, 1)).unwrap();
        assert!(registry.contains("frank"));
    }

    #[test]
    fn test_register_rejects_bad_names() {
        let tmp = tempfile::tempdir().unwrap();
        let mut registry = Registry::load(tmp.path(), 20).unwrap();

        for name in ["", "   ", "../evil", "a/b", ".hidden"] {
            let result = registry.register(name, &uniform(20, 20, 1));
            assert!(
                matches!(result, Err(RegistryError::InvalidName { .. })),
                "{name:?} should be rejected"
            );
        }
        assert!(registry.is_empty());
        assert!(dir_listing(tmp.path()).is_empty());
    }

    #[test]
    fn test_register_missing_dir_leaves_registry_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("faces");
        let mut registry = Registry::load(&dir, 20).unwrap();
        std::fs::remove_dir(&dir).unwrap();

        let result = registry.register("alice", &uniform(20, 20, 1));
        assert!(matches!(result, Err(RegistryError::Image { .. })));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_update_unknown_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let mut registry = Registry::load(tmp.path(), 20).unwrap();

        let result = registry.update("ghost", &uniform(20, 20, 1));
        assert!(matches!(result, Err(RegistryError::NotFound(name)) if name == "ghost"));
        assert!(dir_listing(tmp.path()).is_empty());
    }

    #[test]
    fn test_update_replaces_face() {
        let tmp = tempfile::tempdir().unwrap();
        let mut registry = Registry::load(tmp.path(), 20).unwrap();
        registry.register("alice", &uniform(20, 20, 10)).unwrap();

        registry.update("alice", &uniform(20, 20, 70)).unwrap();
        assert_eq!(registry.get("alice").unwrap().face.as_image().get_pixel(5, 5).0, [70]);
    }

    #[test]
    fn test_remove_deletes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let mut registry = Registry::load(tmp.path(), 20).unwrap();
        registry.register("alice", &uniform(20, 20, 10)).unwrap();
        registry.register("bob", &uniform(20, 20, 20)).unwrap();

        let removed = registry.remove("alice").unwrap();
        assert_eq!(removed.name, "alice");
        assert_eq!(registry.names().collect::<Vec<_>>(), ["bob"]);
        assert_eq!(dir_listing(tmp.path()), ["bob.png"]);
    }

    #[test]
    fn test_remove_unknown_changes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut registry = Registry::load(tmp.path(), 20).unwrap();
        registry.register("alice", &uniform(20, 20, 10)).unwrap();

        let result = registry.remove("ghost");
        assert!(matches!(result, Err(RegistryError::NotFound(_))));
        assert_eq!(registry.len(), 1);
        assert_eq!(dir_listing(tmp.path()), ["alice.png"]);
    }

    #[test]
    fn test_names_is_restartable() {
        let tmp = tempfile::tempdir().unwrap();
        let mut registry = Registry::load(tmp.path(), 20).unwrap();
        for name in ["zoe", "adam", "mia"] {
            registry.register(name, &uniform(20, 20, 1)).unwrap();
        }

        let names = registry.names();
        let first: Vec<_> = names.clone().collect();
        let second: Vec<_> = names.collect();
        assert_eq!(first, ["zoe", "adam", "mia"]);
        assert_eq!(first, second);
    }
}
