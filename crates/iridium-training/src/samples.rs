use crate::error::{TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// Image extensions accepted by the splitter and the inference path (lowercase).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Extension of a YOLO label file sitting next to its image.
pub const LABEL_EXTENSION: &str = "txt";

/// Class list sidecar copied verbatim from the source root.
pub const CLASSES_FILE: &str = "classes.txt";

/// One source image plus its optional label file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawSample {
    pub image_path: PathBuf,
    pub label_path: Option<PathBuf>,
}

impl RawSample {
    /// Pair an image with the label that shares its stem, if one exists.
    #[must_use]
    pub fn pair(image_path: PathBuf) -> Self {
        let candidate = image_path.with_extension(LABEL_EXTENSION);
        let label_path = candidate.is_file().then_some(candidate);
        Self { image_path, label_path }
    }

    #[must_use]
    pub fn has_label(&self) -> bool {
        self.label_path.is_some()
    }
}

#[must_use]
pub fn is_image_file(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    let ext = ext.to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|a| *a == ext)
}

/// Recursively discover image/label pairs under `root`.
///
/// Results are sorted by path so discovery order never depends on the
/// filesystem; any randomness is introduced by the splitter alone.
pub fn discover_samples(root: &Path) -> TrainingResult<Vec<RawSample>> {
    if !root.is_dir() {
        return Err(TrainingError::not_found(root));
    }

    let mut images = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if is_image_file(entry.path()) {
            images.push(entry.into_path());
        }
    }

    images.sort();
    Ok(images.into_iter().map(RawSample::pair).collect())
}

/// Non-recursive image listing used by inference, sorted by file name.
pub fn list_images(dir: &Path) -> TrainingResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(TrainingError::not_found(dir));
    }

    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_image_file(&path) {
            images.push(path);
        }
    }

    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_extension_match_is_case_insensitive() {
        assert!(is_image_file(Path::new("a/B.JPG")));
        assert!(is_image_file(Path::new("x.Png")));
        assert!(!is_image_file(Path::new("x.txt")));
        assert!(!is_image_file(Path::new("noext")));
    }

    #[test]
    fn test_discover_pairs_labels_by_stem() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("nested")).unwrap();
        std::fs::write(root.join("a.jpg"), b"a").unwrap();
        std::fs::write(root.join("a.txt"), b"0 0.5 0.5 0.1 0.1").unwrap();
        std::fs::write(root.join("nested/b.PNG"), b"b").unwrap();
        std::fs::write(root.join("notes.md"), b"ignored").unwrap();

        let samples = discover_samples(root).unwrap();
        assert_eq!(samples.len(), 2);

        let a = samples.iter().find(|s| s.image_path.ends_with("a.jpg")).unwrap();
        assert_eq!(a.label_path.as_deref(), Some(root.join("a.txt").as_path()));

        let b = samples.iter().find(|s| s.image_path.ends_with("b.PNG")).unwrap();
        assert!(!b.has_label());
    }

    #[test]
    fn test_discover_missing_root() {
        let temp = TempDir::new().unwrap();
        let err = discover_samples(&temp.path().join("missing")).unwrap_err();
        assert!(matches!(err, TrainingError::NotFound(_)));
    }

    #[test]
    fn test_list_images_is_flat_and_sorted() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("sub")).unwrap();
        std::fs::write(root.join("b.jpg"), b"b").unwrap();
        std::fs::write(root.join("a.bmp"), b"a").unwrap();
        std::fs::write(root.join("sub/c.jpg"), b"c").unwrap();

        let images = list_images(root).unwrap();
        let names: Vec<String> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.bmp", "b.jpg"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_skips_unreadable_sub_folder() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let locked = root.join("locked");
        std::fs::create_dir_all(&locked).unwrap();
        std::fs::write(root.join("a.jpg"), b"a").unwrap();
        std::fs::write(locked.join("b.jpg"), b"b").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        let samples = discover_samples(root);
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        // Privileged users can still read the folder; either way the walk succeeds.
        let samples = samples.unwrap();
        assert!(samples.iter().any(|s| s.image_path.ends_with("a.jpg")));
        assert!((1..=2).contains(&samples.len()));
    }
}
