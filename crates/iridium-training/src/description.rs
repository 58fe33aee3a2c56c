use crate::error::{TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Zero-indexed class names in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassMapping(BTreeMap<u32, String>);

impl ClassMapping {
    /// Parse a comma-separated class list (`"cat, dog, person"`).
    ///
    /// Names are trimmed and empty entries dropped; duplicates keep their slot.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let names = input.split(',').map(str::trim).filter(|n| !n.is_empty());
        Self(names.enumerate().map(|(i, n)| (i as u32, n.to_string())).collect())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: u32) -> Option<&str> {
        self.0.get(&index).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.values().map(String::as_str)
    }
}

/// Dataset description consumed by the detection engine (`data.yaml`).
///
/// Field order is the serialized key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDescription {
    pub path: PathBuf,
    pub train: PathBuf,
    pub val: PathBuf,
    pub names: ClassMapping,
    pub nc: usize,
}

impl DatasetDescription {
    /// Build a description that will live at `output`.
    ///
    /// `val` falls back to `train` when absent. All paths are made absolute.
    pub fn new(
        train: &Path,
        val: Option<&Path>,
        classes: ClassMapping,
        output: &Path,
    ) -> TrainingResult<Self> {
        let output = std::path::absolute(output)?;
        let base = output.parent().map(Path::to_path_buf).unwrap_or_default();
        let train = std::path::absolute(train)?;
        let val = match val {
            Some(v) => std::path::absolute(v)?,
            None => train.clone(),
        };
        let nc = classes.len();
        Ok(Self { path: base, train, val, names: classes, nc })
    }

    pub fn to_yaml(&self) -> TrainingResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Write the description to `output`, creating parent directories.
    pub fn write(&self, output: &Path) -> TrainingResult<PathBuf> {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(output, self.to_yaml()?)?;
        Ok(std::path::absolute(output)?)
    }

    pub fn read(path: &Path) -> TrainingResult<Self> {
        if !path.is_file() {
            return Err(TrainingError::not_found(path));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }
}

/// Derive the class mapping and write `data.yaml` in one step.
pub fn create_dataset_description(
    train: &Path,
    val: Option<&Path>,
    class_names: &str,
    output: &Path,
) -> TrainingResult<PathBuf> {
    let description = DatasetDescription::new(train, val, ClassMapping::parse(class_names), output)?;
    description.write(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_class_mapping_keeps_declaration_order() {
        let mapping = ClassMapping::parse("cat, dog, person");
        assert_eq!(mapping.len(), 3);
        assert_eq!(mapping.get(0), Some("cat"));
        assert_eq!(mapping.get(1), Some("dog"));
        assert_eq!(mapping.get(2), Some("person"));
        assert_eq!(mapping.names().collect::<Vec<_>>(), vec!["cat", "dog", "person"]);
    }

    #[test]
    fn test_class_mapping_drops_empty_entries() {
        let mapping = ClassMapping::parse(" zebra ,, apple ,");
        assert_eq!(mapping.names().collect::<Vec<_>>(), vec!["zebra", "apple"]);
        assert!(ClassMapping::parse(" , ").is_empty());
    }

    #[test]
    fn test_description_key_order_and_val_fallback() {
        let temp = TempDir::new().unwrap();
        let train = temp.path().join("images/train");
        let output = temp.path().join("cfg/data.yaml");

        let written = create_dataset_description(&train, None, "cat, dog, person", &output).unwrap();
        let yaml = std::fs::read_to_string(&written).unwrap();

        let keys: Vec<&str> = yaml
            .lines()
            .filter(|l| !l.starts_with(' '))
            .filter_map(|l| l.split(':').next())
            .collect();
        assert_eq!(keys, vec!["path", "train", "val", "names", "nc"]);

        let parsed = DatasetDescription::read(&written).unwrap();
        assert_eq!(parsed.val, parsed.train);
        assert_eq!(parsed.nc, 3);
        assert_eq!(parsed.names.get(2), Some("person"));
        assert_eq!(parsed.path, std::path::absolute(temp.path().join("cfg")).unwrap());
        assert!(yaml.contains("  0: cat\n  1: dog\n  2: person\n"));
    }
}
