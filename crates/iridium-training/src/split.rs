use crate::error::{TrainingError, TrainingResult};
use crate::layout::{DatasetLayout, Split};
use crate::progress::{SplitEvent, SplitProgress};
use crate::samples::{discover_samples, RawSample, CLASSES_FILE};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Joins the sub-folder names of a nested sample into its shard file name.
const FLAT_SEPARATOR: &str = "__";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitOptions {
    /// Fraction of images assigned to the training shard, exclusive (0, 1).
    pub ratio: f64,
    /// Fixed shuffle seed. `None` shuffles differently on every run.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self { ratio: 0.8, seed: None }
    }
}

impl SplitOptions {
    pub fn validate(&self) -> TrainingResult<()> {
        if !self.ratio.is_finite() || self.ratio <= 0.0 || self.ratio >= 1.0 {
            return Err(TrainingError::InvalidSpec(format!(
                "ratio must be strictly between 0 and 1, got {}",
                self.ratio
            )));
        }
        Ok(())
    }
}

/// Disjoint, exhaustive partition of the discovered samples.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SplitAssignment {
    pub train: Vec<RawSample>,
    pub val: Vec<RawSample>,
}

impl SplitAssignment {
    #[must_use]
    pub fn total(&self) -> usize {
        self.train.len() + self.val.len()
    }

    pub fn shards(&self) -> impl Iterator<Item = (Split, &[RawSample])> {
        [(Split::Train, self.train.as_slice()), (Split::Val, self.val.as_slice())].into_iter()
    }
}

/// Number of training samples for `total` items: `floor(total * ratio)`.
#[must_use]
pub fn train_count(total: usize, ratio: f64) -> usize {
    ((total as f64) * ratio).floor().min(total as f64) as usize
}

/// Shuffle `samples` and cut them into train/val.
#[must_use]
pub fn assign(mut samples: Vec<RawSample>, options: &SplitOptions) -> SplitAssignment {
    match options.seed {
        Some(seed) => samples.shuffle(&mut StdRng::seed_from_u64(seed)),
        None => samples.shuffle(&mut rand::thread_rng()),
    }

    let cut = train_count(samples.len(), options.ratio);
    let val = samples.split_off(cut);
    SplitAssignment { train: samples, val }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SplitReport {
    pub destination: PathBuf,
    pub train: usize,
    pub val: usize,
    pub labels_copied: usize,
    pub classes_copied: bool,
    pub assignment: SplitAssignment,
}

/// Split the images under `source` into a train/val layout rooted at `dest`.
///
/// Files already in `dest` are overwritten when names collide and left alone
/// otherwise. Images without a label are copied as-is.
pub fn split_dataset(
    source: &Path,
    dest: &Path,
    options: &SplitOptions,
    progress: &dyn SplitProgress,
) -> TrainingResult<SplitReport> {
    options.validate()?;
    if !source.is_dir() {
        return Err(TrainingError::not_found(source));
    }

    let samples = discover_samples(source)?;
    if samples.is_empty() {
        progress.on_event(SplitEvent::NoImages { source: source.to_path_buf() });
        return Ok(SplitReport { destination: dest.to_path_buf(), ..Default::default() });
    }

    let assignment = assign(samples, options);
    let planned = plan_copies(source, &assignment)?;
    progress.on_event(SplitEvent::Started {
        found: assignment.total(),
        train: assignment.train.len(),
        val: assignment.val.len(),
    });

    let layout = DatasetLayout::new(dest.to_path_buf());
    layout.ensure_dirs()?;

    let classes_src = source.join(CLASSES_FILE);
    let classes_copied = classes_src.is_file();
    if classes_copied {
        std::fs::copy(&classes_src, layout.classes_path())?;
        progress.on_event(SplitEvent::CopiedClasses);
    }

    let mut images = 0;
    let mut labels = 0;
    for (split, shard) in &planned {
        let images_dir = layout.images_dir(*split);
        let labels_dir = layout.labels_dir(*split);
        for copy in shard {
            std::fs::copy(&copy.sample.image_path, images_dir.join(&copy.image_name))?;
            images += 1;
            if let (Some(label), Some(name)) = (&copy.sample.label_path, &copy.label_name) {
                std::fs::copy(label, labels_dir.join(name))?;
                labels += 1;
            }
        }
        debug!(split = %split, count = shard.len(), "copied shard");
    }

    progress.on_event(SplitEvent::CopyFinished { images, labels });
    progress.on_event(SplitEvent::Finished { destination: dest.to_path_buf() });

    Ok(SplitReport {
        destination: dest.to_path_buf(),
        train: assignment.train.len(),
        val: assignment.val.len(),
        labels_copied: labels,
        classes_copied,
        assignment,
    })
}

struct PlannedCopy<'a> {
    sample: &'a RawSample,
    image_name: OsString,
    label_name: Option<OsString>,
}

/// Destination names for every sample, checked for collisions before anything is copied.
fn plan_copies<'a>(
    source: &Path,
    assignment: &'a SplitAssignment,
) -> TrainingResult<Vec<(Split, Vec<PlannedCopy<'a>>)>> {
    let mut taken: HashMap<OsString, &Path> = HashMap::new();
    let mut planned = Vec::with_capacity(2);
    for (split, shard) in assignment.shards() {
        let mut copies = Vec::with_capacity(shard.len());
        for sample in shard {
            let image_name = flat_name(source, &sample.image_path)?;
            if let Some(first) = taken.insert(image_name.clone(), &sample.image_path) {
                return Err(TrainingError::Validation(format!(
                    "{} and {} would both be copied as {}",
                    first.display(),
                    sample.image_path.display(),
                    image_name.to_string_lossy()
                )));
            }
            let label_name = sample.label_path.as_deref().map(|label| flat_name(source, label)).transpose()?;
            copies.push(PlannedCopy { sample, image_name, label_name });
        }
        planned.push((split, copies));
    }
    Ok(planned)
}

/// File name for `file` inside a shard: its path relative to `source` with
/// the components joined by `__`, so `x/a.jpg` becomes `x__a.jpg`.
fn flat_name(source: &Path, file: &Path) -> TrainingResult<OsString> {
    let relative = file.strip_prefix(source).unwrap_or(file);
    let mut name = OsString::new();
    for component in relative.components() {
        let Component::Normal(part) = component else {
            continue;
        };
        if !name.is_empty() {
            name.push(FLAT_SEPARATOR);
        }
        name.push(part);
    }
    if name.is_empty() {
        return Err(TrainingError::InvalidSpec(format!("not a file path: {}", file.display())));
    }
    Ok(name)
}
