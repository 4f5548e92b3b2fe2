use anyhow::{Context, Result};
use ndarray::{Array1, Array2};
use ndarray_npy::{read_npy, write_npy};
use std::path::Path;

pub const BOXES_FILE: &str = "boxes.npy";
pub const MAX_OVERLAPS_FILE: &str = "max_overlaps.npy";
pub const MAX_CLASSES_FILE: &str = "max_classes.npy";
pub const BBOX_TARGETS_FILE: &str = "bbox_targets.npy";

/// Per-image proposals with their best ground-truth overlap and class.
#[derive(Debug, Clone)]
pub struct RoidbEntry {
    pub boxes: Array2<f32>,
    pub max_overlaps: Array1<f32>,
    pub max_classes: Array1<usize>,
    /// k * 5 rows of [class, dx, dy, dw, dh], filled by `add_bbox_regression_targets`.
    pub bbox_targets: Option<Array2<f32>>,
}

impl RoidbEntry {
    pub fn new(boxes: Array2<f32>, max_overlaps: Array1<f32>, max_classes: Array1<usize>) -> Self {
        RoidbEntry {
            boxes,
            max_overlaps,
            max_classes,
            bbox_targets: None,
        }
    }

    /// Load `boxes.npy` (f32, k * 4), `max_overlaps.npy` (f32, k) and `max_classes.npy` (i64, k).
    /// A `bbox_targets.npy` in the same directory is picked up when present.
    pub fn load_npy_dir(dir: &Path) -> Result<Self> {
        let boxes: Array2<f32> = read_npy(dir.join(BOXES_FILE))
            .with_context(|| format!("read {}", dir.join(BOXES_FILE).display()))?;
        let max_overlaps: Array1<f32> = read_npy(dir.join(MAX_OVERLAPS_FILE))
            .with_context(|| format!("read {}", dir.join(MAX_OVERLAPS_FILE).display()))?;
        let classes: Array1<i64> = read_npy(dir.join(MAX_CLASSES_FILE))
            .with_context(|| format!("read {}", dir.join(MAX_CLASSES_FILE).display()))?;

        let max_classes = classes
            .iter()
            .map(|&c| usize::try_from(c).with_context(|| format!("negative class id {}", c)))
            .collect::<Result<Array1<usize>>>()?;

        let targets_path = dir.join(BBOX_TARGETS_FILE);
        let bbox_targets = if targets_path.exists() {
            let targets: Array2<f32> = read_npy(&targets_path)
                .with_context(|| format!("read {}", targets_path.display()))?;
            Some(targets)
        } else {
            None
        };

        Ok(RoidbEntry {
            boxes,
            max_overlaps,
            max_classes,
            bbox_targets,
        })
    }

    /// Write `bbox_targets.npy`; does nothing when targets were never computed.
    pub fn save_targets_npy(&self, dir: &Path) -> Result<()> {
        if let Some(targets) = &self.bbox_targets {
            let path = dir.join(BBOX_TARGETS_FILE);
            write_npy(&path, targets).with_context(|| format!("write {}", path.display()))?;
        }
        Ok(())
    }
}
