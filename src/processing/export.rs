use anyhow::{Context, Result};
use ndarray::{Array1, Array2};
use ndarray_npy::write_npy;
use std::path::{Path, PathBuf};

use crate::config::BboxRegressionConfig;
use crate::processing::bbox_regression::{add_bbox_regression_targets, expand_bbox_regression_targets};
use crate::processing::bbox_transform::BoxEncoder;
use crate::rcnn::roidb::RoidbEntry;

pub const EXPANDED_TARGETS_FILE: &str = "bbox_targets_expanded.npy";
pub const INSIDE_WEIGHTS_FILE: &str = "bbox_inside_weights.npy";
pub const MEANS_FILE: &str = "bbox_means.npy";
pub const STDS_FILE: &str = "bbox_stds.npy";

#[derive(Debug)]
pub struct ExportOptions {
    pub num_classes: usize,
    /// Also write per-class expanded targets and inside weights next to each image.
    pub expand: bool,
    /// Where the means and stds are written.
    pub out_dir: PathBuf,
}

/// Load every image directory, compute normalized targets and write them back.
///
/// Every array is computed before the first file is written, so a failing
/// image leaves all directories untouched.
pub fn export_roidb_targets<E: BoxEncoder + ?Sized>(
    images: &[PathBuf],
    config: &BboxRegressionConfig,
    encoder: &E,
    options: &ExportOptions,
) -> Result<(Array1<f32>, Array1<f32>)> {
    let mut roidb = images
        .iter()
        .map(|dir| RoidbEntry::load_npy_dir(dir))
        .collect::<Result<Vec<_>>>()?;

    let (means, stds) = add_bbox_regression_targets(&mut roidb, options.num_classes, config, encoder)?;

    let mut expanded: Vec<Option<(Array2<f32>, Array2<f32>)>> = Vec::with_capacity(roidb.len());
    for (dir, entry) in images.iter().zip(&roidb) {
        match (&entry.bbox_targets, options.expand) {
            (Some(targets), true) => expanded.push(Some(
                expand_bbox_regression_targets(targets.view(), options.num_classes, config)
                    .with_context(|| format!("expand targets for {}", dir.display()))?,
            )),
            _ => expanded.push(None),
        }
    }

    for ((dir, entry), expanded) in images.iter().zip(&roidb).zip(&expanded) {
        entry.save_targets_npy(dir)?;
        if let Some((bbox_targets, inside_weights)) = expanded {
            write_array(&dir.join(EXPANDED_TARGETS_FILE), bbox_targets)?;
            write_array(&dir.join(INSIDE_WEIGHTS_FILE), inside_weights)?;
        }
    }

    std::fs::create_dir_all(&options.out_dir)
        .with_context(|| format!("create {}", options.out_dir.display()))?;
    write_npy(options.out_dir.join(MEANS_FILE), &means).context("write bbox_means.npy")?;
    write_npy(options.out_dir.join(STDS_FILE), &stds).context("write bbox_stds.npy")?;

    log::info!("bbox regression: wrote targets for {} images", roidb.len());
    Ok((means, stds))
}

fn write_array(path: &Path, array: &Array2<f32>) -> Result<()> {
    write_npy(path, array).with_context(|| format!("write {}", path.display()))
}
