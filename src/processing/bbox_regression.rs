use anyhow::{bail, Result};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use std::ops::Range;

use crate::config::BboxRegressionConfig;
use crate::processing::bbox_transform::BoxEncoder;
use crate::rcnn::bbox::bbox_overlaps;
use crate::rcnn::roidb::RoidbEntry;

/// compute_bbox_regression_targets: given rois, overlaps, gt labels, compute bounding box regression targets
///
/// * `rois` - roidb[i].boxes k * 4.
/// * `overlaps` - roidb[i].max_overlaps k.
/// * `labels` - roidb[i].max_classes k.
/// * `return` - targets[i] = [class, dx, dy, dw, dh], k * 5.
///
/// Rois below `bbox_regression_thresh` keep an all-zero row. So do examples when the
/// image has no ground-truth rois to assign them to.
pub fn compute_bbox_regression_targets<E: BoxEncoder + ?Sized>(
    rois: ArrayView2<f32>,
    overlaps: ArrayView1<f32>,
    labels: ArrayView1<usize>,
    config: &BboxRegressionConfig,
    encoder: &E,
) -> Result<Array2<f32>> {
    if rois.ncols() != 4 {
        bail!("bbox regression: rois must have 4 columns, got {}", rois.ncols());
    }
    if rois.nrows() != overlaps.len() || rois.nrows() != labels.len() {
        bail!(
            "bbox regression: len(rois) = {}, len(overlaps) = {}, len(labels) = {}",
            rois.nrows(),
            overlaps.len(),
            labels.len()
        );
    }

    let mut targets = Array2::<f32>::zeros((rois.nrows(), 5));

    let gt_inds: Vec<usize> = overlaps
        .iter()
        .enumerate()
        .filter(|&(_, &overlap)| config.is_ground_truth(overlap))
        .map(|(i, _)| i)
        .collect();

    if gt_inds.is_empty() {
        log::warn!("bbox regression: zero ground truth rois among {}", rois.nrows());
        return Ok(targets);
    }

    // Indices of examples for which we try to make predictions
    let ex_inds: Vec<usize> = overlaps
        .iter()
        .enumerate()
        .filter(|&(_, &overlap)| overlap >= config.bbox_regression_thresh)
        .map(|(i, _)| i)
        .collect();

    let ex_rois = rois.select(Axis(0), &ex_inds);
    let gt_rois = rois.select(Axis(0), &gt_inds);
    let ex_gt_overlaps = bbox_overlaps(ex_rois.view(), gt_rois.view());

    // The gt roi each example overlaps most becomes its regression target.
    let gt_assignment: Vec<usize> = ex_gt_overlaps
        .outer_iter()
        .map(argmax)
        .collect();
    let assigned_gt_rois = gt_rois.select(Axis(0), &gt_assignment);

    let deltas = encoder.encode(ex_rois.view(), assigned_gt_rois.view());
    if deltas.dim() != (ex_inds.len(), 4) {
        bail!(
            "bbox regression: encoder returned {:?}, expected ({}, 4)",
            deltas.dim(),
            ex_inds.len()
        );
    }

    for (row, &ex_idx) in ex_inds.iter().enumerate() {
        targets[[ex_idx, 0]] = labels[ex_idx] as f32;
        targets.slice_mut(s![ex_idx, 1..]).assign(&deltas.row(row));
    }

    log::debug!(
        "bbox regression: {} examples assigned to {} ground truth rois",
        ex_inds.len(),
        gt_inds.len()
    );

    Ok(targets)
}

/// First index of the maximum; `row` must not be empty.
fn argmax(row: ArrayView1<f32>) -> usize {
    let mut max_index = 0;
    let mut max_value = row[0];

    for (i, &value) in row.iter().enumerate().skip(1) {
        if value > max_value {
            max_value = value;
            max_index = i;
        }
    }

    max_index
}

/// Number of 4-wide target blocks per roi.
pub fn num_reg_classes(num_classes: usize, agnostic: bool) -> usize {
    if agnostic {
        2
    } else {
        num_classes
    }
}

/// Columns of the expanded target row that hold the deltas for `class_id`.
/// Background has none.
pub fn target_columns(class_id: usize, agnostic: bool) -> Option<Range<usize>> {
    if class_id == 0 {
        return None;
    }
    let start = if agnostic { 4 } else { 4 * class_id };
    Some(start..start + 4)
}

/// expand_bbox_regression_targets
///
/// Expand from 5 to 4 * num_classes; only the right class has non-zero bbox regression targets.
/// In agnostic mode every foreground roi lands in the single block `4..8`.
///
/// * `bbox_targets_data` - k * 5, rows of [class, dx, dy, dw, dh].
/// * `return` - (bbox_targets, bbox_inside_weights), each k * (4 * num_reg_classes).
pub fn expand_bbox_regression_targets(
    bbox_targets_data: ArrayView2<f32>,
    num_classes: usize,
    config: &BboxRegressionConfig,
) -> Result<(Array2<f32>, Array2<f32>)> {
    if bbox_targets_data.ncols() < 5 {
        bail!(
            "bbox regression: targets must have 5 columns, got {}",
            bbox_targets_data.ncols()
        );
    }

    let k = bbox_targets_data.nrows();
    let width = 4 * num_reg_classes(num_classes, config.agnostic);
    let mut bbox_targets = Array2::<f32>::zeros((k, width));
    let mut bbox_inside_weights = Array2::<f32>::zeros((k, width));
    let inside_weights = ArrayView1::from(&config.bbox_inside_weights);

    for (index, row) in bbox_targets_data.outer_iter().enumerate() {
        let cls = row[0];
        if cls <= 0.0 {
            continue;
        }
        let Some(cols) = target_columns(cls as usize, config.agnostic) else {
            continue;
        };
        if cols.end > width {
            bail!(
                "bbox regression: class {} out of range for {} classes",
                cls,
                num_classes
            );
        }
        bbox_targets
            .slice_mut(s![index, cols.clone()])
            .assign(&row.slice(s![1..5]));
        bbox_inside_weights
            .slice_mut(s![index, cols])
            .assign(&inside_weights);
    }

    Ok((bbox_targets, bbox_inside_weights))
}

/// add_bbox_regression_targets
///
/// Fill `bbox_targets` for every image, then normalize the deltas of each foreground
/// class by its mean and std. The statistics come from the config when
/// `bbox_normalization_precomputed` is set, otherwise from the targets themselves.
///
/// * `return` - (means, stds), each flattened from num_classes * 4.
pub fn add_bbox_regression_targets<E: BoxEncoder + ?Sized>(
    roidb: &mut [RoidbEntry],
    num_classes: usize,
    config: &BboxRegressionConfig,
    encoder: &E,
) -> Result<(Array1<f32>, Array1<f32>)> {
    log::info!("bbox regression: add bounding box regression targets");
    if roidb.is_empty() {
        bail!("bbox regression: empty roidb");
    }
    if num_classes < 2 {
        bail!("bbox regression: need background plus at least one class, got {}", num_classes);
    }

    for (im_i, entry) in roidb.iter_mut().enumerate() {
        let targets = compute_bbox_regression_targets(
            entry.boxes.view(),
            entry.max_overlaps.view(),
            entry.max_classes.view(),
            config,
            encoder,
        )?;
        if let Some(cls) = targets
            .column(0)
            .iter()
            .map(|&c| c as usize)
            .find(|&c| c >= num_classes)
        {
            bail!(
                "bbox regression: image {} has class {} out of range for {} classes",
                im_i,
                cls,
                num_classes
            );
        }
        entry.bbox_targets = Some(targets);
    }

    let (means, stds) = if config.bbox_normalization_precomputed {
        let means = tile_rows(&config.bbox_means, num_classes);
        let stds = tile_rows(&config.bbox_stds, num_classes);
        (means, stds)
    } else {
        let mut class_counts = Array1::<f32>::from_elem(num_classes, 1e-14);
        let mut sums = Array2::<f32>::zeros((num_classes, 4));
        let mut squared_sums = Array2::<f32>::zeros((num_classes, 4));

        for targets in roidb.iter().filter_map(|entry| entry.bbox_targets.as_ref()) {
            for row in targets.outer_iter() {
                let cls = row[0] as usize;
                if cls == 0 {
                    continue;
                }
                let deltas = row.slice(s![1..5]);
                class_counts[cls] += 1.0;
                let mut sum = sums.row_mut(cls);
                sum += &deltas;
                let mut squared = squared_sums.row_mut(cls);
                squared += &deltas.mapv(|x| x * x);
            }
        }

        let counts = class_counts.insert_axis(Axis(1));
        let means = &sums / &counts;
        let stds = (&squared_sums / &counts - &means.mapv(|x| x * x)).mapv(|x| x.max(0.0).sqrt());

        let degenerate: Vec<usize> = (1..num_classes)
            .filter(|&cls| counts[[cls, 0]] >= 1.0 && stds.row(cls).iter().any(|&std| std == 0.0))
            .collect();
        if !degenerate.is_empty() {
            log::warn!(
                "bbox regression: zero std for classes {:?}, their normalized targets are not finite",
                degenerate
            );
        }
        (means, stds)
    };

    for targets in roidb.iter_mut().filter_map(|entry| entry.bbox_targets.as_mut()) {
        for mut row in targets.outer_iter_mut() {
            let cls = row[0] as usize;
            if cls == 0 {
                continue;
            }
            let mut deltas = row.slice_mut(s![1..5]);
            deltas -= &means.row(cls);
            deltas /= &stds.row(cls);
        }
    }

    let means = Array1::from_iter(means.iter().copied());
    let stds = Array1::from_iter(stds.iter().copied());
    Ok((means, stds))
}

fn tile_rows(values: &[f32; 4], num_classes: usize) -> Array2<f32> {
    let mut tiled = Array2::<f32>::zeros((num_classes, 4));
    for mut row in tiled.outer_iter_mut() {
        row.assign(&ArrayView1::from(values));
    }
    tiled
}
