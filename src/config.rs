use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_BBOX_REGRESSION_THRESH: f32 = 0.5;
const DEFAULT_BBOX_INSIDE_WEIGHTS: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
const DEFAULT_BBOX_MEANS: [f32; 4] = [0.0, 0.0, 0.0, 0.0];
const DEFAULT_BBOX_STDS: [f32; 4] = [0.1, 0.1, 0.2, 0.2];

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    train: Option<TrainConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct TrainConfigFile {
    bbox_regression_thresh: Option<f32>,
    agnostic: Option<bool>,
    bbox_inside_weights: Option<Vec<f32>>,
    bbox_normalization_precomputed: Option<bool>,
    bbox_means: Option<Vec<f32>>,
    bbox_stds: Option<Vec<f32>>,
    gt_overlap_tolerance: Option<f32>,
}

/// Training constants consumed by the bbox regression target functions.
#[derive(Debug, Clone, PartialEq)]
pub struct BboxRegressionConfig {
    /// Minimum max-overlap for a roi to receive regression targets, in (0, 1].
    pub bbox_regression_thresh: f32,
    /// Regress foreground vs background only, instead of one block per class.
    pub agnostic: bool,
    pub bbox_inside_weights: [f32; 4],
    pub bbox_normalization_precomputed: bool,
    pub bbox_means: [f32; 4],
    pub bbox_stds: [f32; 4],
    /// Rois with `max_overlap >= 1.0 - gt_overlap_tolerance` are ground truth.
    pub gt_overlap_tolerance: f32,
}

impl Default for BboxRegressionConfig {
    fn default() -> Self {
        BboxRegressionConfig {
            bbox_regression_thresh: DEFAULT_BBOX_REGRESSION_THRESH,
            agnostic: false,
            bbox_inside_weights: DEFAULT_BBOX_INSIDE_WEIGHTS,
            bbox_normalization_precomputed: true,
            bbox_means: DEFAULT_BBOX_MEANS,
            bbox_stds: DEFAULT_BBOX_STDS,
            gt_overlap_tolerance: 0.0,
        }
    }
}

impl BboxRegressionConfig {
    /// Read a TOML file with an optional `[train]` table; absent keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(raw)?;
        let cfg = Self::from_file(file.train.unwrap_or_default())?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: TrainConfigFile) -> Result<Self> {
        let defaults = Self::default();
        Ok(BboxRegressionConfig {
            bbox_regression_thresh: file
                .bbox_regression_thresh
                .unwrap_or(defaults.bbox_regression_thresh),
            agnostic: file.agnostic.unwrap_or(defaults.agnostic),
            bbox_inside_weights: match file.bbox_inside_weights {
                Some(v) => four("bbox_inside_weights", v)?,
                None => defaults.bbox_inside_weights,
            },
            bbox_normalization_precomputed: file
                .bbox_normalization_precomputed
                .unwrap_or(defaults.bbox_normalization_precomputed),
            bbox_means: match file.bbox_means {
                Some(v) => four("bbox_means", v)?,
                None => defaults.bbox_means,
            },
            bbox_stds: match file.bbox_stds {
                Some(v) => four("bbox_stds", v)?,
                None => defaults.bbox_stds,
            },
            gt_overlap_tolerance: file
                .gt_overlap_tolerance
                .unwrap_or(defaults.gt_overlap_tolerance),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.bbox_regression_thresh > 0.0 && self.bbox_regression_thresh <= 1.0) {
            bail!(
                "bbox_regression_thresh must be in (0, 1], got {}",
                self.bbox_regression_thresh
            );
        }
        if !(0.0..1.0).contains(&self.gt_overlap_tolerance) {
            bail!(
                "gt_overlap_tolerance must be in [0, 1), got {}",
                self.gt_overlap_tolerance
            );
        }
        if self.bbox_stds.iter().any(|&s| !(s > 0.0)) {
            bail!("bbox_stds must be positive, got {:?}", self.bbox_stds);
        }
        Ok(())
    }

    /// Whether a roi with this max overlap is a ground-truth box injected among the proposals.
    pub fn is_ground_truth(&self, max_overlap: f32) -> bool {
        max_overlap >= 1.0 - self.gt_overlap_tolerance
    }
}

fn four(name: &str, values: Vec<f32>) -> Result<[f32; 4]> {
    match <[f32; 4]>::try_from(values) {
        Ok(arr) => Ok(arr),
        Err(v) => bail!("{} needs 4 values, got {}", name, v.len()),
    }
}

#[cfg(test)]
mod tests {
    use crate::config::BboxRegressionConfig;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = BboxRegressionConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, BboxRegressionConfig::default());
    }

    #[test]
    fn train_table_overrides_defaults() {
        let cfg = BboxRegressionConfig::from_toml_str(
            r#"
            [train]
            bbox_regression_thresh = 0.7
            agnostic = true
            bbox_inside_weights = [1.0, 1.0, 0.5, 0.5]
            bbox_normalization_precomputed = false
            "#,
        )
        .unwrap();

        assert_eq!(cfg.bbox_regression_thresh, 0.7);
        assert!(cfg.agnostic);
        assert_eq!(cfg.bbox_inside_weights, [1.0, 1.0, 0.5, 0.5]);
        assert!(!cfg.bbox_normalization_precomputed);
        assert_eq!(cfg.bbox_stds, [0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn rejects_bad_values() {
        let err = BboxRegressionConfig::from_toml_str("[train]\nbbox_regression_thresh = 0.0\n")
            .unwrap_err();
        assert!(err.to_string().contains("bbox_regression_thresh"));

        let err = BboxRegressionConfig::from_toml_str("[train]\nbbox_means = [0.0, 0.0]\n")
            .unwrap_err();
        assert!(err.to_string().contains("4 values"));

        let err = BboxRegressionConfig::from_toml_str("[train]\nbbox_stds = [0.1, 0.0, 0.2, 0.2]\n")
            .unwrap_err();
        assert!(err.to_string().contains("bbox_stds"));
    }

    #[test]
    fn ground_truth_marker() {
        let exact = BboxRegressionConfig::default();
        assert!(exact.is_ground_truth(1.0));
        assert!(!exact.is_ground_truth(0.9999999));

        let loose = BboxRegressionConfig {
            gt_overlap_tolerance: 1e-4,
            ..BboxRegressionConfig::default()
        };
        assert!(loose.is_ground_truth(0.99995));
        assert!(!loose.is_ground_truth(0.99));
    }
}
