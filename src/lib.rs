pub mod config;
pub mod processing;
pub mod rcnn;

pub use config::BboxRegressionConfig;
pub use processing::bbox_regression::{
    add_bbox_regression_targets, compute_bbox_regression_targets, expand_bbox_regression_targets,
    num_reg_classes, target_columns,
};
pub use processing::bbox_transform::{nonlinear_transform, BoxEncoder, NonlinearTransform};
pub use rcnn::bbox::bbox_overlaps;
pub use rcnn::roidb::RoidbEntry;
