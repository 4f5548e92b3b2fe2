use std::io::Write;

use tempfile::NamedTempFile;

use rcnn_bbox_targets::BboxRegressionConfig;

#[test]
fn loads_train_table_from_file() {
    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(
        br#"
[train]
bbox_regression_thresh = 0.6
agnostic = true
bbox_means = [0.0, 0.0, 0.0, 0.0]
bbox_stds = [0.1, 0.1, 0.25, 0.25]
gt_overlap_tolerance = 0.000001
"#,
    )
    .expect("write config");

    let cfg = BboxRegressionConfig::load(file.path()).expect("load config");
    assert_eq!(cfg.bbox_regression_thresh, 0.6);
    assert!(cfg.agnostic);
    assert_eq!(cfg.bbox_stds, [0.1, 0.1, 0.25, 0.25]);
    assert_eq!(cfg.bbox_inside_weights, [1.0, 1.0, 1.0, 1.0]);
    assert!(cfg.bbox_normalization_precomputed);
    assert!(cfg.is_ground_truth(0.9999995));
}

#[test]
fn invalid_file_names_the_path() {
    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(b"[train]\nbbox_regression_thresh = 1.5\n")
        .expect("write config");

    let err = BboxRegressionConfig::load(file.path()).unwrap_err();
    assert!(format!("{:#}", err).contains("bbox_regression_thresh"));
    assert!(err.to_string().contains(&file.path().display().to_string()));
}

#[test]
fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    assert!(BboxRegressionConfig::load(&dir.path().join("absent.toml")).is_err());
}
