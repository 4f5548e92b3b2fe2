use ndarray::{array, s, Array1, Array2};
use ndarray_npy::{read_npy, write_npy};
use tempfile::tempdir;

use rcnn_bbox_targets::{
    add_bbox_regression_targets, expand_bbox_regression_targets, BboxRegressionConfig,
    NonlinearTransform, RoidbEntry,
};

fn write_image(dir: &std::path::Path, boxes: &Array2<f32>, overlaps: &Array1<f32>, classes: &Array1<i64>) {
    write_npy(dir.join("boxes.npy"), boxes).expect("write boxes");
    write_npy(dir.join("max_overlaps.npy"), overlaps).expect("write overlaps");
    write_npy(dir.join("max_classes.npy"), classes).expect("write classes");
}

#[test]
fn loads_computes_and_saves_targets() {
    let dir = tempdir().expect("temp dir");
    let boxes = array![
        [0.0f32, 0.0, 9.0, 9.0],
        [1.0, 0.0, 9.0, 9.0],
        [40.0, 40.0, 60.0, 60.0]
    ];
    write_image(dir.path(), &boxes, &array![1.0f32, 0.8, 0.0], &array![2i64, 2, 0]);

    let entry = RoidbEntry::load_npy_dir(dir.path()).expect("load roidb entry");
    assert_eq!(entry.boxes, boxes);
    assert_eq!(entry.max_classes, array![2usize, 2, 0]);
    assert!(entry.bbox_targets.is_none());

    let mut roidb = vec![entry];
    let config = BboxRegressionConfig::default();
    add_bbox_regression_targets(&mut roidb, 3, &config, &NonlinearTransform).expect("targets");
    roidb[0].save_targets_npy(dir.path()).expect("save targets");

    let saved: Array2<f32> = read_npy(dir.path().join("bbox_targets.npy")).expect("read targets");
    assert_eq!(saved.dim(), (3, 5));
    assert_eq!(saved.column(0), array![2.0f32, 2.0, 0.0]);
    assert_eq!(saved.row(2), Array1::<f32>::zeros(5));

    let reloaded = RoidbEntry::load_npy_dir(dir.path()).expect("reload");
    assert_eq!(reloaded.bbox_targets.as_ref(), Some(&saved));

    let (expanded, weights) =
        expand_bbox_regression_targets(saved.view(), 3, &config).expect("expand");
    assert_eq!(expanded.dim(), (3, 12));
    assert_eq!(weights.slice(s![0, 8..12]), array![1.0f32, 1.0, 1.0, 1.0]);
    assert!(weights.slice(s![0, ..8]).iter().all(|&w| w == 0.0));
    assert!(weights.row(2).iter().all(|&w| w == 0.0));
}

#[test]
fn negative_class_ids_are_rejected() {
    let dir = tempdir().expect("temp dir");
    write_image(
        dir.path(),
        &array![[0.0f32, 0.0, 9.0, 9.0]],
        &array![1.0f32],
        &array![-1i64],
    );

    assert!(RoidbEntry::load_npy_dir(dir.path()).is_err());
}

#[test]
fn missing_files_are_reported() {
    let dir = tempdir().expect("temp dir");
    let err = RoidbEntry::load_npy_dir(dir.path()).unwrap_err();
    assert!(err.to_string().contains("boxes.npy"));
}
