use anyhow::Result;
use clap::Parser;
use rcnn_bbox_targets::processing::export::{export_roidb_targets, ExportOptions};
use rcnn_bbox_targets::{BboxRegressionConfig, NonlinearTransform};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "bbox_targets",
    version,
    about = "Compute bounding box regression targets for a roidb stored as .npy files"
)]
struct Args {
    /// Per-image directories holding boxes.npy, max_overlaps.npy and max_classes.npy.
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Number of classes including background.
    #[arg(long)]
    num_classes: usize,

    /// TOML file with a [train] table; defaults apply when omitted.
    #[arg(long, env = "RCNN_BBOX_CONFIG")]
    config: Option<PathBuf>,

    /// Also write per-class expanded targets and inside weights next to each image.
    #[arg(long)]
    expand: bool,

    /// Where bbox_means.npy and bbox_stds.npy are written.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => BboxRegressionConfig::load(path)?,
        None => BboxRegressionConfig::default(),
    };
    log::info!("bbox_targets starting");
    log::info!("  Images: {}", args.images.len());
    log::info!("  Classes: {}", args.num_classes);
    log::info!("  Regression thresh: {}", config.bbox_regression_thresh);
    log::info!("  Agnostic: {}", config.agnostic);

    let options = ExportOptions {
        num_classes: args.num_classes,
        expand: args.expand,
        out_dir: args.out_dir,
    };
    export_roidb_targets(&args.images, &config, &NonlinearTransform, &options)?;
    Ok(())
}
