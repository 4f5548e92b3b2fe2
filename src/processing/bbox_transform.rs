use ndarray::{stack, Array2, ArrayView2, Axis, s};

/// Turns matched `(ex_rois, gt_rois)` pairs into `[dx, dy, dw, dh]` regression targets.
///
/// Both inputs are m * 4 boxes; the result must be m * 4.
pub trait BoxEncoder {
    fn encode(&self, ex_rois: ArrayView2<f32>, gt_rois: ArrayView2<f32>) -> Array2<f32>;
}

impl<F> BoxEncoder for F
where
    F: Fn(ArrayView2<f32>, ArrayView2<f32>) -> Array2<f32>,
{
    fn encode(&self, ex_rois: ArrayView2<f32>, gt_rois: ArrayView2<f32>) -> Array2<f32> {
        self(ex_rois, gt_rois)
    }
}

/// Center offsets scaled by the example size, log-space width and height ratios.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonlinearTransform;

impl BoxEncoder for NonlinearTransform {
    fn encode(&self, ex_rois: ArrayView2<f32>, gt_rois: ArrayView2<f32>) -> Array2<f32> {
        nonlinear_transform(ex_rois, gt_rois)
    }
}

pub fn nonlinear_transform(ex_rois: ArrayView2<f32>, gt_rois: ArrayView2<f32>) -> Array2<f32> {
    debug_assert_eq!(ex_rois.nrows(), gt_rois.nrows(), "inconsistent rois number");

    let ex_widths = &ex_rois.slice(s![.., 2]) - &ex_rois.slice(s![.., 0]) + 1.0;
    let ex_heights = &ex_rois.slice(s![.., 3]) - &ex_rois.slice(s![.., 1]) + 1.0;
    let ex_ctr_x = &ex_rois.slice(s![.., 0]) + &(0.5 * (&ex_widths - 1.0));
    let ex_ctr_y = &ex_rois.slice(s![.., 1]) + &(0.5 * (&ex_heights - 1.0));

    let gt_widths = &gt_rois.slice(s![.., 2]) - &gt_rois.slice(s![.., 0]) + 1.0;
    let gt_heights = &gt_rois.slice(s![.., 3]) - &gt_rois.slice(s![.., 1]) + 1.0;
    let gt_ctr_x = &gt_rois.slice(s![.., 0]) + &(0.5 * (&gt_widths - 1.0));
    let gt_ctr_y = &gt_rois.slice(s![.., 1]) + &(0.5 * (&gt_heights - 1.0));

    let targets_dx = (&gt_ctr_x - &ex_ctr_x) / (&ex_widths + 1e-14);
    let targets_dy = (&gt_ctr_y - &ex_ctr_y) / (&ex_heights + 1e-14);
    let targets_dw = (&gt_widths / &ex_widths).mapv(f32::ln);
    let targets_dh = (&gt_heights / &ex_heights).mapv(f32::ln);

    stack![Axis(1), targets_dx, targets_dy, targets_dw, targets_dh]
}
