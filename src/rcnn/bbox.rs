use ndarray::{Array2, ArrayView2};

/// Determine overlaps between `boxes` and `query_boxes`.
///
/// * `boxes` - n * 4 bounding boxes `[x1, y1, x2, y2]`, pixel inclusive.
/// * `query_boxes` - k * 4 bounding boxes.
/// * `return` - n * k IoU overlaps, zero where the boxes do not intersect.
pub fn bbox_overlaps(boxes: ArrayView2<f32>, query_boxes: ArrayView2<f32>) -> Array2<f32> {
    let n_ = boxes.nrows();
    let k_ = query_boxes.nrows();
    let mut overlaps = Array2::<f32>::zeros((n_, k_));

    for k in 0..k_ {
        let query_box_area = (query_boxes[[k, 2]] - query_boxes[[k, 0]] + 1.0)
            * (query_boxes[[k, 3]] - query_boxes[[k, 1]] + 1.0);

        for n in 0..n_ {
            let iw = f32::min(boxes[[n, 2]], query_boxes[[k, 2]])
                - f32::max(boxes[[n, 0]], query_boxes[[k, 0]])
                + 1.0;
            if iw > 0.0 {
                let ih = f32::min(boxes[[n, 3]], query_boxes[[k, 3]])
                    - f32::max(boxes[[n, 1]], query_boxes[[k, 1]])
                    + 1.0;
                if ih > 0.0 {
                    let box_area = (boxes[[n, 2]] - boxes[[n, 0]] + 1.0)
                        * (boxes[[n, 3]] - boxes[[n, 1]] + 1.0);
                    let all_area = box_area + query_box_area - iw * ih;
                    overlaps[[n, k]] = iw * ih / all_area;
                }
            }
        }
    }

    overlaps
}
