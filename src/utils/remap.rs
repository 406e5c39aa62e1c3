//! Logit upsampling and inverse mapping back to image coordinates

use crate::{
    error::{Result, WardrobeError},
    types::ParsingMap,
    utils::transform::{warp_affine, FrameGeometry},
};
use ndarray::{Array2, Array3, ArrayView3, Array4, Axis};

/// Bilinearly resize an NCHW head (batch 1) to `out_height` x `out_width`
/// with aligned corners, returning HWC.
///
/// Corner pixels of the input map exactly onto corner pixels of the output.
///
/// # Errors
/// - Batch size other than 1
/// - Empty spatial dimensions
#[allow(clippy::indexing_slicing)]
pub fn resize_bilinear_align_corners(
    head: &Array4<f32>,
    out_height: usize,
    out_width: usize,
) -> Result<Array3<f32>> {
    let (batch, channels, src_h, src_w) = head.dim();
    if batch != 1 {
        return Err(WardrobeError::processing(format!(
            "Expected a single-image head, got batch size {}",
            batch
        )));
    }
    if src_h == 0 || src_w == 0 || out_height == 0 || out_width == 0 {
        return Err(WardrobeError::processing(format!(
            "Cannot resize {}x{} head to {}x{}",
            src_w, src_h, out_width, out_height
        )));
    }

    let head = head.index_axis(Axis(0), 0);
    let scale_y = (src_h as f32 - 1.0) / (out_height as f32 - 1.0).max(1.0);
    let scale_x = (src_w as f32 - 1.0) / (out_width as f32 - 1.0).max(1.0);

    let mut out = Array3::<f32>::zeros((out_height, out_width, channels));
    for y in 0..out_height {
        let src_y = (y as f32 * scale_y).min((src_h - 1) as f32);
        let y0 = src_y.floor() as usize;
        let y1 = (y0 + 1).min(src_h - 1);
        let fy = src_y.fract();

        for x in 0..out_width {
            let src_x = (x as f32 * scale_x).min((src_w - 1) as f32);
            let x0 = src_x.floor() as usize;
            let x1 = (x0 + 1).min(src_w - 1);
            let fx = src_x.fract();

            for c in 0..channels {
                out[[y, x, c]] = head[[c, y0, x0]] * (1.0 - fx) * (1.0 - fy)
                    + head[[c, y0, x1]] * fx * (1.0 - fy)
                    + head[[c, y1, x0]] * (1.0 - fx) * fy
                    + head[[c, y1, x1]] * fx * fy;
            }
        }
    }

    Ok(out)
}

/// Maps frame-resolution logits back onto the original image
pub struct LogitRemapper;

impl LogitRemapper {
    /// Warp frame logits (HWC) to the original resolution.
    ///
    /// Each original pixel `p` samples the frame at `forward(p)`; pixels whose
    /// sample falls outside the frame receive zero logits.
    ///
    /// # Errors
    /// - Logits do not have the frame's spatial size
    /// - Singular frame transform
    pub fn remap(frame_logits: &Array3<f32>, geometry: &FrameGeometry) -> Result<Array3<f32>> {
        let (frame_h, frame_w, _) = frame_logits.dim();
        let expected = (
            geometry.frame_size.0 as usize,
            geometry.frame_size.1 as usize,
        );
        if (frame_h, frame_w) != expected {
            return Err(WardrobeError::processing_stage_error(
                "remap",
                "logits do not match the network frame",
                Some(&format!(
                    "{}x{} vs {}x{}",
                    frame_w, frame_h, expected.1, expected.0
                )),
            ));
        }

        let (width, height) = geometry.source_size;
        warp_affine(
            frame_logits,
            &geometry.inverse,
            height as usize,
            width as usize,
        )
    }

    /// Per-pixel arg-max over the class axis; ties resolve to the lower index
    ///
    /// # Errors
    /// - No classes, or more classes than fit a `u8` index
    pub fn argmax(logits: &Array3<f32>) -> Result<ParsingMap> {
        Self::argmax_view(logits.view())
    }

    #[allow(clippy::indexing_slicing)]
    fn argmax_view(logits: ArrayView3<'_, f32>) -> Result<ParsingMap> {
        let (height, width, channels) = logits.dim();
        if channels == 0 || channels > usize::from(u8::MAX) + 1 {
            return Err(WardrobeError::processing(format!(
                "Cannot take arg-max over {} classes",
                channels
            )));
        }

        let mut classes = Array2::<u8>::zeros((height, width));
        for y in 0..height {
            for x in 0..width {
                let mut best = 0usize;
                let mut best_value = logits[[y, x, 0]];
                for c in 1..channels {
                    let value = logits[[y, x, c]];
                    if value > best_value {
                        best = c;
                        best_value = value;
                    }
                }
                classes[[y, x]] = best as u8;
            }
        }

        Ok(ParsingMap::new(classes))
    }
}
