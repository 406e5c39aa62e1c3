//! Affine geometry between an image and the fixed network frame
//!
//! The image is fitted into the frame by a center/scale affine that keeps the
//! aspect ratio. The same warp routine moves pixels into the frame and moves
//! logits back out of it, so both directions share one sampling convention:
//! integer coordinates are pixel centres and taps outside the source read 0.

use crate::error::{Result, WardrobeError};
use nalgebra::{Matrix3, Point2, Vector2};
use ndarray::Array3;

/// 2x3 affine transform stored homogeneously
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    matrix: Matrix3<f64>,
}

impl AffineTransform {
    #[must_use]
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
        }
    }

    /// Build from a homogeneous matrix; the last row is forced to `[0, 0, 1]`
    #[must_use]
    pub fn from_matrix(mut matrix: Matrix3<f64>) -> Self {
        matrix[(2, 0)] = 0.0;
        matrix[(2, 1)] = 0.0;
        matrix[(2, 2)] = 1.0;
        Self { matrix }
    }

    /// Solve the affine that maps each `src` point onto the matching `dst` point
    ///
    /// # Errors
    /// - The source points are collinear
    pub fn from_triangles(src: [Point2<f64>; 3], dst: [Point2<f64>; 3]) -> Result<Self> {
        let homogeneous = |p: [Point2<f64>; 3]| {
            Matrix3::new(
                p[0].x, p[1].x, p[2].x, //
                p[0].y, p[1].y, p[2].y, //
                1.0, 1.0, 1.0,
            )
        };

        let src_inv = homogeneous(src).try_inverse().ok_or_else(|| {
            WardrobeError::processing_stage_error(
                "affine",
                "source triangle is degenerate",
                None,
            )
        })?;

        Ok(Self::from_matrix(homogeneous(dst) * src_inv))
    }

    /// Map a point through the transform
    #[must_use]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let m = &self.matrix;
        (
            m[(0, 0)] * x + m[(0, 1)] * y + m[(0, 2)],
            m[(1, 0)] * x + m[(1, 1)] * y + m[(1, 2)],
        )
    }

    /// Exact algebraic inverse
    ///
    /// # Errors
    /// - The linear part is singular
    pub fn inverse(&self) -> Result<Self> {
        self.matrix
            .try_inverse()
            .map(Self::from_matrix)
            .ok_or_else(|| {
                WardrobeError::processing_stage_error(
                    "affine",
                    "transform is singular and cannot be inverted",
                    None,
                )
            })
    }

    #[must_use]
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }
}

/// Center and scale of the whole-image box, grown to the frame aspect ratio.
///
/// The box spans `(0, 0)` to `(width - 1, height - 1)`. The center is taken
/// from the uncorrected box; only the scale is widened or heightened.
/// Returns `(center, scale)` with both as `[x, y]`.
#[must_use]
pub fn aspect_corrected_box(width: u32, height: u32, aspect_ratio: f64) -> ([f64; 2], [f64; 2]) {
    let mut box_w = f64::from(width.saturating_sub(1));
    let mut box_h = f64::from(height.saturating_sub(1));
    let center = [box_w * 0.5, box_h * 0.5];

    if box_w > aspect_ratio * box_h {
        box_h = box_w / aspect_ratio;
    } else if box_w < aspect_ratio * box_h {
        box_w = box_h * aspect_ratio;
    }

    (center, [box_w, box_h])
}

fn rotate(point: Vector2<f64>, rotation_rad: f64) -> Vector2<f64> {
    let (sn, cs) = rotation_rad.sin_cos();
    Vector2::new(point.x * cs - point.y * sn, point.x * sn + point.y * cs)
}

fn third_point(a: Point2<f64>, b: Point2<f64>) -> Point2<f64> {
    let direct = a - b;
    b + Vector2::new(-direct.y, direct.x)
}

/// Affine mapping the box `(center, scale)` into a frame of `output_size`
/// `(height, width)`, optionally rotated by `rotation_deg`.
///
/// # Errors
/// - Zero-sized box (the point correspondences collapse)
pub fn get_affine_transform(
    center: [f64; 2],
    scale: [f64; 2],
    rotation_deg: f64,
    output_size: (u32, u32),
) -> Result<AffineTransform> {
    let src_w = scale[0];
    let dst_w = f64::from(output_size.1);
    let dst_h = f64::from(output_size.0);

    let rotation_rad = rotation_deg.to_radians();
    let src_dir = rotate(Vector2::new(0.0, src_w * -0.5), rotation_rad);
    let dst_dir = Vector2::new(0.0, (dst_w - 1.0) * -0.5);

    let src0 = Point2::new(center[0], center[1]);
    let src1 = src0 + src_dir;
    let dst0 = Point2::new((dst_w - 1.0) * 0.5, (dst_h - 1.0) * 0.5);
    let dst1 = dst0 + dst_dir;

    let src = [src0, src1, third_point(src0, src1)];
    let dst = [dst0, dst1, third_point(dst0, dst1)];

    AffineTransform::from_triangles(src, dst)
}

/// Everything needed to move data between one image and the network frame
#[derive(Debug, Clone)]
pub struct FrameGeometry {
    /// Image coordinates to frame coordinates
    pub forward: AffineTransform,
    /// Frame coordinates to image coordinates
    pub inverse: AffineTransform,
    pub center: [f64; 2],
    pub scale: [f64; 2],
    /// Source image as (width, height)
    pub source_size: (u32, u32),
    /// Network frame as (height, width)
    pub frame_size: (u32, u32),
}

impl FrameGeometry {
    /// Fit a `width` x `height` image into a frame of `frame_size` (height, width)
    ///
    /// # Errors
    /// - Empty image or frame
    /// - Degenerate box (1-pixel-wide or 1-pixel-tall on both axes)
    pub fn for_image(width: u32, height: u32, frame_size: (u32, u32)) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(WardrobeError::processing_stage_error(
                "geometry",
                "image has no pixels",
                Some(&format!("{}x{}", width, height)),
            ));
        }
        if width < 2 && height < 2 {
            return Err(WardrobeError::processing_stage_error(
                "geometry",
                "image too small, need at least 2 pixels along one side",
                Some(&format!("{}x{}", width, height)),
            ));
        }
        if frame_size.0 < 2 || frame_size.1 < 2 {
            return Err(WardrobeError::processing_stage_error(
                "geometry",
                "network frame must be at least 2x2",
                Some(&format!("{}x{}", frame_size.1, frame_size.0)),
            ));
        }

        let aspect_ratio = f64::from(frame_size.1) / f64::from(frame_size.0);
        let (center, scale) = aspect_corrected_box(width, height, aspect_ratio);
        let forward = get_affine_transform(center, scale, 0.0, frame_size)?;
        let inverse = forward.inverse()?;

        Ok(Self {
            forward,
            inverse,
            center,
            scale,
            source_size: (width, height),
            frame_size,
        })
    }
}

/// Warp an HWC array through `transform` (source to destination coordinates).
///
/// Each destination pixel samples the source at `transform⁻¹(x, y)` with
/// bilinear weights. Taps outside the source contribute zero, which yields a
/// constant black border.
///
/// # Errors
/// - `transform` is singular
#[allow(clippy::indexing_slicing)]
pub fn warp_affine(
    src: &Array3<f32>,
    transform: &AffineTransform,
    out_height: usize,
    out_width: usize,
) -> Result<Array3<f32>> {
    let inverse = transform.inverse()?;
    let (src_h, src_w, channels) = src.dim();
    let mut out = Array3::<f32>::zeros((out_height, out_width, channels));
    if src_h == 0 || src_w == 0 || channels == 0 {
        return Ok(out);
    }

    let max_x = src_w as i64;
    let max_y = src_h as i64;

    for y in 0..out_height {
        for x in 0..out_width {
            let (sx, sy) = inverse.apply(x as f64, y as f64);
            if !(sx > -1.0 && sy > -1.0 && sx < src_w as f64 && sy < src_h as f64) {
                continue;
            }

            let x0 = sx.floor();
            let y0 = sy.floor();
            let fx = (sx - x0) as f32;
            let fy = (sy - y0) as f32;
            let (x0, y0) = (x0 as i64, y0 as i64);

            let taps = [
                (x0, y0, (1.0 - fx) * (1.0 - fy)),
                (x0 + 1, y0, fx * (1.0 - fy)),
                (x0, y0 + 1, (1.0 - fx) * fy),
                (x0 + 1, y0 + 1, fx * fy),
            ];

            for (tx, ty, weight) in taps {
                if weight == 0.0 || tx < 0 || ty < 0 || tx >= max_x || ty >= max_y {
                    continue;
                }
                let (tx, ty) = (tx as usize, ty as usize);
                for c in 0..channels {
                    out[[y, x, c]] += weight * src[[ty, tx, c]];
                }
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: (f64, f64), b: (f64, f64), tol: f64) {
        assert!(
            (a.0 - b.0).abs() < tol && (a.1 - b.1).abs() < tol,
            "{:?} != {:?}",
            a,
            b
        );
    }

    #[test]
    fn test_transform_invertibility() {
        for rotation in [0.0, 15.0, -30.0, 90.0, 137.5] {
            let transform = get_affine_transform([320.0, 240.0], [640.0, 640.0], rotation, (473, 473))
                .unwrap();
            let inverse = transform.inverse().unwrap();

            for point in [(0.0, 0.0), (639.0, 479.0), (123.4, 56.7), (-10.0, 900.0)] {
                let forward = transform.apply(point.0, point.1);
                assert_close(inverse.apply(forward.0, forward.1), point, 1e-6);
            }

            let composed = transform.matrix() * inverse.matrix();
            assert!((composed - Matrix3::identity()).abs().max() < 1e-9);
        }
    }

    #[test]
    fn test_center_maps_to_frame_center() {
        let transform = get_affine_transform([99.5, 49.5], [199.0, 199.0], 0.0, (512, 512)).unwrap();
        assert_close(transform.apply(99.5, 49.5), (255.5, 255.5), 1e-9);
    }

    #[test]
    fn test_aspect_preservation() {
        // Landscape into a square frame: height grows to match width
        let (center, scale) = aspect_corrected_box(640, 480, 1.0);
        assert_eq!(center, [319.5, 239.5]);
        assert_eq!(scale, [639.0, 639.0]);

        // Portrait into a square frame: width grows to match height
        let (center, scale) = aspect_corrected_box(300, 801, 1.0);
        assert_eq!(center, [149.5, 400.0]);
        assert_eq!(scale, [800.0, 800.0]);

        // Non-square frame keeps the frame's aspect ratio and never shrinks
        let (_, scale) = aspect_corrected_box(101, 101, 2.0);
        assert!((scale[0] / scale[1] - 2.0).abs() < 1e-12);
        assert!(scale[0] >= 100.0 && scale[1] >= 100.0);
    }

    #[test]
    fn test_uniform_scaling_without_rotation() {
        let geometry = FrameGeometry::for_image(100, 50, (473, 473)).unwrap();
        let factor = 472.0 / 99.0;

        // Horizontal extremes land on the frame edges
        assert_close(geometry.forward.apply(0.0, 24.5), (0.0, 236.0), 1e-9);
        assert_close(geometry.forward.apply(99.0, 24.5), (472.0, 236.0), 1e-9);

        // Same factor on both axes
        let (_, top) = geometry.forward.apply(49.5, 0.0);
        assert!((236.0 - top - 24.5 * factor).abs() < 1e-9);
    }

    #[test]
    fn test_geometry_rejects_empty_input() {
        assert!(FrameGeometry::for_image(0, 10, (473, 473)).is_err());
        assert!(FrameGeometry::for_image(10, 10, (1, 473)).is_err());
    }

    #[test]
    fn test_geometry_rejects_single_pixel() {
        let err = FrameGeometry::for_image(1, 1, (473, 473)).unwrap_err();
        assert!(err.to_string().contains("image too small"), "{err}");

        // One-pixel-wide strips still define a box
        assert!(FrameGeometry::for_image(1, 40, (473, 473)).is_ok());
        assert!(FrameGeometry::for_image(40, 1, (473, 473)).is_ok());
    }

    #[test]
    fn test_singular_transform_fails() {
        let singular = AffineTransform::from_matrix(Matrix3::new(
            1.0, 2.0, 0.0, //
            2.0, 4.0, 0.0, //
            0.0, 0.0, 1.0,
        ));
        let err = singular.inverse().unwrap_err();
        assert!(matches!(err, WardrobeError::Processing(_)));
    }

    #[test]
    fn test_warp_identity() {
        let src = Array3::from_shape_fn((4, 5, 2), |(y, x, c)| (y * 10 + x + c * 100) as f32);
        let out = warp_affine(&src, &AffineTransform::identity(), 4, 5).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn test_warp_translation_has_zero_border() {
        let src = Array3::from_shape_fn((3, 3, 1), |(y, x, _)| (y * 3 + x + 1) as f32);
        let shift = AffineTransform::from_matrix(Matrix3::new(
            1.0, 0.0, 1.0, //
            0.0, 1.0, 0.0, //
            0.0, 0.0, 1.0,
        ));
        let out = warp_affine(&src, &shift, 3, 3).unwrap();

        for y in 0..3 {
            assert_eq!(out[[y, 0, 0]], 0.0);
            assert_eq!(out[[y, 1, 0]], src[[y, 0, 0]]);
            assert_eq!(out[[y, 2, 0]], src[[y, 1, 0]]);
        }
    }

    #[test]
    fn test_warp_bilinear_midpoint() {
        let mut src = Array3::<f32>::zeros((1, 2, 1));
        src[[0, 0, 0]] = 0.0;
        src[[0, 1, 0]] = 10.0;
        // Destination x samples source at x / 2
        let half = AffineTransform::from_matrix(Matrix3::new(
            2.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, //
            0.0, 0.0, 1.0,
        ));
        let out = warp_affine(&src, &half, 1, 3).unwrap();
        assert!((out[[0, 1, 0]] - 5.0).abs() < 1e-6);
        assert!((out[[0, 2, 0]] - 10.0).abs() < 1e-6);
    }
}
