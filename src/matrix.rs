use std::ops::{Mul, MulAssign};

use crate::error::TransformError;
use crate::geometry::{Point, Size};
use crate::trig;

/// A 2D affine transform in homogeneous coordinates.
///
/// Stored row-major, with the translation in the last column. For transforms built from the
/// provided constructors the bottom row is always `[0, 0, 1]`, and products of such transforms
/// keep it that way.
///
/// `a * b` is the transform that applies `b` first and `a` second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix3(pub [[f32; 3]; 3]);

impl Default for Matrix3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix3 {
    pub const IDENTITY: Self = Self([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);

    pub fn translation(tx: f32, ty: f32) -> Self {
        Self([[1.0, 0.0, tx], [0.0, 1.0, ty], [0.0, 0.0, 1.0]])
    }

    pub fn scaling(sx: f32, sy: f32) -> Self {
        Self([[sx, 0.0, 0.0], [0.0, sy, 0.0], [0.0, 0.0, 1.0]])
    }

    /// Counter-clockwise rotation by `angle` radians (clockwise on a y-down screen).
    pub fn rotation(angle: f32) -> Self {
        let (s, c) = (trig::sin(angle), trig::cos(angle));
        Self([[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]])
    }

    /// Shear with `kx` and `ky` factors. Callers holding skew angles pass their tangents.
    pub fn skew(kx: f32, ky: f32) -> Self {
        Self([[1.0, kx, 0.0], [ky, 1.0, 0.0], [0.0, 0.0, 1.0]])
    }

    /// Maps a `size`-sized area whose top-left corner sits at `source_origin` onto clip space.
    ///
    /// Root targets are presented top-left first, so their y axis is flipped; nested targets
    /// keep a bottom-left origin.
    pub fn to_clip_space(size: Size<f32>, source_origin: Point<f32>, root: bool) -> Self {
        let (sy, ty) = if root { (-2.0, 1.0) } else { (2.0, -1.0) };

        let projection = Self([
            [2.0 / size.width, 0.0, -1.0],
            [0.0, sy / size.height, ty],
            [0.0, 0.0, 1.0],
        ]);

        projection * Self::translation(-source_origin.x, -source_origin.y)
    }

    pub fn translation_part(&self) -> Point<f32> {
        Point::new(self.0[0][2], self.0[1][2])
    }

    pub fn determinant(&self) -> f32 {
        let [[a, b, c], [d, e, f], [g, h, i]] = self.0;
        -c * e * g + b * f * g + c * d * h - a * f * h - b * d * i + a * e * i
    }

    /// Closed-form inverse via the adjugate.
    ///
    /// Returns [`TransformError::Singular`] when the determinant is too close to zero to divide
    /// by, e.g. for a node scaled to zero.
    pub fn inverse(&self) -> Result<Self, TransformError> {
        let determinant = self.determinant();
        if !determinant.is_finite() || determinant.abs() <= f32::EPSILON {
            return Err(TransformError::Singular { determinant });
        }

        let [[a, b, c], [d, e, f], [g, h, i]] = self.0;
        let inv = 1.0 / determinant;

        Ok(Self([
            [
                (e * i - f * h) * inv,
                (c * h - b * i) * inv,
                (b * f - c * e) * inv,
            ],
            [
                (f * g - d * i) * inv,
                (a * i - c * g) * inv,
                (c * d - a * f) * inv,
            ],
            [
                (d * h - e * g) * inv,
                (b * g - a * h) * inv,
                (a * e - b * d) * inv,
            ],
        ]))
    }

    pub fn transform_point(&self, point: Point<f32>) -> Point<f32> {
        let m = &self.0;
        Point::new(
            m[0][0] * point.x + m[0][1] * point.y + m[0][2],
            m[1][0] * point.x + m[1][1] * point.y + m[1][2],
        )
    }

    /// Column-major layout padded to 16-byte columns, as WGSL expects a `mat3x3<f32>` uniform.
    pub fn to_padded_columns(&self) -> [[f32; 4]; 3] {
        let m = &self.0;
        [
            [m[0][0], m[1][0], m[2][0], 0.0],
            [m[0][1], m[1][1], m[2][1], 0.0],
            [m[0][2], m[1][2], m[2][2], 0.0],
        ]
    }

    pub fn approx_eq(&self, other: &Matrix3, tolerance: f32) -> bool {
        self.0
            .iter()
            .flatten()
            .zip(other.0.iter().flatten())
            .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

impl Mul for Matrix3 {
    type Output = Matrix3;

    fn mul(self, rhs: Matrix3) -> Matrix3 {
        let mut out = [[0.0f32; 3]; 3];
        for (row, out_row) in out.iter_mut().enumerate() {
            for (col, cell) in out_row.iter_mut().enumerate() {
                *cell = (0..3).map(|k| self.0[row][k] * rhs.0[k][col]).sum();
            }
        }
        Matrix3(out)
    }
}

impl MulAssign for Matrix3 {
    fn mul_assign(&mut self, rhs: Matrix3) {
        *self = *self * rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn assert_point_approximately_equal(actual: Point<f32>, expected: Point<f32>) {
        assert!(
            (actual.x - expected.x).abs() < 1e-4 && (actual.y - expected.y).abs() < 1e-4,
            "expected {expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn product_applies_right_operand_first() {
        let translate_then_scale = Matrix3::scaling(2.0, 2.0) * Matrix3::translation(1.0, 0.0);
        assert_point_approximately_equal(
            translate_then_scale.transform_point(Point::new(0.0, 0.0)),
            Point::new(2.0, 0.0),
        );
    }

    #[test]
    fn rotation_by_quarter_turn_maps_x_axis_to_y_axis() {
        let rotated = Matrix3::rotation(FRAC_PI_2).transform_point(Point::new(1.0, 0.0));
        assert_point_approximately_equal(rotated, Point::new(0.0, 1.0));
    }

    #[test]
    fn skew_shears_each_axis_by_the_other() {
        let sheared = Matrix3::skew(0.5, 0.25).transform_point(Point::new(2.0, 4.0));
        assert_point_approximately_equal(sheared, Point::new(4.0, 4.5));
    }

    #[test]
    fn inverse_times_matrix_is_identity() {
        let matrix = Matrix3::skew(0.1, -0.3)
            * Matrix3::translation(15.0, -4.0)
            * Matrix3::rotation(0.7)
            * Matrix3::scaling(3.0, 0.5);
        let inverse = matrix.inverse().unwrap();

        assert!((inverse * matrix).approx_eq(&Matrix3::IDENTITY, 1e-5));
        assert!((matrix * inverse).approx_eq(&Matrix3::IDENTITY, 1e-5));
    }

    #[test]
    fn transform_then_inverse_returns_the_point() {
        let matrix = Matrix3::translation(-20.0, 8.0) * Matrix3::rotation(1.2);
        let point = Point::new(13.0, -7.5);

        let round_trip = matrix
            .inverse()
            .unwrap()
            .transform_point(matrix.transform_point(point));
        assert_point_approximately_equal(round_trip, point);
    }

    #[test]
    fn zero_scale_is_not_invertible() {
        let result = Matrix3::scaling(0.0, 1.0).inverse();
        assert!(matches!(
            result,
            Err(TransformError::Singular { determinant }) if determinant == 0.0
        ));
    }

    #[test]
    fn determinant_of_scaling_is_product_of_factors() {
        assert_eq!(Matrix3::scaling(2.0, 3.0).determinant(), 6.0);
        assert_eq!(Matrix3::IDENTITY.determinant(), 1.0);
    }

    #[test]
    fn root_clip_space_maps_origin_to_top_left() {
        let projection =
            Matrix3::to_clip_space(Size::new(800.0, 600.0), Point::new(0.0, 0.0), true);
        assert_point_approximately_equal(
            projection.transform_point(Point::new(0.0, 0.0)),
            Point::new(-1.0, 1.0),
        );
        assert_point_approximately_equal(
            projection.transform_point(Point::new(800.0, 600.0)),
            Point::new(1.0, -1.0),
        );
    }

    #[test]
    fn nested_clip_space_maps_origin_to_bottom_left() {
        let projection =
            Matrix3::to_clip_space(Size::new(800.0, 600.0), Point::new(0.0, 0.0), false);
        assert_point_approximately_equal(
            projection.transform_point(Point::new(0.0, 0.0)),
            Point::new(-1.0, -1.0),
        );
    }

    #[test]
    fn clip_space_subtracts_source_origin() {
        let projection =
            Matrix3::to_clip_space(Size::new(100.0, 100.0), Point::new(50.0, 50.0), false);
        assert_point_approximately_equal(
            projection.transform_point(Point::new(50.0, 50.0)),
            Point::new(-1.0, -1.0),
        );
    }

    #[test]
    fn padded_columns_are_column_major() {
        let columns = Matrix3::translation(3.0, 4.0).to_padded_columns();
        assert_eq!(columns[2], [3.0, 4.0, 1.0, 0.0]);
        assert_eq!(columns[0], [1.0, 0.0, 0.0, 0.0]);
    }
}
