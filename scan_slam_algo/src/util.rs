//! Shared math helpers and nalgebra type aliases.
//!
//! Everything here is a thin layer over [`nalgebra`]: block access on the
//! dynamically sized covariance, guarded 2×2 inversion, symmetrization and the
//! eigen-decomposition used to turn a landmark covariance into an ellipse.

use nalgebra::{DMatrix, DVector, Matrix2, SMatrix, SymmetricEigen, Vector2, Vector3};

pub use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// A point in the plane (landmark positions, scan endpoints, grid coordinates).
pub type Point = Vector2<f64>;

/// Robot pose `[x, y, θ]`.
pub type Pose = Vector3<f64>;

/// Determinants whose magnitude falls below this fraction of the squared
/// matrix norm are treated as singular.
pub const SINGULAR_TOLERANCE: f64 = 1e-12;

/// Normalize angle to [-π, π]
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle % TAU;
    if a > PI {
        a -= TAU;
    } else if a < -PI {
        a += TAU;
    }
    a
}

/// Rotation taking robot-frame vectors into the world frame.
pub fn rotation(theta: f64) -> Matrix2<f64> {
    let (s, c) = theta.sin_cos();
    Matrix2::new(c, -s, s, c)
}

/// Inverse of a 2×2 matrix, or `None` when it is (numerically) singular.
pub fn try_inverse2(m: &Matrix2<f64>) -> Option<Matrix2<f64>> {
    let det = m.determinant();
    if !det.is_finite() || det.abs() <= SINGULAR_TOLERANCE * m.norm_squared().max(f64::MIN_POSITIVE)
    {
        return None;
    }
    m.try_inverse()
}

/// Copy a fixed-size block out of a dynamic matrix.
pub fn block<const R: usize, const C: usize>(
    m: &DMatrix<f64>,
    row: usize,
    col: usize,
) -> SMatrix<f64, R, C> {
    m.fixed_view::<R, C>(row, col).into_owned()
}

/// Write a fixed-size block into a dynamic matrix.
pub fn set_block<const R: usize, const C: usize>(
    m: &mut DMatrix<f64>,
    row: usize,
    col: usize,
    value: &SMatrix<f64, R, C>,
) {
    m.fixed_view_mut::<R, C>(row, col).copy_from(value);
}

/// Replace `m` with `(m + mᵀ) / 2`.
pub fn symmetrize(m: &mut DMatrix<f64>) {
    let n = m.nrows().min(m.ncols());
    for i in 0..n {
        for j in (i + 1)..n {
            let avg = 0.5 * (m[(i, j)] + m[(j, i)]);
            m[(i, j)] = avg;
            m[(j, i)] = avg;
        }
    }
}

/// Check symmetry relative to the largest entry magnitude.
pub fn is_symmetric(m: &DMatrix<f64>, rel_tol: f64) -> bool {
    if m.nrows() != m.ncols() {
        return false;
    }
    let scale = m.amax().max(1.0);
    let n = m.nrows();
    (0..n).all(|i| (0..i).all(|j| (m[(i, j)] - m[(j, i)]).abs() <= rel_tol * scale))
}

/// Keep only the listed rows and columns of a square matrix, in order.
pub fn select_square(m: &DMatrix<f64>, keep: &[usize]) -> DMatrix<f64> {
    DMatrix::from_fn(keep.len(), keep.len(), |r, c| m[(keep[r], keep[c])])
}

/// Keep only the listed rows of a vector, in order.
pub fn select_rows(v: &DVector<f64>, keep: &[usize]) -> DVector<f64> {
    DVector::from_fn(keep.len(), |r, _| v[keep[r]])
}

/// Uncertainty ellipse of a 2D Gaussian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CovarianceEllipse {
    pub center: Point,
    /// Semi-axis along the dominant eigenvector
    pub semi_major: f64,
    pub semi_minor: f64,
    /// Orientation of the major axis (radians)
    pub angle: f64,
}

impl CovarianceEllipse {
    /// Build the `n_sigma` ellipse of a symmetric 2×2 covariance.
    pub fn new(center: Point, cov: &Matrix2<f64>, n_sigma: f64) -> Self {
        let eigen = SymmetricEigen::new(*cov);
        let (major, minor) = if eigen.eigenvalues[0] >= eigen.eigenvalues[1] {
            (0, 1)
        } else {
            (1, 0)
        };
        let axis = eigen.eigenvectors.column(major);
        Self {
            center,
            semi_major: n_sigma * eigen.eigenvalues[major].abs().sqrt(),
            semi_minor: n_sigma * eigen.eigenvalues[minor].abs().sqrt(),
            angle: axis[1].atan2(axis[0]),
        }
    }
}
