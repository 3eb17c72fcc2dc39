//! Linear 8-point essential matrix estimation.

use std::cmp::Ordering;

use nalgebra::{DMatrix, Matrix3, Point2, Vector3};

use crate::EpipolarError;

/// Eight-point essential matrix from normalized correspondences.
///
/// Each pair contributes the row of the epipolar constraint `x2^T E x1 = 0`.
/// The solution is the right singular vector of the stacked constraint matrix
/// with the smallest singular value, projected onto the essential manifold
/// (singular values `1, 1, 0`).
///
/// `min_singular_ratio` guards against configurations whose null space is not
/// one-dimensional (coplanar targets, pure rotation, repeated rays): the
/// second-smallest singular value divided by the largest must reach it.
pub fn essential_8point(
    x1: &[Point2<f64>],
    x2: &[Point2<f64>],
    min_singular_ratio: f64,
) -> Result<Matrix3<f64>, EpipolarError> {
    if x1.len() != x2.len() {
        return Err(EpipolarError::LengthMismatch {
            first: x1.len(),
            second: x2.len(),
        });
    }
    if x1.len() < 8 {
        return Err(EpipolarError::InsufficientCorrespondences {
            got: x1.len(),
            required: 8,
        });
    }

    // Thin SVD of an 8x9 system drops the null vector, pad to square.
    let rows = x1.len().max(9);
    let mut a = DMatrix::<f64>::zeros(rows, 9);
    for (i, (p1, p2)) in x1.iter().zip(x2.iter()).enumerate() {
        let (u1, v1) = (p1.x, p1.y);
        let (u2, v2) = (p2.x, p2.y);
        let row = [
            u2 * u1,
            u2 * v1,
            u2,
            v2 * u1,
            v2 * v1,
            v2,
            u1,
            v1,
            1.0,
        ];
        for (j, value) in row.into_iter().enumerate() {
            a[(i, j)] = value;
        }
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t.ok_or(EpipolarError::SvdFailed)?;
    let sv = svd.singular_values;

    let mut order: Vec<usize> = (0..sv.len()).collect();
    order.sort_by(|&i, &j| sv[i].partial_cmp(&sv[j]).unwrap_or(Ordering::Equal));
    let smallest = order[0];
    let largest = sv[order[order.len() - 1]];
    if !largest.is_finite() || largest <= f64::EPSILON {
        return Err(EpipolarError::DegenerateGeometry(
            "constraint matrix is empty".into(),
        ));
    }
    let ratio = sv[order[1]] / largest;
    if ratio < min_singular_ratio {
        return Err(EpipolarError::DegenerateGeometry(format!(
            "constraint null space is not one-dimensional (singular ratio {ratio:.3e})"
        )));
    }
    log::trace!("8-point singular ratio {ratio:.3e}");

    let e = v_t.row(smallest);
    let e = Matrix3::new(e[0], e[1], e[2], e[3], e[4], e[5], e[6], e[7], e[8]);
    enforce_essential_constraints(&e)
}

/// Project a 3x3 matrix onto the essential manifold: singular values `(1, 1, 0)`.
pub fn enforce_essential_constraints(e: &Matrix3<f64>) -> Result<Matrix3<f64>, EpipolarError> {
    let (u, _, v_t) = sorted_svd3(e)?;
    Ok(u * Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, 0.0)) * v_t)
}

/// SVD of a 3x3 matrix with singular values in descending order.
pub(crate) fn sorted_svd3(
    m: &Matrix3<f64>,
) -> Result<(Matrix3<f64>, Vector3<f64>, Matrix3<f64>), EpipolarError> {
    let svd = m.svd(true, true);
    let u = svd.u.ok_or(EpipolarError::SvdFailed)?;
    let v_t = svd.v_t.ok_or(EpipolarError::SvdFailed)?;
    let s = svd.singular_values;

    let mut order = [0usize, 1, 2];
    order.sort_by(|&i, &j| s[j].partial_cmp(&s[i]).unwrap_or(Ordering::Equal));

    let u = Matrix3::from_columns(&[u.column(order[0]), u.column(order[1]), u.column(order[2])]);
    let v_t = Matrix3::from_rows(&[v_t.row(order[0]), v_t.row(order[1]), v_t.row(order[2])]);
    let s = Vector3::new(s[order[0]], s[order[1]], s[order[2]]);
    Ok((u, s, v_t))
}

/// Skew-symmetric cross-product matrix `[t]x`.
pub fn skew(t: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -t.z, t.y, t.z, 0.0, -t.x, -t.y, t.x, 0.0)
}
