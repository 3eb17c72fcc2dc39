//! The four `(R, t)` hypotheses of an essential matrix and their cheirality vote.

use nalgebra::{Matrix3, Point2, Vector3};
use serde::{Deserialize, Serialize};

use crate::essential::sorted_svd3;
use crate::EpipolarError;

/// One of the four pose hypotheses encoded by an essential matrix.
///
/// `A` is `U W V^T`, `B` is `U W^T V^T`; `Plus`/`Minus` is the sign of the
/// left null vector used as the translation direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoseCandidate {
    RotationAPlus,
    RotationAMinus,
    RotationBPlus,
    RotationBMinus,
}

impl PoseCandidate {
    pub const ALL: [PoseCandidate; 4] = [
        PoseCandidate::RotationAPlus,
        PoseCandidate::RotationAMinus,
        PoseCandidate::RotationBPlus,
        PoseCandidate::RotationBMinus,
    ];

    fn uses_rotation_a(self) -> bool {
        matches!(self, Self::RotationAPlus | Self::RotationAMinus)
    }

    fn translation_sign(self) -> f64 {
        match self {
            Self::RotationAPlus | Self::RotationBPlus => 1.0,
            Self::RotationAMinus | Self::RotationBMinus => -1.0,
        }
    }
}

/// Rotations and unit translation extracted from an essential matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EssentialDecomposition {
    pub rotation_a: Matrix3<f64>,
    pub rotation_b: Matrix3<f64>,
    pub translation: Vector3<f64>,
}

impl EssentialDecomposition {
    pub fn hypothesis(&self, candidate: PoseCandidate) -> (Matrix3<f64>, Vector3<f64>) {
        let r = if candidate.uses_rotation_a() {
            self.rotation_a
        } else {
            self.rotation_b
        };
        (r, self.translation * candidate.translation_sign())
    }
}

/// Split `E = [t]x R` into its rotation pair and translation direction.
///
/// Both rotations have determinant `+1`.
pub fn decompose_essential(e: &Matrix3<f64>) -> Result<EssentialDecomposition, EpipolarError> {
    let (mut u, _, mut v_t) = sorted_svd3(e)?;

    // Flipping the null-space column/row leaves E unchanged.
    if u.determinant() < 0.0 {
        u.column_mut(2).neg_mut();
    }
    if v_t.determinant() < 0.0 {
        v_t.row_mut(2).neg_mut();
    }

    let w = Matrix3::new(0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
    let rotation_a = proper_rotation(u * w * v_t);
    let rotation_b = proper_rotation(u * w.transpose() * v_t);

    let t = u.column(2).into_owned();
    let norm = t.norm();
    if !norm.is_finite() || norm <= f64::EPSILON {
        return Err(EpipolarError::DegenerateGeometry(
            "essential matrix has no translation direction".into(),
        ));
    }

    Ok(EssentialDecomposition {
        rotation_a,
        rotation_b,
        translation: t / norm,
    })
}

fn proper_rotation(r: Matrix3<f64>) -> Matrix3<f64> {
    if r.determinant() < 0.0 {
        -r
    } else {
        r
    }
}

/// Depths `(z1, z2)` of one correspondence under `X2 = R X1 + t`.
///
/// Solves `z2 x2 = z1 R x1 + t` in the least-squares sense. Returns `None`
/// when the two rays are numerically parallel.
pub fn triangulate_depths(
    r: &Matrix3<f64>,
    t: &Vector3<f64>,
    x1: &Point2<f64>,
    x2: &Point2<f64>,
) -> Option<(f64, f64)> {
    let m = r * Vector3::new(x1.x, x1.y, 1.0);
    let b = Vector3::new(x2.x, x2.y, 1.0);

    let mm = m.dot(&m);
    let bb = b.dot(&b);
    let mb = m.dot(&b);
    let det = mm * bb - mb * mb;
    if det <= 1e-12 * mm * bb {
        return None;
    }

    let mt = m.dot(t);
    let bt = b.dot(t);
    let z1 = (mb * bt - mt * bb) / det;
    let z2 = (mm * bt - mb * mt) / det;
    Some((z1, z2))
}

/// Number of correspondences reconstructed in front of both cameras.
pub fn cheirality_score(
    r: &Matrix3<f64>,
    t: &Vector3<f64>,
    x1: &[Point2<f64>],
    x2: &[Point2<f64>],
) -> usize {
    x1.iter()
        .zip(x2)
        .filter_map(|(p1, p2)| triangulate_depths(r, t, p1, p2))
        .filter(|&(z1, z2)| z1 > 0.0 && z2 > 0.0)
        .count()
}

/// Score every hypothesis, in [`PoseCandidate::ALL`] order.
pub fn score_candidates(
    decomposition: &EssentialDecomposition,
    x1: &[Point2<f64>],
    x2: &[Point2<f64>],
) -> [(PoseCandidate, usize); 4] {
    PoseCandidate::ALL.map(|c| {
        let (r, t) = decomposition.hypothesis(c);
        (c, cheirality_score(&r, &t, x1, x2))
    })
}

/// Highest-scoring hypothesis; ties go to the earliest in enumeration order.
pub fn select_candidate(scores: &[(PoseCandidate, usize); 4]) -> (PoseCandidate, usize) {
    let mut best = scores[0];
    for &entry in &scores[1..] {
        if entry.1 > best.1 {
            best = entry;
        }
    }
    best
}
