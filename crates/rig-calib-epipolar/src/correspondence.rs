use rig_calib_core::Dot;

use crate::EpipolarError;

/// Minimum number of pairs for the linear 8-point solve.
pub const MIN_CORRESPONDENCES: usize = 8;

/// Two index-aligned point sequences from two cameras.
///
/// Index `i` in `first` observes the same marker as index `i` in `second`.
/// Construction enforces equal length, at least [`MIN_CORRESPONDENCES`]
/// pairs, and no repeated point within either view.
#[derive(Clone, Debug, PartialEq)]
pub struct CorrespondenceSet {
    first: Vec<Dot>,
    second: Vec<Dot>,
}

impl CorrespondenceSet {
    pub fn new(first: Vec<Dot>, second: Vec<Dot>) -> Result<Self, EpipolarError> {
        if first.len() != second.len() {
            return Err(EpipolarError::LengthMismatch {
                first: first.len(),
                second: second.len(),
            });
        }
        if first.len() < MIN_CORRESPONDENCES {
            return Err(EpipolarError::InsufficientCorrespondences {
                got: first.len(),
                required: MIN_CORRESPONDENCES,
            });
        }
        for (view, points) in [&first, &second].into_iter().enumerate() {
            if let Some(index) = first_duplicate(points) {
                return Err(EpipolarError::DuplicatePoint { view, index });
            }
        }
        Ok(Self { first, second })
    }

    /// Pair the first `min(len)` points of both views.
    ///
    /// Used when two detections disagree on the dot count: the shorter list
    /// bounds the index alignment.
    pub fn truncated(first: &[Dot], second: &[Dot]) -> Result<Self, EpipolarError> {
        let n = first.len().min(second.len());
        Self::new(first[..n].to_vec(), second[..n].to_vec())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.first.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.first.is_empty()
    }

    pub fn first(&self) -> &[Dot] {
        &self.first
    }

    pub fn second(&self) -> &[Dot] {
        &self.second
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&Dot, &Dot)> {
        self.first.iter().zip(self.second.iter())
    }
}

fn first_duplicate(points: &[Dot]) -> Option<usize> {
    (1..points.len()).find(|&i| points[..i].contains(&points[i]))
}
