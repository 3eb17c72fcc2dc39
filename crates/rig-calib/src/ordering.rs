use rig_calib_core::Dot;
use serde::{Deserialize, Serialize};

/// How detected dots are ordered before index-aligned pairing across cameras.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DotOrdering {
    /// Keep contour discovery order.
    #[default]
    Detection,
    /// Group dots into rows (top to bottom) and sort each row left to right.
    ///
    /// A dot starts a new row when it lies more than `row_tolerance` pixels
    /// below the first dot of the current row.
    RowMajor { row_tolerance: f32 },
}

impl DotOrdering {
    pub fn apply(&self, mut dots: Vec<Dot>) -> Vec<Dot> {
        match *self {
            DotOrdering::Detection => dots,
            DotOrdering::RowMajor { row_tolerance } => {
                dots.sort_by(|a, b| a.y.total_cmp(&b.y));
                let mut out = Vec::with_capacity(dots.len());
                let mut row: Vec<Dot> = Vec::new();
                for d in dots {
                    if row.first().is_some_and(|first| d.y - first.y > row_tolerance) {
                        flush_row(&mut row, &mut out);
                    }
                    row.push(d);
                }
                flush_row(&mut row, &mut out);
                out
            }
        }
    }
}

fn flush_row(row: &mut Vec<Dot>, out: &mut Vec<Dot>) {
    row.sort_by(|a, b| a.x.total_cmp(&b.x));
    out.append(row);
}
