//! Line selection: derive the draw-list for one attestation.

use crate::types::{Attestation, Line};

/// Body-text font-height window, exclusive on both ends. Narrower than the
/// collection filter so footnote and heading sizes never get underlined.
const NORMAL_SIZE_MIN: f64 = 7.0;
const NORMAL_SIZE_MAX: f64 = 10.0;

fn is_normal_size(line: &Line) -> bool {
    line.size > NORMAL_SIZE_MIN && line.size < NORMAL_SIZE_MAX
}

/// The deduplicated, normal-size lines of an attestation, sorted ascending
/// by row coordinate. Pure function of the persisted data; repeated calls
/// yield the same list.
pub fn unique_lines(attestation: &Attestation) -> Vec<Line> {
    let mut lines: Vec<Line> = Vec::new();
    for line in attestation.lines.iter().filter(|l| is_normal_size(l)) {
        if !lines.contains(line) {
            lines.push(line.clone());
        }
    }
    lines.sort_by_key(|l| l.num);
    lines
}

/// Leftmost x among the normal-size lines at row `num` -- the underline's
/// start. A row holding a list marker plus wrapped text underlines from the
/// row's true left margin. `None` when no normal-size line sits at that row.
pub fn start_position(attestation: &Attestation, num: i64) -> Option<i64> {
    attestation
        .lines
        .iter()
        .filter(|l| is_normal_size(l) && l.num == num)
        .map(|l| l.x)
        .min()
}
