//! Content collection: gather the runs geometrically owned by a span.

use crate::types::{absolute_y, Attestation, Line, PageText};

/// Print-area margins in top-origin points. Runs outside them are headers,
/// footers, or page furniture.
const TOP_MARGIN: f64 = 114.0;
const BOTTOM_MARGIN: f64 = 800.0;

/// Font-height window for collected content, exclusive on both ends.
const TEXT_SIZE_MIN: f64 = 5.0;
const TEXT_SIZE_MAX: f64 = 10.0;

/// Fill `attestation.lines` with the runs inside its span.
///
/// A run is kept only if it sits within the print margins, its font height
/// falls in the content window, its text is non-whitespace, and its
/// document-global Y lies in `[absolute_y, absolute_end_y)`. Runs accumulate
/// in page-ascending stream order; sorting happens later in line selection.
pub fn collect_content(attestation: &mut Attestation, pages: &[PageText]) {
    for page in pages {
        if page.number < attestation.start_page || page.number > attestation.end_page {
            continue;
        }

        for run in &page.runs {
            if run.y <= TOP_MARGIN || run.y >= BOTTOM_MARGIN {
                continue;
            }
            if run.height <= TEXT_SIZE_MIN || run.height >= TEXT_SIZE_MAX {
                continue;
            }
            if run.text.trim().is_empty() {
                continue;
            }

            let abs_y = absolute_y(page.number, page.height, run.y);
            if abs_y < attestation.absolute_y || abs_y >= attestation.absolute_end_y {
                continue;
            }

            attestation.lines.push(Line {
                str: run.text.clone(),
                num: run.y.round() as i64,
                size: run.height,
                x: run.x.round() as i64,
                font: run.font.clone(),
                page: page.number,
            });
        }
    }
}
