//! Attestation boundary detection and span building.
//!
//! Detection is stateful and order-sensitive: runs must be scanned in stream
//! order, and a per-page set of visited row coordinates suppresses re-detecting
//! a header that wraps across several glyph runs on the same visual row. The
//! set is local to each page scan; nothing carries across pages.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::types::{absolute_y, Attestation, PageText};

/// Tokens that wrap a clause header across rows without being content
/// themselves. They must not claim a row, or the real marker following them
/// at the same Y would be suppressed.
const CONTINUATION_KEYWORDS: [&str; 4] = ["either", "and", "or", "and/or"];

/// Matches an attestation header token at the start of a run: optional
/// leading brackets, then `II.<digits>.<non-space...>`.
fn boundary_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[*II\.\d+\.\S*").unwrap())
}

/// A boundary event found while scanning a document's run stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Marker {
    /// An attestation header line.
    Start {
        name: String,
        y: i64,
        page: u32,
        absolute_y: i64,
    },
    /// The end-of-attestations sentinel (the "Notes" heading). At most one
    /// per document; nothing after it is scanned.
    End { y: i64, page: u32, absolute_y: i64 },
}

impl Marker {
    fn position(&self) -> (i64, u32, i64) {
        match self {
            Marker::Start {
                y, page, absolute_y, ..
            }
            | Marker::End { y, page, absolute_y } => (*y, *page, *absolute_y),
        }
    }
}

/// Strip the decoration a header token carries in the raw text: one leading
/// `[` and one trailing `.`. Nothing else is altered.
fn strip_marker_name(matched: &str) -> String {
    let name = matched.strip_prefix('[').unwrap_or(matched);
    let name = name.strip_suffix('.').unwrap_or(name);
    name.to_string()
}

/// Scan a document's pages in order and collect boundary markers.
///
/// Stops the moment the terminal sentinel is seen, including mid-page; later
/// pages are never visited. An empty result means the document simply has no
/// attestation headers.
pub fn detect_markers(pages: &[PageText]) -> Vec<Marker> {
    let re = boundary_regex();
    let mut markers: Vec<Marker> = Vec::new();

    for page in pages {
        // Visited row coordinates, reset at each page boundary.
        let mut seen: HashSet<i64> = HashSet::new();

        for run in &page.runs {
            let trimmed = run.text.trim();
            let line_y = run.y.round() as i64;
            let abs_y = absolute_y(page.number, page.height, run.y);

            // The notes heading terminates the attestation region of the
            // whole document. "otes" covers the heading split after a
            // decorated capital.
            if trimmed == "Notes" || trimmed == "otes" {
                markers.push(Marker::End {
                    y: line_y,
                    page: page.number,
                    absolute_y: abs_y,
                });
                return markers;
            }

            if !seen.contains(&line_y) {
                if let Some(m) = re.find(&run.text) {
                    markers.push(Marker::Start {
                        name: strip_marker_name(m.as_str()),
                        y: line_y,
                        page: page.number,
                        absolute_y: abs_y,
                    });
                }
            }

            // Continuation glyphs and connective keywords share a row with
            // header text that may arrive later in the stream; they must not
            // claim the row.
            let claims_row = !trimmed.is_empty()
                && run.text != "["
                && !CONTINUATION_KEYWORDS.contains(&trimmed);
            if claims_row {
                seen.insert(line_y);
            }

            // A stray bracket glyph can precede the true marker text on the
            // same row; release the row so the marker still registers.
            if run.text.starts_with('[') {
                seen.remove(&line_y);
            }
        }
    }

    markers
}

/// Pair each marker with its successor to bound the spans, allocate ids, and
/// drop the trailing entry.
///
/// The sentinel is a valid successor for the last real attestation; when no
/// sentinel was found, the final (unbounded) header is discarded with it.
/// An empty marker list is not an error and yields an empty result.
pub fn build_spans(markers: &[Marker]) -> Vec<Attestation> {
    let mut counters: HashMap<String, u32> = HashMap::new();
    let mut attestations: Vec<Attestation> = Vec::new();

    for pair in markers.windows(2) {
        let Marker::Start {
            name,
            y,
            page,
            absolute_y,
        } = &pair[0]
        else {
            continue;
        };

        let (end_y, end_page, absolute_end_y) = pair[1].position();

        let counter = counters.entry(name.clone()).or_insert(0);
        let id = format!("{}-{}", name, counter);
        *counter += 1;

        attestations.push(Attestation {
            id,
            name: name.clone(),
            start_y: *y,
            end_y,
            start_page: *page,
            end_page,
            absolute_y: *absolute_y,
            absolute_end_y,
            lines: Vec::new(),
            children: Vec::new(),
        });
    }

    attestations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TextRun;

    fn run(text: &str, x: f64, y: f64) -> TextRun {
        TextRun {
            text: text.to_string(),
            x,
            y,
            height: 9.0,
            font: "Helvetica".to_string(),
        }
    }

    fn page(number: u32, runs: Vec<TextRun>) -> PageText {
        PageText {
            number,
            height: 842.0,
            runs,
        }
    }

    fn start_names(markers: &[Marker]) -> Vec<String> {
        markers
            .iter()
            .filter_map(|m| match m {
                Marker::Start { name, .. } => Some(name.clone()),
                Marker::End { .. } => None,
            })
            .collect()
    }

    #[test]
    fn detects_header_and_strips_decoration() {
        let pages = vec![page(
            1,
            vec![
                run("[II.3.Some-Clause.", 68.0, 150.2),
                run("the animals described above", 68.0, 170.0),
            ],
        )];

        let markers = detect_markers(&pages);
        assert_eq!(start_names(&markers), vec!["II.3.Some-Clause"]);
        match &markers[0] {
            Marker::Start { y, page, absolute_y, .. } => {
                assert_eq!(*y, 150);
                assert_eq!(*page, 1);
                assert_eq!(*absolute_y, 150);
            }
            other => panic!("expected start marker, got {:?}", other),
        }
    }

    #[test]
    fn same_row_header_not_detected_twice() {
        // A wrapped header emits several runs at the same nominal Y; only
        // the first match on the row counts.
        let pages = vec![page(
            1,
            vec![
                run("II.1.Health-attestation", 68.0, 150.0),
                run("II.1.Health-attestation", 200.0, 150.4),
            ],
        )];

        let markers = detect_markers(&pages);
        assert_eq!(markers.len(), 1);
    }

    #[test]
    fn continuation_keyword_does_not_claim_row() {
        let pages = vec![page(
            1,
            vec![
                run("either", 60.0, 150.0),
                run("II.2.Origin", 80.0, 150.0),
            ],
        )];

        let markers = detect_markers(&pages);
        assert_eq!(start_names(&markers), vec!["II.2.Origin"]);
    }

    #[test]
    fn ordinary_text_claims_row_and_blocks_marker() {
        let pages = vec![page(
            1,
            vec![
                run("some body text", 60.0, 150.0),
                run("II.2.Origin", 80.0, 150.0),
            ],
        )];

        assert!(detect_markers(&pages).is_empty());
    }

    #[test]
    fn bare_bracket_releases_row() {
        // The bracket glyph both declines to claim the row and releases any
        // earlier claim at the same Y.
        let pages = vec![page(
            1,
            vec![
                run("body text", 60.0, 150.0),
                run("[", 64.0, 150.0),
                run("II.4.Transport", 80.0, 150.0),
            ],
        )];

        let markers = detect_markers(&pages);
        assert_eq!(start_names(&markers), vec!["II.4.Transport"]);
    }

    #[test]
    fn whitespace_run_does_not_claim_row() {
        let pages = vec![page(
            1,
            vec![run("   ", 60.0, 150.0), run("II.5.Identity", 80.0, 150.0)],
        )];

        let markers = detect_markers(&pages);
        assert_eq!(start_names(&markers), vec!["II.5.Identity"]);
    }

    #[test]
    fn seen_set_resets_per_page() {
        let pages = vec![
            page(1, vec![run("body text", 60.0, 150.0)]),
            page(2, vec![run("II.6.Welfare", 80.0, 150.0)]),
        ];

        let markers = detect_markers(&pages);
        assert_eq!(start_names(&markers), vec!["II.6.Welfare"]);
    }

    #[test]
    fn notes_heading_stops_whole_document() {
        let pages = vec![
            page(
                1,
                vec![
                    run("II.1.First", 68.0, 150.0),
                    run("Notes", 68.0, 700.0),
                    run("II.9.After-notes", 68.0, 750.0),
                ],
            ),
            page(2, vec![run("II.10.Next-page", 68.0, 150.0)]),
        ];

        let markers = detect_markers(&pages);
        assert_eq!(markers.len(), 2);
        assert!(matches!(markers[1], Marker::End { y: 700, page: 1, .. }));
    }

    #[test]
    fn split_notes_heading_also_stops() {
        let pages = vec![page(
            1,
            vec![run("otes", 68.0, 700.0), run("II.1.After", 68.0, 750.0)],
        )];

        let markers = detect_markers(&pages);
        assert_eq!(markers.len(), 1);
        assert!(matches!(markers[0], Marker::End { .. }));
    }

    #[test]
    fn no_headers_is_empty_not_error() {
        let pages = vec![page(1, vec![run("plain paragraph", 68.0, 200.0)])];
        assert!(detect_markers(&pages).is_empty());
        assert!(build_spans(&[]).is_empty());
    }

    fn start(name: &str, y: i64, page: u32, absolute_y: i64) -> Marker {
        Marker::Start {
            name: name.to_string(),
            y,
            page,
            absolute_y,
        }
    }

    #[test]
    fn spans_tile_with_no_gaps() {
        let markers = vec![
            start("II.1.A", 120, 1, 120),
            start("II.2.B", 400, 1, 400),
            start("II.3.C", 150, 2, 992),
            Marker::End {
                y: 500,
                page: 2,
                absolute_y: 1342,
            },
        ];

        let spans = build_spans(&markers);
        assert_eq!(spans.len(), 3);
        for pair in spans.windows(2) {
            assert_eq!(pair[0].end_y, pair[1].start_y);
            assert_eq!(pair[0].end_page, pair[1].start_page);
            assert_eq!(pair[0].absolute_end_y, pair[1].absolute_y);
        }
        // The sentinel bounds the last span but is not itself persisted.
        assert_eq!(spans[2].end_y, 500);
        assert_eq!(spans[2].absolute_end_y, 1342);
    }

    #[test]
    fn last_header_without_sentinel_is_dropped() {
        let markers = vec![start("II.1.A", 120, 1, 120), start("II.2.B", 400, 1, 400)];

        let spans = build_spans(&markers);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "II.1.A");
    }

    #[test]
    fn duplicate_names_get_distinct_ids() {
        let markers = vec![
            start("II.1.A", 100, 1, 100),
            start("II.1.A", 200, 1, 200),
            start("II.1.A", 300, 1, 300),
            Marker::End {
                y: 400,
                page: 1,
                absolute_y: 400,
            },
        ];

        let spans = build_spans(&markers);
        let ids: Vec<&str> = spans.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["II.1.A-0", "II.1.A-1", "II.1.A-2"]);
    }

    #[test]
    fn marker_name_stripping() {
        assert_eq!(strip_marker_name("[II.3.Some-Clause."), "II.3.Some-Clause");
        assert_eq!(strip_marker_name("II.3.Some-Clause"), "II.3.Some-Clause");
        assert_eq!(strip_marker_name("[II.1.X"), "II.1.X");
    }
}
