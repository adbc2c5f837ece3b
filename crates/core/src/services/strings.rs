//! `strings`-style scan of printable ASCII runs, classified by keyword.

use crate::config::InspectionConfig;
use crate::model::ExtractedStrings;

/// Keyword sets and limits used to classify candidate strings.
///
/// Matching is case-insensitive containment whatever the case of the keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringFilter {
    pub project_keyword: String,
    pub version_keywords: Vec<String>,
    pub board_keyword: String,
    pub limit: usize,
    pub min_run_length: usize,
}

impl StringFilter {
    pub fn from_config(config: &InspectionConfig) -> Self {
        Self {
            project_keyword: config.project_keyword.clone(),
            version_keywords: config.version_keywords.clone(),
            board_keyword: config.board_keyword.clone(),
            limit: config.match_limit,
            min_run_length: config.min_run_length,
        }
    }
}

impl Default for StringFilter {
    fn default() -> Self {
        Self::from_config(&InspectionConfig::default())
    }
}

fn is_printable(b: u8) -> bool {
    (0x20..=0x7E).contains(&b)
}

/// Iterator over maximal printable runs of at least `min_len` bytes, yielding
/// `(offset, text)`.
pub struct PrintableRuns<'a> {
    bytes: &'a [u8],
    pos: usize,
    min_len: usize,
}

impl<'a> Iterator for PrintableRuns<'a> {
    type Item = (usize, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.bytes.len() {
            let start = self.pos;
            while self.pos < self.bytes.len() && is_printable(self.bytes[self.pos]) {
                self.pos += 1;
            }
            let end = self.pos;
            if end == start {
                self.pos += 1;
                continue;
            }
            if end - start >= self.min_len {
                // Printable ASCII is always valid UTF-8.
                if let Ok(text) = std::str::from_utf8(&self.bytes[start..end]) {
                    return Some((start, text));
                }
            }
        }
        None
    }
}

pub fn printable_runs(bytes: &[u8], min_len: usize) -> PrintableRuns<'_> {
    PrintableRuns { bytes, pos: 0, min_len: min_len.max(1) }
}

/// Classify every printable run into the project, version and board lists.
///
/// A run can land in several lists. Each list keeps scan order and stops at
/// `filter.limit` entries.
pub fn extract_strings(bytes: &[u8], filter: &StringFilter) -> ExtractedStrings {
    let mut out = ExtractedStrings::default();
    if filter.limit == 0 {
        return out;
    }
    let project = filter.project_keyword.to_lowercase();
    let versions: Vec<String> = filter.version_keywords.iter().map(|k| k.to_lowercase()).collect();
    let board = filter.board_keyword.to_lowercase();

    for (_, text) in printable_runs(bytes, filter.min_run_length) {
        let lower = text.to_lowercase();
        if out.project_matches.len() < filter.limit && lower.contains(&project) {
            out.project_matches.push(text.to_string());
        }
        if out.version_matches.len() < filter.limit
            && versions.iter().any(|k| lower.contains(k.as_str()))
        {
            out.version_matches.push(text.to_string());
        }
        if out.board_matches.len() < filter.limit && lower.contains(&board) {
            out.board_matches.push(text.to_string());
        }
        if out.project_matches.len() == filter.limit
            && out.version_matches.len() == filter.limit
            && out.board_matches.len() == filter.limit
        {
            break;
        }
    }
    out
}
