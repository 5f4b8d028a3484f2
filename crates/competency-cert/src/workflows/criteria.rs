//! Groups authored competency criteria into main statements and their supporting sub-items.
//!
//! Criteria are authored as a flat list of strings, sometimes with several lines packed into
//! one entry. Lines carrying a bullet (`- `, `* `, `> `) or a numbered marker (`1. `, `2) `)
//! are folded under the nearest preceding main statement. Short bold headings such as
//! `1. **Safety**` stay main statements even though they are numbered.

use serde::{Deserialize, Serialize};

/// Lines of at least this many characters are never treated as bold section headings.
///
/// A long bold line that is also numbered therefore folds as a sub-item.
pub const BOLD_HEADING_MAX_CHARS: usize = 100;

const BULLET_MARKERS: [char; 3] = ['-', '*', '>'];

/// A main criterion statement together with its supporting sub-statements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriteriaGroup {
    pub main: String,
    pub subs: Vec<String>,
}

impl CriteriaGroup {
    fn new(main: &str) -> Self {
        Self {
            main: main.to_string(),
            subs: Vec::new(),
        }
    }
}

/// Classification of a single flattened criteria line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Main,
    Sub,
}

/// Groups raw criteria entries into main statements with attached sub-items.
pub fn group<S: AsRef<str>>(items: &[S]) -> Vec<CriteriaGroup> {
    let mut groups: Vec<CriteriaGroup> = Vec::new();

    for line in flatten(items) {
        match (classify(line), groups.last_mut()) {
            (LineKind::Sub, Some(current)) => current.subs.push(clean_sub_item(line).to_string()),
            // The first line has no group to attach to, whatever its marker.
            (LineKind::Sub, None) | (LineKind::Main, _) => groups.push(CriteriaGroup::new(line)),
        }
    }

    groups
}

/// Splits every entry on line breaks, trimming and dropping blank lines.
pub fn flatten<S: AsRef<str>>(items: &[S]) -> Vec<&str> {
    items
        .iter()
        .flat_map(|item| item.as_ref().split(['\n', '\r']))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Classifies a trimmed line on its own, without the first-line rule applied by [`group`].
pub fn classify(line: &str) -> LineKind {
    if is_bold_heading(line) {
        return LineKind::Main;
    }

    if bullet_marker_len(line).is_some() || numbered_marker_len(line).is_some() {
        LineKind::Sub
    } else {
        LineKind::Main
    }
}

/// Strips a leading bullet marker. Numbered markers are kept because numbering is content.
pub fn clean_sub_item(line: &str) -> &str {
    match bullet_marker_len(line) {
        Some(len) => line[len..].trim_start(),
        None => line,
    }
}

fn bullet_marker_len(line: &str) -> Option<usize> {
    let mut chars = line.chars();
    let marker = chars.next()?;
    let follower = chars.next()?;
    (BULLET_MARKERS.contains(&marker) && follower.is_whitespace()).then_some(marker.len_utf8())
}

fn numbered_marker_len(line: &str) -> Option<usize> {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }

    let rest = &line[digits..];
    let mut chars = rest.chars();
    match (chars.next(), chars.next()) {
        (Some('.' | ')'), Some(follower)) if follower.is_whitespace() => Some(digits + 1),
        _ => None,
    }
}

fn is_bold_heading(line: &str) -> bool {
    if line.chars().count() >= BOLD_HEADING_MAX_CHARS {
        return false;
    }

    let body = match numbered_marker_len(line) {
        Some(len) => line[len..].trim_start(),
        None => line,
    };

    body.len() > 4 && body.starts_with("**") && body.ends_with("**")
}
