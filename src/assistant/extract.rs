//! Heading-delimited section extraction from model output.
//!
//! Model output is free text that usually, but not reliably, follows the
//! requested markdown layout. Extraction is best effort: a missing section
//! is reported as absent and never synthesized.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

#[allow(clippy::unwrap_used)] // Compile-time constant regex pattern
static HEADING_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?P<hashes>#{1,6})(?:\s|$)").unwrap());

/// Returns the level of a markdown heading line.
fn heading_level(line: &str) -> Option<usize> {
    HEADING_PATTERN
        .captures(line)
        .and_then(|c| c.name("hashes"))
        .map(|m| m.as_str().len())
}

/// Tracks whether lines are inside a fenced code block.
#[derive(Default)]
struct FenceState {
    open: Option<(char, usize)>,
}

impl FenceState {
    /// Feeds one line; returns `true` when the line is fence or fenced content.
    fn consume(&mut self, line: &str) -> bool {
        let trimmed = line.trim_start();
        let fence = ['`', '~'].into_iter().find_map(|c| {
            let run = trimmed.chars().take_while(|&ch| ch == c).count();
            (run >= 3).then_some((c, run))
        });
        match (self.open, fence) {
            (None, Some(f)) => {
                self.open = Some(f);
                true
            }
            (Some((c, len)), Some((fc, flen)))
                if c == fc && flen >= len && trimmed[flen..].trim().is_empty() =>
            {
                self.open = None;
                true
            }
            (Some(_), _) => true,
            (None, None) => false,
        }
    }
}

/// A line with its byte range in the source text.
struct Line<'a> {
    text: &'a str,
    start: usize,
    end: usize,
}

fn lines_with_offsets(text: &str) -> impl Iterator<Item = Line<'_>> {
    let mut offset = 0;
    text.split_inclusive('\n').map(move |raw| {
        let start = offset;
        offset += raw.len();
        Line {
            text: raw.trim_end_matches(['\n', '\r']),
            start,
            end: offset,
        }
    })
}

/// Extracts the section introduced by the last `marker` heading.
///
/// A marker line is optional whitespace, the marker text, then optionally
/// more title text. The section runs to the next heading of the same or a
/// higher level (or the end of the text) and is returned trimmed. Lines in
/// fenced code blocks are never markers or boundaries. Returns `None` when
/// no marker is found or the section is empty.
pub fn extract_section<'t>(text: &'t str, marker: &str) -> Option<&'t str> {
    let marker = marker.trim();
    if marker.is_empty() {
        return None;
    }
    let level = heading_level(marker).unwrap_or(6);

    let lines: Vec<(Line<'_>, bool)> = {
        let mut fences = FenceState::default();
        lines_with_offsets(text)
            .map(|line| {
                let fenced = fences.consume(line.text);
                (line, fenced)
            })
            .collect()
    };

    let marker_idx = lines
        .iter()
        .rposition(|(line, fenced)| !fenced && line.text.trim_start().starts_with(marker))?;

    let start = lines[marker_idx].0.end;
    let end = lines[marker_idx + 1..]
        .iter()
        .find(|(line, fenced)| !fenced && heading_level(line.text).is_some_and(|l| l <= level))
        .map_or(text.len(), |(line, _)| line.start);

    let section = text[start..end].trim();
    (!section.is_empty()).then_some(section)
}

/// Named sections extracted from one model answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AnalysisSections(BTreeMap<String, String>);

impl AnalysisSections {
    /// Text of the named section, if it was found.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Whether no section was found.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over found sections by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Extracts every `(name, marker)` section that is present.
pub fn extract_sections(text: &str, markers: &[(&str, &str)]) -> AnalysisSections {
    AnalysisSections(
        markers
            .iter()
            .filter_map(|(name, marker)| {
                extract_section(text, marker).map(|s| ((*name).to_string(), s.to_string()))
            })
            .collect(),
    )
}
