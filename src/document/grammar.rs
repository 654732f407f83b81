// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Line classification for request documents

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// `###`, optionally followed by whitespace and a title
    static ref DELIMITER: Regex =
        Regex::new(r"^###(?:\s+(.*?))?\s*$").expect("delimiter pattern is valid");
}

/// Title that marks a script block
pub const SCRIPT_MARKER: &str = "javascript";

/// Kind of block opened by a delimiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Holds a request definition
    Request,
    /// Holds script source replayed before later requests
    Script,
}

/// Classification of a single document line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind<'a> {
    /// Opens a new block; the title is the text after `###`
    Delimiter { kind: BlockKind, title: &'a str },
    /// Starts with `#`
    Comment,
    /// Empty or whitespace only
    Blank,
    /// Anything else
    Content,
}

/// Classify one line
pub fn classify(line: &str) -> LineKind<'_> {
    if let Some(caps) = DELIMITER.captures(line) {
        let title = caps.get(1).map_or("", |m| m.as_str());
        let kind = if title == SCRIPT_MARKER {
            BlockKind::Script
        } else {
            BlockKind::Request
        };
        return LineKind::Delimiter { kind, title };
    }

    if line.trim().is_empty() {
        LineKind::Blank
    } else if line.starts_with('#') {
        LineKind::Comment
    } else {
        LineKind::Content
    }
}

/// Check whether a line opens a new block
pub fn is_delimiter(line: &str) -> bool {
    matches!(classify(line), LineKind::Delimiter { .. })
}

/// Check whether a line is skipped as preamble (blank or comment)
pub fn is_preamble(line: &str) -> bool {
    matches!(classify(line), LineKind::Blank | LineKind::Comment)
}

/// Split document text into lines, tolerating `\r\n` endings
pub fn split_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}
