// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Locating the request block at a cursor and the scripts that precede it

use serde::Serialize;

use super::grammar::{classify, is_preamble, BlockKind, LineKind};
use crate::error::ParseError;

/// Source of a script block, ready to be replayed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptBlock {
    /// First source line (the line after the `### javascript` delimiter)
    pub start_line: usize,
    /// Block text joined with `\n`
    pub source: String,
}

/// Line range of a request block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    /// First line after the opening delimiter (0 for the implicit first block)
    pub start_line: usize,
    /// One past the last line of the block
    pub end_line: usize,
    /// Title written after `###`, if any
    pub title: Option<String>,
    /// The block's lines
    pub lines: Vec<String>,
}

impl RawBlock {
    /// Lines paired with their document line numbers
    pub fn numbered_lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.lines
            .iter()
            .enumerate()
            .map(move |(i, line)| (self.start_line + i, line.as_str()))
    }
}

/// What the cursor points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A request block to extract
    Block(RawBlock),
    /// A script block opened before the cursor is never closed
    UnterminatedScript { line: usize },
    /// The cursor sits inside a script block that is closed further down
    CursorInScript { line: usize },
}

impl Target {
    /// Turn the target into the block or the parse error it stands for
    pub fn into_block(self) -> Result<RawBlock, ParseError> {
        match self {
            Target::Block(block) => Ok(block),
            Target::UnterminatedScript { line } => Err(ParseError::UnterminatedScript { line }),
            Target::CursorInScript { line } => Err(ParseError::CursorInScript { line }),
        }
    }
}

/// Scripts to replay, in document order, and the block to extract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub scripts: Vec<ScriptBlock>,
    pub target: Target,
}

/// One entry of a document outline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSummary {
    pub kind: BlockKindName,
    pub title: Option<String>,
    pub start_line: usize,
    pub end_line: usize,
    /// First non-preamble line of a request block
    pub request_line: Option<String>,
}

/// Serializable name of a block kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKindName {
    Request,
    Script,
}

impl From<BlockKind> for BlockKindName {
    fn from(kind: BlockKind) -> Self {
        match kind {
            BlockKind::Request => BlockKindName::Request,
            BlockKind::Script => BlockKindName::Script,
        }
    }
}

/// Scans documents for the block under a cursor
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentParser;

impl DocumentParser {
    /// Plan a run for `cursor_line`
    ///
    /// Script blocks closed strictly before the cursor line are listed for
    /// replay. The target is the block opened by the last request delimiter
    /// before the cursor line, so a cursor resting on a delimiter still
    /// belongs to the block above it.
    pub fn plan<S: AsRef<str>>(lines: &[S], cursor_line: usize) -> Plan {
        let mut scripts = Vec::new();
        let mut open_script: Option<(usize, Vec<&str>)> = None;
        let mut block_start = 0;
        let mut block_title = None;

        for (n, line) in lines.iter().enumerate().take(cursor_line) {
            let line = line.as_ref();
            match classify(line) {
                LineKind::Delimiter { kind, title } => {
                    if let Some((start, body)) = open_script.take() {
                        scripts.push(ScriptBlock {
                            start_line: start,
                            source: body.join("\n"),
                        });
                    }
                    match kind {
                        BlockKind::Script => open_script = Some((n + 1, Vec::new())),
                        BlockKind::Request => {
                            block_start = n + 1;
                            block_title = Some(title).filter(|t| !t.is_empty()).map(str::to_string);
                        }
                    }
                }
                _ => {
                    if let Some((_, body)) = open_script.as_mut() {
                        body.push(line);
                    }
                }
            }
        }

        if let Some((start, _)) = open_script {
            let closed_later = lines
                .iter()
                .skip(cursor_line.max(start))
                .any(|l| matches!(classify(l.as_ref()), LineKind::Delimiter { .. }));
            // The script opener sits on the line before its first source line.
            let line = start.saturating_sub(1);
            let target = if closed_later {
                Target::CursorInScript { line }
            } else {
                Target::UnterminatedScript { line }
            };
            return Plan { scripts, target };
        }

        let end_line = (block_start..lines.len())
            .find(|&n| matches!(classify(lines[n].as_ref()), LineKind::Delimiter { .. }))
            .unwrap_or(lines.len());
        let block_lines = lines
            .get(block_start..end_line)
            .unwrap_or_default()
            .iter()
            .map(|l| l.as_ref().to_string())
            .collect();

        Plan {
            scripts,
            target: Target::Block(RawBlock {
                start_line: block_start,
                end_line,
                title: block_title,
                lines: block_lines,
            }),
        }
    }

    /// List every block in the document
    pub fn outline<S: AsRef<str>>(lines: &[S]) -> Vec<BlockSummary> {
        let mut blocks = Vec::new();
        let mut current = (BlockKind::Request, None::<String>, 0usize);

        let close = |blocks: &mut Vec<BlockSummary>,
                         (kind, title, start): (BlockKind, Option<String>, usize),
                         end: usize| {
            let body = lines.get(start..end).unwrap_or_default();
            let request_line = match kind {
                BlockKind::Request => body
                    .iter()
                    .map(|l| l.as_ref())
                    .find(|l| !is_preamble(l))
                    .map(|l| l.trim().to_string()),
                BlockKind::Script => None,
            };
            // The implicit first block only counts when it has content.
            if start == 0 && kind == BlockKind::Request && request_line.is_none() {
                return;
            }
            blocks.push(BlockSummary {
                kind: kind.into(),
                title,
                start_line: start,
                end_line: end,
                request_line,
            });
        };

        for (n, line) in lines.iter().enumerate() {
            if let LineKind::Delimiter { kind, title } = classify(line.as_ref()) {
                let title = Some(title).filter(|t| !t.is_empty() && kind == BlockKind::Request);
                let previous = std::mem::replace(
                    &mut current,
                    (kind, title.map(str::to_string), n + 1),
                );
                close(&mut blocks, previous, n);
            }
        }
        close(&mut blocks, current, lines.len());

        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::grammar::split_lines;

    fn lines(text: &str) -> Vec<String> {
        split_lines(text)
    }

    #[test]
    fn test_document_without_delimiters_is_one_block() {
        let doc = lines("# comment\nGET http://x/a\nX: 1\n\nbody");
        let plan = DocumentParser::plan(&doc, 3);
        assert!(plan.scripts.is_empty());
        let block = plan.target.into_block().unwrap();
        assert_eq!(block.start_line, 0);
        assert_eq!(block.end_line, 5);
        assert_eq!(block.lines.len(), 5);
    }

    #[test]
    fn test_cursor_selects_surrounding_block() {
        let doc = lines("GET http://x/one\n\n### Second\nGET http://x/two\n\n###\nGET http://x/three");
        let block = DocumentParser::plan(&doc, 3).target.into_block().unwrap();
        assert_eq!(block.start_line, 3);
        assert_eq!(block.end_line, 5);
        assert_eq!(block.title.as_deref(), Some("Second"));
        assert_eq!(block.lines[0], "GET http://x/two");

        let block = DocumentParser::plan(&doc, 6).target.into_block().unwrap();
        assert_eq!(block.lines, vec!["GET http://x/three"]);
    }

    #[test]
    fn test_cursor_on_delimiter_belongs_to_block_above() {
        let doc = lines("GET http://x/one\n###\nGET http://x/two");
        let block = DocumentParser::plan(&doc, 1).target.into_block().unwrap();
        assert_eq!(block.lines, vec!["GET http://x/one"]);
    }

    #[test]
    fn test_scripts_before_cursor_are_collected_in_order() {
        let doc = lines(
            "### javascript\nthis.data.a = 1\n### javascript\nthis.data.b = 2\n###\nGET http://x\n### javascript\nthis.data.c = 3\n###",
        );
        let plan = DocumentParser::plan(&doc, 5);
        assert_eq!(
            plan.scripts,
            vec![
                ScriptBlock { start_line: 1, source: "this.data.a = 1".into() },
                ScriptBlock { start_line: 3, source: "this.data.b = 2".into() },
            ]
        );
        assert_eq!(plan.target.into_block().unwrap().lines, vec!["GET http://x"]);
    }

    #[test]
    fn test_unterminated_script() {
        let doc = lines("### javascript\nthis.data.a = 1\nGET http://x");
        let plan = DocumentParser::plan(&doc, 2);
        assert_eq!(plan.target, Target::UnterminatedScript { line: 0 });
        assert_eq!(
            plan.target.into_block().unwrap_err(),
            ParseError::UnterminatedScript { line: 0 }
        );
    }

    #[test]
    fn test_cursor_inside_closed_script() {
        let doc = lines("### javascript\nthis.data.a = 1\nthis.data.b = 2\n###\nGET http://x");
        let plan = DocumentParser::plan(&doc, 2);
        assert!(plan.scripts.is_empty());
        assert_eq!(plan.target, Target::CursorInScript { line: 0 });
    }

    #[test]
    fn test_empty_document() {
        let doc = lines("");
        let block = DocumentParser::plan(&doc, 0).target.into_block().unwrap();
        assert_eq!(block.lines, vec![""]);
    }

    #[test]
    fn test_cursor_past_end_is_clamped() {
        let doc = lines("GET http://x/a");
        let block = DocumentParser::plan(&doc, 99).target.into_block().unwrap();
        assert_eq!(block.lines, vec!["GET http://x/a"]);
    }

    #[test]
    fn test_outline() {
        let doc = lines("\n### javascript\nthis.data.a = 1\n### Login\n# note\nPOST http://x/login\n\n###\nGET http://x/me");
        let outline = DocumentParser::outline(&doc);
        assert_eq!(outline.len(), 3);
        assert_eq!(outline[0].kind, BlockKindName::Script);
        assert_eq!(outline[1].title.as_deref(), Some("Login"));
        assert_eq!(outline[1].request_line.as_deref(), Some("POST http://x/login"));
        assert_eq!(outline[2].start_line, 8);
        assert_eq!(outline[2].end_line, 9);
    }
}
