// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Request extraction from a located block

use serde_json::Value;

use super::grammar::{classify, LineKind};
use super::parser::RawBlock;
use crate::error::{ParseError, Result};
use crate::http::RequestSpec;
use crate::js::ScriptEngine;
use crate::template::{self, TemplateError};

/// Prefix marking a body that is evaluated as an expression
pub const EXPRESSION_PREFIX: char = '=';

/// Build a [`RequestSpec`] from `block`
///
/// `data` is the template context after script replay. `engine` evaluates
/// `=` bodies against the same session object the scripts saw.
pub fn extract(block: &RawBlock, data: &Value, engine: &mut dyn ScriptEngine) -> Result<RequestSpec> {
    let mut lines = block
        .numbered_lines()
        .skip_while(|(_, line)| matches!(classify(line), LineKind::Blank | LineKind::Comment))
        .peekable();

    // Header region: request line, then headers up to the first blank line.
    let mut header_lines: Vec<(usize, &str)> = Vec::new();
    let mut query_lines = Vec::new();
    while let Some((n, line)) = lines.next_if(|(_, line)| !line.trim().is_empty()) {
        if line.starts_with('#') {
            continue;
        }
        let is_continuation = line.starts_with(char::is_whitespace);
        if is_continuation && header_lines.len() == 1 {
            query_lines.push(line.trim().to_string());
            continue;
        }
        header_lines.push((n, line));
    }

    // Separator.
    lines.next();
    let body_lines: Vec<(usize, &str)> = lines.collect();

    let Some(&(first_line, _)) = header_lines.first() else {
        return Err(ParseError::EmptyUrl.into());
    };

    let joined = header_lines
        .iter()
        .map(|(_, line)| *line)
        .collect::<Vec<_>>()
        .join("\n");
    let rendered = template::render(&joined, data).map_err(|e| template_error(e, first_line))?;

    let mut rendered_lines = rendered.split('\n').enumerate();
    let (method, url) = rendered_lines
        .next()
        .map(|(_, line)| split_request_line(line))
        .unwrap_or_default();

    let mut headers = Vec::new();
    for (i, line) in rendered_lines {
        if line.trim().is_empty() {
            continue;
        }
        let source_line = header_lines.get(i).map_or(first_line, |(n, _)| *n);
        let (name, value) = line.split_once(':').unwrap_or((line, ""));
        let name = name.trim();
        if name.is_empty() {
            return Err(ParseError::BlankHeaderName { line: source_line }.into());
        }
        headers.push((name.to_string(), value.trim_start().to_string()));
    }

    let body = match body_lines.first() {
        None => String::new(),
        Some(&(n, first)) if first.starts_with(EXPRESSION_PREFIX) => {
            let expression = std::iter::once(&first[EXPRESSION_PREFIX.len_utf8()..])
                .chain(body_lines[1..].iter().map(|(_, line)| *line))
                .collect::<Vec<_>>()
                .join("\n");
            engine.evaluate(&expression, n)?
        }
        Some(&(n, _)) => {
            let text = body_lines
                .iter()
                .map(|(_, line)| *line)
                .collect::<Vec<_>>()
                .join("\n");
            template::render(&text, data).map_err(|e| template_error(e, n))?
        }
    };

    if url.is_empty() {
        return Err(ParseError::EmptyUrl.into());
    }

    Ok(RequestSpec {
        method,
        url,
        headers,
        body: body.trim().to_string(),
        query_lines,
    })
}

/// Split `METHOD URL`; a lone token is a URL fetched with GET
fn split_request_line(line: &str) -> (String, String) {
    let line = line.trim_start();
    match line.split_once(char::is_whitespace) {
        Some((method, rest)) => (
            method.to_uppercase(),
            rest.split_whitespace().collect::<Vec<_>>().join(" "),
        ),
        None => (RequestSpec::DEFAULT_METHOD.to_string(), line.to_string()),
    }
}

fn template_error(err: TemplateError, base_line: usize) -> ParseError {
    ParseError::Template {
        line: base_line + err.line(),
        reason: err.to_string(),
    }
}
