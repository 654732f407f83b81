// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Mustache-style template rendering without HTML escaping
//!
//! Supports the subset request documents rely on:
//!
//! - `{{name}}`, `{{{name}}}` and `{{&name}}` all insert the raw value
//! - dotted names (`{{user.id}}`) and the implicit iterator `{{.}}`
//! - sections `{{#list}}...{{/list}}` and inverted sections `{{^x}}...{{/x}}`
//! - comments `{{! ... }}`
//!
//! Missing names render as the empty string. Partials and delimiter changes
//! are not supported and render nothing.

use serde_json::Value;
use thiserror::Error;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Template syntax error, located by 0-based line within the template text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unclosed tag")]
    UnclosedTag { line: usize },

    #[error("unclosed section `{name}`")]
    UnclosedSection { name: String, line: usize },

    #[error("unexpected closing tag `{name}`")]
    UnexpectedClose { name: String, line: usize },
}

impl TemplateError {
    /// Line of the offending tag, relative to the template start
    pub fn line(&self) -> usize {
        match self {
            TemplateError::UnclosedTag { line }
            | TemplateError::UnclosedSection { line, .. }
            | TemplateError::UnexpectedClose { line, .. } => *line,
        }
    }
}

#[derive(Debug)]
enum Node<'a> {
    Text(&'a str),
    Variable(&'a str),
    Section {
        name: &'a str,
        inverted: bool,
        children: Vec<Node<'a>>,
    },
}

/// Render `template` against `data`
pub fn render(template: &str, data: &Value) -> Result<String, TemplateError> {
    if !template.contains(OPEN) {
        return Ok(template.to_string());
    }

    let nodes = parse(template)?;
    let mut out = String::with_capacity(template.len());
    let mut stack = vec![data];
    render_nodes(&nodes, &mut stack, &mut out);
    Ok(out)
}

fn line_at(template: &str, offset: usize) -> usize {
    template[..offset].matches('\n').count()
}

fn parse(template: &str) -> Result<Vec<Node<'_>>, TemplateError> {
    // Each frame holds the open section name, its line, inversion and children.
    let mut frames: Vec<(&str, usize, bool, Vec<Node<'_>>)> = vec![("", 0, false, Vec::new())];
    let mut offset = 0;

    while let Some(found) = template[offset..].find(OPEN) {
        let tag_offset = offset + found;
        let after_open = &template[tag_offset + OPEN.len()..];
        let (tag, tag_end, triple) = if let Some(inner) = after_open.strip_prefix('{') {
            let end = inner
                .find("}}}")
                .ok_or(TemplateError::UnclosedTag { line: line_at(template, tag_offset) })?;
            (&inner[..end], tag_offset + OPEN.len() + 1 + end + 3, true)
        } else {
            let end = after_open
                .find(CLOSE)
                .ok_or(TemplateError::UnclosedTag { line: line_at(template, tag_offset) })?;
            (&after_open[..end], tag_offset + OPEN.len() + end + CLOSE.len(), false)
        };

        let tag = tag.trim();
        let sigil = if triple { None } else { tag.chars().next() };

        // Block tags alone on a line take the whole line with them.
        let (text_end, next) = match sigil {
            Some('#' | '^' | '/' | '!' | '>' | '=') => {
                standalone_line(template, tag_offset, tag_end).unwrap_or((tag_offset, tag_end))
            }
            _ => (tag_offset, tag_end),
        };
        if text_end > offset {
            push_node(&mut frames, Node::Text(&template[offset..text_end]));
        }

        match sigil {
            Some('#' | '^') => {
                frames.push((
                    tag[1..].trim(),
                    line_at(template, tag_offset),
                    sigil == Some('^'),
                    Vec::new(),
                ));
            }
            Some('/') => {
                let name = tag[1..].trim();
                if frames.len() < 2 || frames.last().map(|f| f.0) != Some(name) {
                    return Err(TemplateError::UnexpectedClose {
                        name: name.to_string(),
                        line: line_at(template, tag_offset),
                    });
                }
                if let Some((name, _, inverted, children)) = frames.pop() {
                    push_node(
                        &mut frames,
                        Node::Section {
                            name,
                            inverted,
                            children,
                        },
                    );
                }
            }
            Some('!' | '>' | '=') => {}
            Some('&') => push_node(&mut frames, Node::Variable(tag[1..].trim())),
            _ => push_node(&mut frames, Node::Variable(tag)),
        }

        offset = next;
    }

    if offset < template.len() {
        push_node(&mut frames, Node::Text(&template[offset..]));
    }

    if frames.len() > 1 {
        let (name, line, _, _) = frames.swap_remove(1);
        return Err(TemplateError::UnclosedSection {
            name: name.to_string(),
            line,
        });
    }

    Ok(frames.pop().map(|f| f.3).unwrap_or_default())
}

/// Span of the line holding the tag at `start..end`, newline included, when
/// nothing but whitespace shares the line with it
fn standalone_line(template: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    let line_start = template[..start].rfind('\n').map_or(0, |i| i + 1);
    let line_end = template[end..].find('\n').map_or(template.len(), |i| end + i + 1);
    let alone = template[line_start..start].trim().is_empty() && template[end..line_end].trim().is_empty();
    alone.then_some((line_start, line_end))
}

fn push_node<'a>(frames: &mut [(&'a str, usize, bool, Vec<Node<'a>>)], node: Node<'a>) {
    if let Some(frame) = frames.last_mut() {
        frame.3.push(node);
    }
}

fn render_nodes<'v>(nodes: &[Node<'_>], stack: &mut Vec<&'v Value>, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Variable(name) => {
                if let Some(value) = lookup(stack, name) {
                    out.push_str(&to_text(value));
                }
            }
            Node::Section {
                name,
                inverted,
                children,
            } => {
                let value = lookup(stack, name);
                if *inverted {
                    if !value.map_or(false, is_truthy) {
                        render_nodes(children, stack, out);
                    }
                    continue;
                }

                match value {
                    Some(Value::Array(items)) => {
                        for item in items {
                            stack.push(item);
                            render_nodes(children, stack, out);
                            stack.pop();
                        }
                    }
                    Some(Value::Bool(true)) => render_nodes(children, stack, out),
                    Some(value) if is_truthy(value) => {
                        stack.push(value);
                        render_nodes(children, stack, out);
                        stack.pop();
                    }
                    _ => {}
                }
            }
        }
    }
}

fn lookup<'v>(stack: &[&'v Value], name: &str) -> Option<&'v Value> {
    if name == "." {
        return stack.last().copied();
    }

    let mut parts = name.split('.');
    let first = parts.next()?;
    let mut value = stack
        .iter()
        .rev()
        .find_map(|frame| frame.as_object().and_then(|o| o.get(first)))?;

    for part in parts {
        value = match value {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(value)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

/// Text form of a value as it appears in rendered output
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(to_text).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}
