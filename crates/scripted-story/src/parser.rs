//! Script parsing

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use story_mcp_core::{CompileResult, Result, StoryMcpError};

/// One parsed script node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Node {
    Line {
        text: String,
        tags: Vec<String>,
        /// Assignments applied when this line is emitted
        assigns: Vec<(String, Value)>,
    },
    Choices(Vec<ChoiceDef>),
    Divert(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceDef {
    pub text: String,
    pub tags: Vec<String>,
    pub target: Option<String>,
}

/// A fully parsed script
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    pub nodes: Vec<Node>,
    pub labels: HashMap<String, usize>,
    pub vars: HashMap<String, Value>,
    pub functions: HashMap<String, Value>,
    pub global_tags: Vec<String>,
}

/// Position past the last node, used as the END target
pub const END_LABEL: &str = "END";

/// Parse source, collecting all errors instead of stopping at the first.
pub fn compile(source: &str) -> CompileResult {
    let mut program = Program::default();
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut pending_assigns: Vec<(String, Value)> = Vec::new();
    let mut pending_choices: Vec<ChoiceDef> = Vec::new();
    let mut pending_header: Option<String> = None;
    let mut seen_content = false;

    let close_choices = |program: &mut Program, pending: &mut Vec<ChoiceDef>| {
        if !pending.is_empty() {
            program.nodes.push(Node::Choices(std::mem::take(pending)));
        }
    };

    for (lineno, raw) in source.lines().enumerate() {
        let line = raw.trim();
        let lineno = lineno + 1;
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("===").or_else(|| line.strip_prefix("==")) {
            close_choices(&mut program, &mut pending_choices);
            let label = rest.trim().trim_end_matches('=').trim();
            if label.is_empty() {
                errors.push(format!("line {lineno}: empty label"));
            } else {
                if program
                    .labels
                    .insert(label.to_string(), program.nodes.len())
                    .is_some()
                {
                    warnings.push(format!("line {lineno}: duplicate label '{label}'"));
                }
                pending_header = Some(label.to_string());
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix('=') {
            close_choices(&mut program, &mut pending_choices);
            let label = rest.trim();
            if label.is_empty() {
                errors.push(format!("line {lineno}: empty label"));
            } else {
                if program
                    .labels
                    .insert(label.to_string(), program.nodes.len())
                    .is_some()
                {
                    warnings.push(format!("line {lineno}: duplicate label '{label}'"));
                }
                pending_header = Some(label.to_string());
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("VAR ") {
            match parse_binding(rest) {
                Ok((name, value)) => {
                    program.vars.insert(name, value);
                }
                Err(e) => errors.push(format!("line {lineno}: {e}")),
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("FUNC ") {
            match parse_binding(rest) {
                Ok((name, value)) => {
                    program.functions.insert(name, value);
                }
                Err(e) => errors.push(format!("line {lineno}: {e}")),
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix('~') {
            match parse_binding(rest.trim()) {
                Ok(binding) => pending_assigns.push(binding),
                Err(e) => errors.push(format!("line {lineno}: {e}")),
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix('#') {
            if seen_content {
                warnings.push(format!(
                    "line {lineno}: tag line after content is ignored"
                ));
            } else {
                program.global_tags.push(rest.trim().to_string());
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix('*') {
            seen_content = true;
            let (body, target) = split_divert(rest.trim());
            let (text, tags) = split_tags(&body);
            if text.is_empty() {
                errors.push(format!("line {lineno}: choice with no text"));
                continue;
            }
            pending_choices.push(ChoiceDef { text, tags, target });
            continue;
        }

        if let Some(rest) = line.strip_prefix("->") {
            seen_content = true;
            close_choices(&mut program, &mut pending_choices);
            let target = rest.trim();
            if target.is_empty() {
                errors.push(format!("line {lineno}: divert with no target"));
            } else {
                program.nodes.push(Node::Divert(target.to_string()));
            }
            continue;
        }

        // Plain content line. A section header rides on the first line after
        // it, so location breakpoints can spot the `== name` marker in output.
        seen_content = true;
        close_choices(&mut program, &mut pending_choices);
        let (text, tags) = split_tags(line);
        let text = match pending_header.take() {
            Some(label) => format!("== {label}\n{text}"),
            None => text,
        };
        program.nodes.push(Node::Line {
            text,
            tags,
            assigns: std::mem::take(&mut pending_assigns),
        });
    }

    close_choices(&mut program, &mut pending_choices);

    if !pending_assigns.is_empty() {
        warnings.push("assignments at end of script have no line to attach to".to_string());
    }
    if program.nodes.is_empty() {
        warnings.push("script has no content".to_string());
    }

    // Diverts must resolve
    for node in &program.nodes {
        let targets: Vec<&str> = match node {
            Node::Divert(t) => vec![t.as_str()],
            Node::Choices(choices) => choices
                .iter()
                .filter_map(|c| c.target.as_deref())
                .collect(),
            Node::Line { .. } => Vec::new(),
        };
        for target in targets {
            if target != END_LABEL && !program.labels.contains_key(target) {
                errors.push(format!("divert to unknown label '{target}'"));
            }
        }
    }

    if errors.is_empty() {
        let json = serde_json::to_string(&program).ok();
        CompileResult {
            success: true,
            json,
            errors,
            warnings,
        }
    } else {
        CompileResult {
            success: false,
            json: None,
            errors,
            warnings,
        }
    }
}

/// Parse, failing on the first compile error
pub fn parse(source: &str) -> Result<Program> {
    let result = compile(source);
    if !result.success {
        return Err(StoryMcpError::CompileFailed(result.errors.join("; ")));
    }
    let json = result
        .json
        .ok_or_else(|| StoryMcpError::CompileFailed("no program emitted".into()))?;
    Ok(serde_json::from_str(&json)?)
}

/// `name = <json>`; bare words parse as strings
fn parse_binding(input: &str) -> std::result::Result<(String, Value), String> {
    let (name, raw) = input
        .split_once('=')
        .ok_or_else(|| format!("expected 'name = value', got '{input}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("binding with empty name".to_string());
    }
    let raw = raw.trim();
    let value = serde_json::from_str(raw)
        .unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((name.to_string(), value))
}

/// Split trailing ` -> label` off a choice body
fn split_divert(input: &str) -> (String, Option<String>) {
    match input.rsplit_once("->") {
        Some((body, target)) => (body.trim().to_string(), Some(target.trim().to_string())),
        None => (input.to_string(), None),
    }
}

/// Split trailing `#tag` markers off a line
fn split_tags(input: &str) -> (String, Vec<String>) {
    match input.find(" #") {
        Some(i) => {
            let text = input[..i].trim().to_string();
            let tags = input[i..]
                .split('#')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
            (text, tags)
        }
        None => (input.trim().to_string(), Vec::new()),
    }
}
