//! Markup rendering facility
//!
//! Markup is rendered through the [`MarkupEngine`] trait so the engine
//! never depends on a concrete template language. [`MarkupLibrary`] is the
//! bundled implementation: named templates with `{{ expr }}` (escaped) and
//! `{{{ expr }}}` (raw) substitutions.
//!
//! Expressions are deliberately small:
//!
//! - `object.label`: dotted path into the data
//! - `!path`: negation
//! - `path == "value"` / `path != "value"`: string comparison
//! - `true` / `false`

use crate::core::error::PipelineError;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

/// External rendering facility used by steps
pub trait MarkupEngine: Send + Sync {
    /// Render the named template with `data`, appending to `sink`
    fn execute(&self, sink: &mut String, name: &str, data: &Value) -> Result<(), PipelineError>;

    /// Whether a template with this name exists
    fn contains(&self, name: &str) -> bool;
}

fn tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| {
        Regex::new(r"\{\{\{\s*(.*?)\s*\}\}\}|\{\{\s*(.*?)\s*\}\}").expect("tag pattern is valid")
    })
}

fn path_regex() -> &'static Regex {
    static PATH: OnceLock<Regex> = OnceLock::new();
    PATH.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][\w-]*(\.[\w-]+)*$").expect("path pattern is valid")
    })
}

/// Compiled expression inside a tag
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(bool),
    Path(Vec<String>),
    Not(Box<Expression>),
    Equals(Vec<String>, String),
    NotEquals(Vec<String>, String),
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, PipelineError> {
        let source = source.trim();

        match source {
            "true" => return Ok(Expression::Literal(true)),
            "false" => return Ok(Expression::Literal(false)),
            _ => {}
        }

        if let Some(rest) = source.strip_prefix('!') {
            if !rest.starts_with('=') {
                return Ok(Expression::Not(Box::new(Self::parse(rest)?)));
            }
        }

        if let Some((left, right)) = source.split_once("!=") {
            return Ok(Expression::NotEquals(parse_path(left)?, parse_literal(right)));
        }

        if let Some((left, right)) = source.split_once("==") {
            return Ok(Expression::Equals(parse_path(left)?, parse_literal(right)));
        }

        Ok(Expression::Path(parse_path(source)?))
    }

    pub fn evaluate(&self, data: &Value) -> Value {
        match self {
            Expression::Literal(b) => Value::Bool(*b),
            Expression::Path(path) => lookup(data, path).cloned().unwrap_or(Value::Null),
            Expression::Not(inner) => Value::Bool(!is_truthy(&inner.evaluate(data))),
            Expression::Equals(path, literal) => {
                Value::Bool(stringify(lookup(data, path).unwrap_or(&Value::Null)) == *literal)
            }
            Expression::NotEquals(path, literal) => {
                Value::Bool(stringify(lookup(data, path).unwrap_or(&Value::Null)) != *literal)
            }
        }
    }
}

fn parse_path(source: &str) -> Result<Vec<String>, PipelineError> {
    let source = source.trim();
    if !path_regex().is_match(source) {
        return Err(PipelineError::Template(format!(
            "invalid expression: '{}'",
            source
        )));
    }
    Ok(source.split('.').map(str::to_string).collect())
}

fn parse_literal(source: &str) -> String {
    let source = source.trim();
    for quote in ['"', '\''] {
        if source.len() >= 2 && source.starts_with(quote) && source.ends_with(quote) {
            return source[1..source.len() - 1].to_string();
        }
    }
    source.to_string()
}

fn lookup<'a>(data: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(data, |current, key| match current {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Render a value the way it appears in output
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Truthiness used by conditions: everything except "", "false", "0", "null"
pub fn is_truthy_str(rendered: &str) -> bool {
    !matches!(rendered.trim(), "" | "false" | "0" | "null")
}

pub fn is_truthy(value: &Value) -> bool {
    is_truthy_str(&stringify(value))
}

/// Escape text for inclusion in HTML
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Escaped(Expression),
    Raw(Expression),
}

/// A compiled markup template
#[derive(Debug, Clone, PartialEq)]
pub struct Markup {
    source: String,
    segments: Vec<Segment>,
}

impl Markup {
    pub fn compile(source: &str) -> Result<Self, PipelineError> {
        let mut segments = Vec::new();
        let mut last = 0;

        for captures in tag_regex().captures_iter(source) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            if whole.start() > last {
                segments.push(Segment::Text(source[last..whole.start()].to_string()));
            }

            if let Some(raw) = captures.get(1) {
                segments.push(Segment::Raw(Expression::parse(raw.as_str())?));
            } else if let Some(escaped) = captures.get(2) {
                segments.push(Segment::Escaped(Expression::parse(escaped.as_str())?));
            }

            last = whole.end();
        }

        if last < source.len() {
            segments.push(Segment::Text(source[last..].to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn render_into(&self, sink: &mut String, data: &Value) {
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => sink.push_str(text),
                Segment::Escaped(expr) => sink.push_str(&escape_html(&stringify(&expr.evaluate(data)))),
                Segment::Raw(expr) => sink.push_str(&stringify(&expr.evaluate(data))),
            }
        }
    }

    pub fn render(&self, data: &Value) -> String {
        let mut out = String::new();
        self.render_into(&mut out, data);
        out
    }

    /// Render without HTML escaping (header values, URLs, field values)
    pub fn render_plain(&self, data: &Value) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Escaped(expr) | Segment::Raw(expr) => {
                    out.push_str(&stringify(&expr.evaluate(data)))
                }
            }
        }
        out
    }
}

/// Named markup templates
#[derive(Debug, Clone, Default)]
pub struct MarkupLibrary {
    templates: HashMap<String, Markup>,
}

impl MarkupLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile every source; fails on the first invalid template
    pub fn from_sources(sources: &HashMap<String, String>) -> Result<Self, PipelineError> {
        let mut library = Self::new();
        for (name, source) in sources {
            library.insert(name, source)?;
        }
        Ok(library)
    }

    pub fn insert(&mut self, name: &str, source: &str) -> Result<(), PipelineError> {
        let markup = Markup::compile(source)
            .map_err(|e| PipelineError::Template(format!("{}: {}", name, e)))?;
        self.templates.insert(name.to_string(), markup);
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        names.sort();
        names
    }
}

impl MarkupEngine for MarkupLibrary {
    fn execute(&self, sink: &mut String, name: &str, data: &Value) -> Result<(), PipelineError> {
        let markup = self
            .templates
            .get(name)
            .ok_or_else(|| PipelineError::Template(format!("markup '{}' is not defined", name)))?;
        markup.render_into(sink, data);
        Ok(())
    }

    fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }
}
