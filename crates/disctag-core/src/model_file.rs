//! Text format of weight files.
//!
//! A weight file is an optional free-text header followed by one record per
//! feature:
//!
//! ```text
//! This model was written at unix time 1700000000.
//! Parameters:
//! epochs 5
//! * tag_set_file data/tags.txt
//! ((word PER-ST John) 2.5)
//! ((word NONE-ST went) 1)
//! ```
//!
//! Header lines of the form `* key value` are consistency parameters. Record
//! parsing starts at the first line beginning with `(`. Inside records the
//! characters `(`, `)`, `\` and whitespace are backslash-escaped.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::Path;

use tracing::warn;

use crate::error::{DiscTagError, Result};
use crate::feature::Feature;
use crate::symbol::Symbol;

/// Header of a weight file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelHeader {
    /// Free text written before the parameter block.
    pub notes: Vec<String>,
    /// Parameters recorded for reference only.
    pub parameters: Vec<(String, String)>,
    /// Parameters checked against the reader's settings.
    pub consistency: Vec<(String, String)>,
}

impl ModelHeader {
    /// Empty header.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line of free text.
    pub fn note(mut self, line: impl Into<String>) -> Self {
        self.notes.push(line.into());
        self
    }

    /// Record a parameter for reference.
    pub fn parameter(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.parameters.push((key.into(), value.to_string()));
        self
    }

    /// Record a parameter that readers compare with their own settings.
    pub fn consistency_parameter(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.consistency.push((key.into(), value.to_string()));
        self
    }

    /// Whether the header has no notes and no parameters.
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty() && self.parameters.is_empty() && self.consistency.is_empty()
    }

    /// Write the header block. Nothing is written for an empty header.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        for line in &self.notes {
            writeln!(out, "{line}")?;
        }
        if !self.parameters.is_empty() || !self.consistency.is_empty() {
            writeln!(out, "Parameters:")?;
        }
        for (key, value) in &self.parameters {
            writeln!(out, "{key} {}", display_value(value))?;
        }
        for (key, value) in &self.consistency {
            writeln!(out, "* {key} {}", display_value(value))?;
        }
        Ok(())
    }

    fn parse_line(&mut self, line: &str, in_parameters: &mut bool) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }
        if trimmed == "Parameters:" {
            *in_parameters = true;
            return;
        }
        if let Some(rest) = trimmed.strip_prefix("* ") {
            let (key, value) = split_key_value(rest);
            self.consistency.push((key, value));
        } else if *in_parameters {
            let (key, value) = split_key_value(trimmed);
            self.parameters.push((key, value));
        } else {
            self.notes.push(trimmed.to_string());
        }
    }

    /// Compare the consistency parameters with the caller's current settings.
    ///
    /// Mismatches are logged and returned; they are never errors. Keys the
    /// caller does not know are ignored. Path-like values are compared by
    /// their final component.
    pub fn check_consistency(
        &self,
        current: &BTreeMap<String, String>,
        source: &Path,
    ) -> Vec<String> {
        let mut mismatched = Vec::new();
        for (key, recorded) in &self.consistency {
            let Some(expected) = current.get(key) else {
                continue;
            };
            if strip_directory(recorded) != strip_directory(expected) {
                warn!(
                    model = %source.display(),
                    parameter = %key,
                    recorded = %recorded,
                    current = %expected,
                    "model was trained with a different parameter value"
                );
                mismatched.push(key.clone());
            }
        }
        mismatched
    }
}

fn display_value(value: &str) -> &str {
    if value.is_empty() { "NULL" } else { value }
}

fn split_key_value(text: &str) -> (String, String) {
    let mut parts = text.splitn(2, char::is_whitespace);
    let key = parts.next().unwrap_or_default().to_string();
    let value = parts.next().unwrap_or_default().trim();
    let value = if value == "NULL" { "" } else { value };
    (key, value.to_string())
}

fn strip_directory(value: &str) -> &str {
    value.rsplit(['/', '\\']).next().unwrap_or(value)
}

/// Escape a symbol so it reads back as a single record token.
pub fn escape_token(token: &str) -> String {
    if token.is_empty() {
        return "\\e".to_string();
    }
    let mut out = String::with_capacity(token.len());
    for c in token.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            ' ' => out.push_str("\\s"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

/// Write one record: `((type tag payload...) weight)`.
pub fn write_record<W: Write>(out: &mut W, feature: &Feature, weight: f64) -> Result<()> {
    write!(
        out,
        "(({} {}",
        escape_token(feature.type_name()),
        escape_token(&feature.tag)
    )?;
    for item in feature.payload() {
        write!(out, " {}", escape_token(item))?;
    }
    writeln!(out, ") {weight})")?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    Atom(String),
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars();
    let mut atom: Option<String> = None;

    while let Some(c) = chars.next() {
        match c {
            '(' | ')' => {
                if let Some(a) = atom.take() {
                    tokens.push(Token::Atom(a));
                }
                tokens.push(if c == '(' { Token::Open } else { Token::Close });
            }
            c if c.is_whitespace() => {
                if let Some(a) = atom.take() {
                    tokens.push(Token::Atom(a));
                }
            }
            '\\' => {
                let escaped = chars.next().ok_or_else(|| {
                    DiscTagError::ModelLoad("weight file ends inside an escape".into())
                })?;
                let a = atom.get_or_insert_with(String::new);
                match escaped {
                    's' => a.push(' '),
                    't' => a.push('\t'),
                    'n' => a.push('\n'),
                    'r' => a.push('\r'),
                    'e' => {}
                    other => a.push(other),
                }
            }
            c => atom.get_or_insert_with(String::new).push(c),
        }
    }
    if let Some(a) = atom.take() {
        tokens.push(Token::Atom(a));
    }
    Ok(tokens)
}

/// Parsed contents of a weight file.
#[derive(Debug, Clone, Default)]
pub struct ModelFile {
    pub header: ModelHeader,
    pub records: Vec<(Feature, f64)>,
}

impl ModelFile {
    /// Parse a header followed by feature records.
    pub fn read_from<R: BufRead>(input: R) -> Result<Self> {
        let mut header = ModelHeader::new();
        let mut body = String::new();
        let mut in_body = false;
        let mut in_parameters = false;

        for line in input.lines() {
            let line = line?;
            if !in_body && line.trim_start().starts_with('(') {
                in_body = true;
            }
            if in_body {
                body.push_str(&line);
                body.push('\n');
            } else {
                header.parse_line(&line, &mut in_parameters);
            }
        }

        let records = parse_records(&body)?;
        Ok(Self { header, records })
    }
}

fn parse_records(body: &str) -> Result<Vec<(Feature, f64)>> {
    let tokens = tokenize(body)?;
    let mut records = Vec::new();
    let mut iter = tokens.into_iter();

    loop {
        match iter.next() {
            None => break,
            Some(Token::Open) => {}
            Some(other) => {
                return Err(malformed(records.len(), &format!("expected '(' but found {other:?}")));
            }
        }
        if iter.next() != Some(Token::Open) {
            return Err(malformed(records.len(), "expected '((' at record start"));
        }

        let mut atoms = Vec::new();
        loop {
            match iter.next() {
                Some(Token::Atom(a)) => atoms.push(a),
                Some(Token::Close) => break,
                Some(Token::Open) => return Err(malformed(records.len(), "nested '(' in feature")),
                None => return Err(malformed(records.len(), "unterminated feature")),
            }
        }
        if atoms.len() < 2 {
            return Err(malformed(records.len(), "feature needs a type and a tag"));
        }

        let weight = match iter.next() {
            Some(Token::Atom(a)) => a.parse::<f64>().map_err(|_| {
                malformed(records.len(), &format!("weight '{a}' is not a number"))
            })?,
            _ => return Err(malformed(records.len(), "missing weight")),
        };
        if iter.next() != Some(Token::Close) {
            return Err(malformed(records.len(), "missing ')' after weight"));
        }

        let mut atoms = atoms.into_iter().map(Symbol::from);
        let (Some(type_name), Some(tag)) = (atoms.next(), atoms.next()) else {
            return Err(malformed(records.len(), "feature needs a type and a tag"));
        };
        records.push((Feature::new(type_name, tag, atoms.collect()), weight));
    }
    Ok(records)
}

fn malformed(record: usize, detail: &str) -> DiscTagError {
    DiscTagError::ModelLoad(format!("malformed weight record {record}: {detail}"))
}
