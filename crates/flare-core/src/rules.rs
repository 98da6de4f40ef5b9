//! Rule compilation and matching.
//!
//! A [`RuleSet`] is compiled once from external [`RuleDefinition`]s and is
//! immutable afterwards; swapping rule sets at runtime means compiling a new
//! one and replacing the whole thing. Evaluation order — severity rank
//! ascending, then declaration index ascending — is computed at compile time
//! and reused on every match.
//!
//! Matching is first-match-wins: the first rule in evaluation order whose
//! pattern appears anywhere in the line claims it, and lower-ranked rules are
//! never consulted. The winner reports named captures from its first
//! occurrence and highlight spans for every occurrence.

use crate::types::{Severity, Span};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;

/// External rule schema as it appears in a rule file.
///
/// `severity` is a free-form label here; unknown or empty values normalise to
/// `medium` during compilation. All fields except `name` and `pattern` are
/// optional in the file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleDefinition {
    pub name: String,
    pub pattern: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: String,
}

/// A compiled rule. Immutable after compilation.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub pattern: String,
    pub severity: Severity,
    pub color: String,
    pub tags: Vec<String>,
    pub description: String,
    regex: Regex,
    /// Position in the source definitions; tie-break within a severity rank.
    index: usize,
}

impl Rule {
    /// Declaration position in the source definition list.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Why a single rule failed to compile.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("rule {name:?} is missing a pattern")]
    EmptyPattern { name: String },
    #[error("rule {name:?}: {source}")]
    InvalidPattern {
        name: String,
        #[source]
        source: Box<regex::Error>,
    },
}

/// Aggregate compile failure naming every offending rule.
///
/// Compilation is all-or-nothing: one invalid rule aborts the whole call and
/// nothing is partially applied.
#[derive(Debug)]
pub struct CompileError {
    pub errors: Vec<RuleError>,
}

impl std::error::Error for CompileError {}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} invalid rule(s): ", self.errors.len())?;
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

/// The context returned when a rule claims a line.
#[derive(Debug)]
pub struct Match<'rs> {
    /// The winning rule.
    pub rule: &'rs Rule,
    /// Named captures from the first occurrence only.
    pub captures: HashMap<String, String>,
    /// Non-overlapping spans of every occurrence of the winning pattern.
    pub spans: Vec<Span>,
}

/// An immutable, ordered collection of compiled rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    /// Rules in declaration order.
    rules: Vec<Rule>,
    /// Indices into `rules` in evaluation order (severity rank, then
    /// declaration index). Cached once at compile time.
    eval_order: Vec<usize>,
}

impl RuleSet {
    /// Validate and compile `defs` into an immutable rule set.
    ///
    /// Every definition must carry a non-empty, syntactically valid pattern;
    /// all failures are collected into one [`CompileError`]. Unknown or empty
    /// severity labels normalise to [`Severity::Medium`].
    pub fn compile(defs: &[RuleDefinition]) -> Result<RuleSet, CompileError> {
        let mut rules = Vec::with_capacity(defs.len());
        let mut errors = Vec::new();

        for (index, def) in defs.iter().enumerate() {
            if def.pattern.is_empty() {
                errors.push(RuleError::EmptyPattern {
                    name: def.name.clone(),
                });
                continue;
            }
            match Regex::new(&def.pattern) {
                Ok(regex) => rules.push(Rule {
                    name: def.name.clone(),
                    pattern: def.pattern.clone(),
                    severity: Severity::from_label(&def.severity),
                    color: def.color.clone(),
                    tags: def.tags.clone(),
                    description: def.description.clone(),
                    regex,
                    index,
                }),
                Err(source) => errors.push(RuleError::InvalidPattern {
                    name: def.name.clone(),
                    source: Box::new(source),
                }),
            }
        }

        if !errors.is_empty() {
            return Err(CompileError { errors });
        }
        Ok(RuleSet::from_rules(rules))
    }

    fn from_rules(rules: Vec<Rule>) -> RuleSet {
        let mut eval_order: Vec<usize> = (0..rules.len()).collect();
        eval_order.sort_by_key(|&i| (rules[i].severity.rank(), rules[i].index));
        RuleSet { rules, eval_order }
    }

    /// Rules in declaration order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Rules in evaluation order: severity rank ascending, declaration index
    /// ascending. Stable across calls.
    pub fn eval_rules(&self) -> impl Iterator<Item = &Rule> {
        self.eval_order.iter().map(|&i| &self.rules[i])
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate `line` against the set, returning the first matching rule in
    /// evaluation order, or `None` if nothing matches.
    pub fn match_line(&self, line: &str) -> Option<Match<'_>> {
        for rule in self.eval_rules() {
            let Some(caps) = rule.regex.captures(line) else {
                continue;
            };
            let captures = named_captures(rule, &caps);
            let spans = rule
                .regex
                .find_iter(line)
                .map(|m| Span::new(m.start(), m.end()))
                .collect();
            return Some(Match {
                rule,
                captures,
                spans,
            });
        }
        None
    }

    /// The subset of rules carrying at least one tag case-insensitively equal
    /// to a member of `tags`. An empty or all-blank request returns the set
    /// unchanged. Declaration indices survive filtering, so relative
    /// evaluation order is preserved.
    pub fn filter_by_tags(&self, tags: &[String]) -> RuleSet {
        let selected: Vec<String> = tags
            .iter()
            .map(|t| t.trim().to_ascii_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        if selected.is_empty() {
            return self.clone();
        }

        let rules: Vec<Rule> = self
            .rules
            .iter()
            .filter(|rule| {
                rule.tags
                    .iter()
                    .any(|tag| selected.iter().any(|s| s == &tag.to_ascii_lowercase()))
            })
            .cloned()
            .collect();
        RuleSet::from_rules(rules)
    }
}

/// Named captures from the first occurrence of the winning pattern.
fn named_captures(rule: &Rule, caps: &regex::Captures<'_>) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for name in rule.regex.capture_names().flatten() {
        if let Some(m) = caps.name(name) {
            out.insert(name.to_string(), m.as_str().to_string());
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
