//! Rule-file loading for flare.
//!
//! [`load_rules`] reads a rule file — YAML, TOML, or JSON, format inferred
//! from the extension — with a top-level `rules` list and compiles it.
//! [`default_rules`] returns the built-in rule set embedded below without
//! touching the filesystem (useful as a fallback and in tests).

use crate::rules::{RuleDefinition, RuleSet};
use anyhow::Context;
use std::path::Path;

// ---------------------------------------------------------------------------
// Embedded defaults
// ---------------------------------------------------------------------------

const DEFAULT_RULES: &str = r#"
rules:
  - name: panic
    pattern: '(?i)\b(panic|fatal|segfault)\b'
    severity: critical
    color: red
    tags: [runtime]
    description: Process-killing failures

  - name: error
    pattern: '(?i)\berror\b'
    severity: high
    color: red
    tags: [runtime]
    description: Generic error lines

  - name: auth-failure
    pattern: '(?i)(authentication failure|failed password|invalid user)'
    severity: high
    color: magenta
    tags: [security, auth]
    description: Failed login attempts

  - name: warn
    pattern: '(?i)\bwarn(ing)?\b'
    severity: medium
    color: yellow
    tags: [runtime]
    description: Warnings worth a glance

  - name: timeout
    pattern: '(?i)\btime[d ]?out\b'
    severity: medium
    color: yellow
    tags: [network]
    description: Timed-out operations
"#;

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Shape of a rule file: a single top-level `rules` list.
#[derive(Debug, serde::Deserialize)]
struct RuleFile {
    rules: Vec<RuleDefinition>,
}

/// Read and compile the rule file at `path`.
pub fn load_rules(path: &Path) -> anyhow::Result<RuleSet> {
    let file: RuleFile = config::Config::builder()
        .add_source(config::File::from(path))
        .build()
        .with_context(|| format!("read rule file {}", path.display()))?
        .try_deserialize()
        .with_context(|| format!("parse rule file {}", path.display()))?;

    RuleSet::compile(&file.rules)
        .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))
}

/// Compile the built-in default rule set.
pub fn default_rules() -> RuleSet {
    let file: RuleFile = config::Config::builder()
        .add_source(config::File::from_str(
            DEFAULT_RULES,
            config::FileFormat::Yaml,
        ))
        .build()
        .expect("built-in default rules must be valid YAML")
        .try_deserialize()
        .expect("built-in default rules must deserialize correctly");

    RuleSet::compile(&file.rules).expect("built-in default rules must compile")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
