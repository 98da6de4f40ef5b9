use anyhow::Context;
use clap::Parser;
use flare_core::config::{default_rules, load_rules};
use flare_core::{HighlightedEvent, Severity};
use flare_watch::{rule_groups, ApplyError, Controller, FilterOptions, Selection};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "flare", about = "flare — live log watching with pattern-rule highlighting")]
struct Cli {
    /// Files to watch (comma separated).
    #[arg(long, value_delimiter = ',', default_value = "/var/log/auth.log")]
    files: Vec<PathBuf>,

    /// Rule file (YAML, TOML, or JSON by extension). Built-in rules when omitted.
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Emit every line, not only rule matches above the threshold.
    #[arg(long)]
    show_all: bool,

    /// Lowest severity to emit (critical|high|medium|low|normal).
    #[arg(long, default_value = "medium")]
    min_severity: Severity,

    /// Keep only rules carrying one of these tags (comma separated).
    #[arg(long, value_delimiter = ',')]
    tags: Vec<String>,

    /// Verbose tracing on stderr (equivalent to RUST_LOG=debug).
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let mut rules = match &cli.rules {
        Some(path) => load_rules(path)?,
        None => default_rules(),
    };
    if !cli.tags.is_empty() {
        rules = rules.filter_by_tags(&cli.tags);
        anyhow::ensure!(
            !rules.is_empty(),
            "no rules carry the requested tags: {}",
            cli.tags.join(", ")
        );
    }
    for group in rule_groups(&rules) {
        tracing::debug!(tag = %group.tag, count = group.count, "rule group");
    }

    let selection = selection_from(&cli.files);
    let total = selection.paths.len();
    anyhow::ensure!(total > 0, "no files supplied via --files");

    let mut controller = Controller::spawn(
        rules,
        FilterOptions {
            show_all: cli.show_all,
            min_severity: cli.min_severity,
        },
    );
    let mut events = controller
        .events()
        .context("event stream already taken")?;

    if let Err(err) = controller.apply(selection).await {
        // Keep running on partial success; bail only when nothing started.
        let all_failed = match &err {
            ApplyError::Sources { failures } => failures.len() == total,
            ApplyError::Closed => true,
        };
        anyhow::ensure!(!all_failed, "start tailing: {err}");
        tracing::warn!(%err, "some sources failed to start");
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            event = events.recv() => match event {
                Some(event) => print_event(&event),
                None => break,
            },
        }
    }

    controller.shutdown().await;
    Ok(())
}

fn init_tracing(debug: bool) {
    let fallback = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback)),
        )
        .init();
}

/// Trim and dedupe the CLI file list, preserving order. The controller's
/// Selection contract puts this on the caller.
fn selection_from(files: &[PathBuf]) -> Selection {
    let mut paths: Vec<PathBuf> = Vec::with_capacity(files.len());
    for file in files {
        let trimmed = file.to_string_lossy();
        let trimmed = trimmed.trim();
        if trimmed.is_empty() {
            continue;
        }
        let path = PathBuf::from(trimmed);
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
    Selection { paths }
}

fn print_event(event: &HighlightedEvent) {
    let ts = event.ts.format("%H:%M:%S%.3f");
    if let Some(err) = &event.error {
        println!("{ts} {} !! read error: {err}", event.path.display());
        return;
    }

    let mut line = String::with_capacity(event.line.len() + 16);
    for fragment in &event.fragments {
        if fragment.emphasized {
            line.push_str("\x1b[1m");
            line.push_str(&fragment.text);
            line.push_str("\x1b[0m");
        } else {
            line.push_str(&fragment.text);
        }
    }
    match &event.rule {
        Some(rule) => println!(
            "{ts} {} [{}:{rule}] {line}",
            event.path.display(),
            event.severity
        ),
        None => println!("{ts} {} {line}", event.path.display()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
