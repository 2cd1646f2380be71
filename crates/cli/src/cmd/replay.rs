//! Replay a recorded session

use anyhow::{Context, Result};
use cli_lib::config;
use cli_lib::session::{self, Session};
use cli_lib::{Appearance, ConsoleReporter, ConsoleTheme};
use owo_colors::OwoColorize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;
use watcher::{LogSink, ReportSink};

pub async fn run(
    config_path: Option<&Path>,
    session_path: &Path,
    appearance: Option<Appearance>,
    no_color: bool,
    debounce_ms: Option<u64>,
    log_only: bool,
) -> Result<()> {
    // 1. Effective configuration
    let mut config = match config::config_path(config_path) {
        Some(path) => config::load(&path)?,
        None => Default::default(),
    };
    if let Some(ms) = debounce_ms {
        config.engine.debounce_ms = ms;
        config.validate().context("Invalid --debounce-ms")?;
    }
    let appearance = appearance.unwrap_or(config.console.appearance);
    let color = config.console.color && !no_color;

    // 2. Session and page
    let text = std::fs::read_to_string(session_path)
        .with_context(|| format!("Failed to read session {}", session_path.display()))?;
    let session = Session::from_json(&text)
        .with_context(|| format!("Failed to load session {}", session_path.display()))?;
    let document = session.build_document()?;

    // 3. Replay, printing reports as they arrive (or logging them)
    let reporter = (!log_only).then(|| {
        Arc::new(
            ConsoleReporter::new(
                std::io::stdout(),
                ConsoleTheme::for_appearance(appearance),
                color,
            )
            .with_document(Arc::clone(&document)),
        )
    });
    let sink: Arc<dyn ReportSink> = match &reporter {
        Some(reporter) => reporter.clone(),
        None => Arc::new(LogSink),
    };
    debug!(?appearance, color, log_only, "report sink ready");

    let started = Instant::now();
    let summary = session::replay(&session, document, config.engine, sink)
        .await
        .context("Replay failed")?;

    // 4. Summary
    println!();
    println!("{}", "Replay Summary".bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Session:       {}", session_path.display().to_string().cyan());
    println!("Steps:         {}", session.timeline.len());
    println!(
        "Audits:        {} completed, {} failed, {} pre-empted",
        summary.stats.completed,
        summary.stats.failed,
        summary.stats.preempted
    );
    match reporter.as_ref().map(|r| r.totals()) {
        Some(totals) => {
            println!(
                "Reported:      {} violation(s) on {} node(s)",
                totals.violations, totals.nodes
            );
            if totals.errors > 0 {
                println!(
                    "{}",
                    format!("Instrumentation errors: {}", totals.errors).yellow()
                );
            }
        }
        None => println!("Reported:      {}", "to the log".dimmed()),
    }
    println!("Journal:       {} distinct issue(s)", summary.journal_size);
    println!("Tracked:       {} component(s)", summary.tracked_units);
    for (index, scan) in summary.scans.iter().enumerate() {
        let label = if index == 0 { "initial".to_string() } else { format!("scan {index}") };
        match scan {
            Ok(report) => println!(
                "  {} {} {}",
                "✓".green(),
                label,
                format!("({} new, id {})", report.violations.len(), report.scan_id).dimmed()
            ),
            Err(e) => println!("  {} {} {}", "✗".red(), label, e.to_string().yellow()),
        }
    }
    if summary.unused_audits > 0 {
        println!(
            "{}",
            format!("{} scripted audit result(s) were never used", summary.unused_audits)
                .dimmed()
        );
    }
    println!(
        "{}",
        format!("Finished in {:.2}s", started.elapsed().as_secs_f64()).dimmed()
    );

    Ok(())
}
