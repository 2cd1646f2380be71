//! Configuration command
//!
//! Shows, validates and creates `axewatch.toml`.

use anyhow::{Context, Result};
use cli_lib::config::{self, AxewatchConfig};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

fn resolve(explicit: Option<&Path>) -> Result<PathBuf> {
    config::config_path(explicit).context("Could not determine config file path")
}

/// List the effective configuration
pub fn run_list(explicit: Option<&Path>) -> Result<()> {
    let path = resolve(explicit)?;
    let config = config::load(&path)?;

    println!("{}", "Axewatch Configuration".bold());
    if path.exists() {
        println!("{}: {}\n", "Location".dimmed(), path.display().dimmed());
    } else {
        println!("{}: {}\n", "Location".dimmed(), "(defaults, no file)".dimmed());
    }

    print_engine(&config);

    println!("\n{}", "[console]".yellow());
    println!(
        "  {} = {} {}",
        "appearance".cyan(),
        format!("{:?}", config.console.appearance).to_lowercase(),
        format!("(resolves to {:?})", config.console.appearance.resolve())
            .to_lowercase()
            .dimmed()
    );
    println!("  {} = {}", "color".cyan(), config.console.color);

    println!("\n{}", "Valid Ranges:".bold());
    println!("  debounce_ms: 0-60000");
    println!("  idle_timeout_ms: 1-600000");
    Ok(())
}

fn print_engine(config: &AxewatchConfig) {
    let engine = &config.engine;
    println!("{}", "[engine]".yellow());
    println!(
        "  {} = {} {}",
        "debounce_ms".cyan(),
        engine.debounce_ms,
        format!("({:?})", engine.debounce()).dimmed()
    );
    match engine.idle_timeout_ms {
        Some(ms) => println!("  {} = {}", "idle_timeout_ms".cyan(), ms),
        None => println!(
            "  {} = {}",
            "idle_timeout_ms".cyan(),
            format!("(unset, {:?})", engine.idle_timeout()).dimmed()
        ),
    }
    match &engine.context {
        Some(context) => println!("  {} = {:?}", "context".cyan(), context),
        None => println!("  {} = {}", "context".cyan(), "(common ancestor)".dimmed()),
    }
    match &engine.audit {
        Some(audit) => println!(
            "  {} = {} rule toggle(s)",
            "audit".cyan(),
            audit.rules.len()
        ),
        None => println!("  {} = {}", "audit".cyan(), "(engine defaults)".dimmed()),
    }
}

/// Validate the config file
pub fn run_check(explicit: Option<&Path>) -> Result<()> {
    let path = resolve(explicit)?;
    if !path.exists() {
        anyhow::bail!("Config file {} does not exist", path.display());
    }
    config::load(&path)?;
    println!("{} {} is valid", "✓".green(), path.display());
    Ok(())
}

/// Show the config file path
pub fn run_path(explicit: Option<&Path>) -> Result<()> {
    let path = resolve(explicit)?;
    println!("{}", path.display());
    if !path.exists() {
        println!("{}", "File does not exist. Use --init to create it.".yellow());
    }
    Ok(())
}

/// Write the example config if nothing is there yet
pub fn run_init(explicit: Option<&Path>) -> Result<()> {
    let path = resolve(explicit)?;
    if path.exists() {
        println!("{} already exists", path.display());
        return Ok(());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&path, config::example_config())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("{} Created config file at: {}", "✓".green(), path.display());
    Ok(())
}

/// Show example configuration
pub fn run_example() -> Result<()> {
    println!("{}", config::example_config());
    Ok(())
}
