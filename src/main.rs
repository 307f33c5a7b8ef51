use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use dwc2_fifo_patch::{patch, PatchOutcome};
use std::env;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "patch-dfifo")]
#[command(
    about = "Patch TinyUSB DWC2 RX FIFO from double-buffered (2x) to single-buffered (1x)",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Path to the DWC2 driver source to patch in place
    file: PathBuf,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing();

    let outcome =
        patch(&cli.file).with_context(|| format!("could not patch {}", cli.file.display()))?;

    let status_is_tty = match outcome {
        PatchOutcome::NotFound => io::stderr().is_terminal(),
        _ => io::stdout().is_terminal(),
    };
    configure_color(status_is_tty);

    match outcome {
        PatchOutcome::Patched => {
            println!(
                "{} Patched DWC2 RX FIFO to single-buffered (1x)",
                "✓".green()
            );
        }
        PatchOutcome::AlreadyPatched => {
            println!("{} DWC2 RX FIFO already patched", "⊙".yellow());
        }
        PatchOutcome::NotFound => {
            eprintln!(
                "{} WARNING: Could not find FIFO pattern to patch",
                "✗".red()
            );
        }
    }

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Keep ANSI escapes out of build logs. `colored` already honors NO_COLOR
/// and CLICOLOR; CLICOLOR_FORCE still wins over a redirected stream.
fn configure_color(is_tty: bool) {
    let forced = env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0");
    if !is_tty && !forced {
        colored::control::set_override(false);
    }
}

/// Diagnostics go to stderr and stay quiet unless RUST_LOG asks for more.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(io::stderr().is_terminal())
        .with_writer(io::stderr)
        .init();
}
