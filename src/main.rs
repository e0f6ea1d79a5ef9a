// SPDX-License-Identifier: MIT
//
// rawview — a raw-mode terminal viewer.
//
// This is the main binary that wires together the two crates:
//
//   rv-term   → raw mode, key decoding, geometry, event loop
//   rv-editor → display buffer, cursor, row painting, the Viewer app
//
// Each keypress flows through:
//
//   stdin → key reader thread → channel → Viewer::on_key → cursor
//   Viewer::paint → row pass → one frame write → terminal
//
// Errors are reported on stderr only after the terminal has been restored,
// so they end up on the user's normal screen.

mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use rv_editor::Viewer;
use rv_editor::display::DisplayBuffer;
use rv_term::event_loop::{EventLoop, LoopConfig};

/// View a file (or an empty screen) in raw terminal mode. Ctrl-Q quits.
#[derive(Debug, Parser)]
#[command(name = "rawview", version, about)]
struct Cli {
    /// File to display.
    file: Option<PathBuf>,

    /// Write logs to this file (filter with RUST_LOG).
    #[arg(long, env = "RAWVIEW_LOG", value_name = "PATH")]
    log_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(path) = &cli.log_file {
        if let Err(err) = logging::init(path) {
            eprintln!("rawview: {err:#}");
            return ExitCode::FAILURE;
        }
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            eprintln!("rawview: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let buffer = load(cli.file.as_deref())?;
    let mut viewer = Viewer::new(buffer);

    let outcome = EventLoop::new(LoopConfig::default())
        .run(&mut viewer)
        .context("terminal session failed")?;

    tracing::info!(
        reason = ?outcome.reason,
        dropped_keys = outcome.dropped_keys,
        "rawview exiting"
    );
    Ok(())
}

fn load(file: Option<&std::path::Path>) -> anyhow::Result<DisplayBuffer> {
    let Some(path) = file else {
        return Ok(DisplayBuffer::new());
    };
    DisplayBuffer::from_path(path).context("cannot open file")
}

// ─── Tests ──────────────────────────────────────────────────────────────────
