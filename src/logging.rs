// SPDX-License-Identifier: MIT
//
// Log setup.
//
// Stdout belongs to the screen and stderr shares the same terminal, so logs
// only go anywhere when a log file is given. `RUST_LOG` picks the filter;
// without it everything at `info` and above is written.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Filter used when `RUST_LOG` is unset or unparsable.
const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber, writing to a freshly truncated `path`.
pub fn init(path: &Path) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("cannot create log file {}", path.display()))?;
    build_subscriber(file, env_filter())
        .try_init()
        .context("cannot install log subscriber")
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Plain-text lines without ANSI colors, one per event.
fn build_subscriber(file: File, filter: EnvFilter) -> impl tracing::Subscriber + Send + Sync {
    let fmt_layer = fmt::layer()
        .with_ansi(false)
        .with_thread_names(true)
        .with_writer(Arc::new(file));

    tracing_subscriber::registry().with(fmt_layer).with(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn events_land_in_the_file() {
        let log = tempfile::NamedTempFile::new().unwrap();
        let subscriber = build_subscriber(log.reopen().unwrap(), EnvFilter::new(DEFAULT_FILTER));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(dropped_keys = 3, "event loop finished");
            tracing::debug!("filtered out");
        });

        let text = fs::read_to_string(log.path()).unwrap();
        assert!(text.contains("event loop finished"));
        assert!(text.contains("dropped_keys=3"));
        assert!(!text.contains("filtered out"));
        assert!(!text.contains('\x1b'), "no color codes in the file");
    }

    #[test]
    fn unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = init(&dir.path().join("missing").join("rawview.log")).unwrap_err();
        assert!(err.to_string().contains("cannot create log file"));
    }
}
