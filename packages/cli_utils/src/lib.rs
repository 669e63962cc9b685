#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal plumbing for the quality check binary.
//!
//! [`init_logger`] wraps `pretty_env_logger` in `indicatif-log-bridge` so
//! log lines are suspended while progress bars redraw, and
//! [`IndicatifProgress`] renders the evaluator's [`TableProgress`] events.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use park_assets_evaluate::progress::TableProgress;

pub use indicatif::{MultiProgress, ProgressDrawTarget};

/// An `indicatif` [`ProgressBar`] counting evaluated tables.
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Style applied once `start()` provides the table count.
    bar_style: ProgressStyle,
    /// Rows outside the boundary so far, before noise filtering.
    outside: AtomicUsize,
}

impl IndicatifProgress {
    /// Creates a bar that spins until the number of tables is known, then
    /// counts tables evaluated.
    #[must_use]
    pub fn tables_bar(multi: &MultiProgress, message: &str) -> Arc<dyn TableProgress> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());

        let bar_style = ProgressStyle::with_template(
            "{msg} {wide_bar:.green/dim} {pos}/{len} tables [{elapsed_precise}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        Arc::new(Self::new(bar, bar_style))
    }

    const fn new(bar: ProgressBar, bar_style: ProgressStyle) -> Self {
        Self {
            bar,
            bar_style,
            outside: AtomicUsize::new(0),
        }
    }
}

impl TableProgress for IndicatifProgress {
    fn start(&self, tables: u64) {
        self.bar.disable_steady_tick();
        self.bar.set_length(tables);
        self.bar.set_position(0);
        self.bar.set_style(self.bar_style.clone());
    }

    fn table_started(&self, table: &str) {
        self.bar.set_message(format!("Evaluating {table}"));
    }

    fn table_finished(&self, _table: &str, outside: usize) {
        self.outside.fetch_add(outside, Ordering::Relaxed);
        self.bar.inc(1);
    }

    fn finish(&self, violations: usize) {
        let outside = self.outside.load(Ordering::Relaxed);
        self.bar.finish_with_message(format!(
            "{violations} violation(s) found ({outside} outside before filtering)"
        ));
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge`.
///
/// Defaults to `info` when `RUST_LOG` is unset. Returns the
/// [`MultiProgress`] that all progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let mut builder = pretty_env_logger::formatted_builder();
    match std::env::var("RUST_LOG") {
        Ok(filters) => {
            builder.parse_filters(&filters);
        }
        Err(_) => {
            builder.filter_level(log::LevelFilter::Info);
        }
    }
    let logger = builder.build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok(); // already set, e.g. in tests

    log::set_max_level(level);

    multi
}
