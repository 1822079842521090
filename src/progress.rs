//! Progress reporting and display
//!
//! Trait-based abstraction so the ingestion pipeline stays decoupled from
//! display concerns. Reporters receive the pipeline phase, a 0..=100
//! percentage, and per-batch counts.

use std::sync::Arc;

/// Phase of an ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestPhase {
    /// Fetching the catalog index
    LoadingIndex,
    /// Fetching per-item details batch by batch
    FetchingDetails,
    /// Writing through to the durable cache
    SyncingCache,
    /// Completed successfully
    Completed,
    /// Failed with error
    Failed(String),
}

/// Progress reporter trait - implement this for different display backends.
pub trait ProgressReporter: Send + Sync {
    /// Set the overall phase.
    fn set_phase(&self, phase: IngestPhase);

    /// Overall completion, counting attempted items.
    fn set_percent(&self, percent: u8);

    /// Record one finished batch.
    fn note_batch(&self, delivered: usize, dropped: usize);

    /// Log a warning message.
    fn log_warn(&self, message: &str);

    /// Finish and clean up the display.
    fn finish(&self);
}

/// A no-op reporter for when progress display is disabled.
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn set_phase(&self, _phase: IngestPhase) {}
    fn set_percent(&self, _percent: u8) {}
    fn note_batch(&self, _delivered: usize, _dropped: usize) {}
    fn log_warn(&self, _message: &str) {}
    fn finish(&self) {}
}

/// Statistics collected during an ingestion run.
#[derive(Debug, Default)]
struct Stats {
    delivered: usize,
    dropped: usize,
    start_time: Option<std::time::Instant>,
}

impl Stats {
    fn started() -> std::sync::RwLock<Self> {
        std::sync::RwLock::new(Self {
            start_time: Some(std::time::Instant::now()),
            ..Default::default()
        })
    }

    fn print_summary(&self) {
        let duration = self.start_time.map(|t| t.elapsed()).unwrap_or_default();
        eprintln!();
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("📊 Summary");
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("   ✅ Ingested:  {}", self.delivered);
        if self.dropped > 0 {
            eprintln!("   ❌ Dropped:   {}", self.dropped);
        }
        eprintln!("   ⏱️  Duration:  {:.2}s", duration.as_secs_f64());
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
}

fn phase_line(phase: &IngestPhase) -> Option<(&'static str, &'static str)> {
    match phase {
        IngestPhase::LoadingIndex => Some(("📋", "Loading catalog index...")),
        IngestPhase::FetchingDetails => Some(("📄", "Fetching records...")),
        IngestPhase::SyncingCache => Some(("🗄️ ", "Syncing cache...")),
        IngestPhase::Completed => Some(("✅", "Completed!")),
        IngestPhase::Failed(_) => None,
    }
}

/// A simple reporter that just prints to stderr (for non-TTY).
pub struct SimpleReporter {
    stats: std::sync::RwLock<Stats>,
}

impl SimpleReporter {
    pub fn new() -> Self {
        Self {
            stats: Stats::started(),
        }
    }
}

impl Default for SimpleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for SimpleReporter {
    fn set_phase(&self, phase: IngestPhase) {
        match phase_line(&phase) {
            Some((emoji, msg)) => eprintln!("{emoji} {msg}"),
            None => {
                if let IngestPhase::Failed(e) = phase {
                    eprintln!("❌ Failed: {e}");
                }
            }
        }
    }

    fn set_percent(&self, percent: u8) {
        eprintln!("   {percent}%");
    }

    fn note_batch(&self, delivered: usize, dropped: usize) {
        let mut stats = self.stats.write().unwrap();
        stats.delivered += delivered;
        stats.dropped += dropped;
    }

    fn log_warn(&self, message: &str) {
        eprintln!("⚠️  {message}");
    }

    fn finish(&self) {
        self.stats.read().unwrap().print_summary();
    }
}

/// Interactive reporter with progress bars (for TTY).
pub struct FancyReporter {
    multi: indicatif::MultiProgress,
    phase_bar: indicatif::ProgressBar,
    percent_bar: indicatif::ProgressBar,
    stats: std::sync::RwLock<Stats>,
}

impl FancyReporter {
    pub fn new() -> Self {
        let multi = indicatif::MultiProgress::new();
        let phase_bar = multi.add(indicatif::ProgressBar::new_spinner());
        phase_bar.set_style(
            indicatif::ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap(),
        );
        phase_bar.enable_steady_tick(std::time::Duration::from_millis(100));

        let percent_bar = multi.add(indicatif::ProgressBar::new(100));
        percent_bar.set_style(
            indicatif::ProgressStyle::default_bar()
                .template("   {bar:40.cyan/blue} {pos}%")
                .unwrap()
                .progress_chars("█▓▒░  "),
        );

        Self {
            multi,
            phase_bar,
            percent_bar,
            stats: Stats::started(),
        }
    }
}

impl Default for FancyReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for FancyReporter {
    fn set_phase(&self, phase: IngestPhase) {
        match phase_line(&phase) {
            Some((emoji, msg)) => {
                self.phase_bar.set_message(format!("{emoji} {msg}"));
                if matches!(phase, IngestPhase::Completed) {
                    self.phase_bar.finish_with_message(format!("{emoji} {msg}"));
                }
            }
            None => {
                if let IngestPhase::Failed(e) = phase {
                    self.phase_bar
                        .finish_with_message(format!("❌ Failed: {e}"));
                }
            }
        }
    }

    fn set_percent(&self, percent: u8) {
        self.percent_bar.set_position(percent as u64);
    }

    fn note_batch(&self, delivered: usize, dropped: usize) {
        let mut stats = self.stats.write().unwrap();
        stats.delivered += delivered;
        stats.dropped += dropped;
    }

    fn log_warn(&self, message: &str) {
        self.multi.println(format!("⚠️  {message}")).ok();
    }

    fn finish(&self) {
        self.percent_bar.finish_and_clear();
        self.phase_bar.finish_and_clear();
        self.stats.read().unwrap().print_summary();
    }
}

/// Create an appropriate reporter based on terminal capabilities.
pub fn create_reporter() -> Arc<dyn ProgressReporter> {
    if console::Term::stderr().is_term() {
        Arc::new(FancyReporter::new())
    } else {
        Arc::new(SimpleReporter::new())
    }
}
