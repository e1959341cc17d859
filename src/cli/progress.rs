//! Progress bar and summary reporting for CLI downloads.

use std::path::Path;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::download::DownloadProgress;
use crate::model::{ItemDescriptor, PlaylistDescriptor, SkipReason, VideoMetadata};
use crate::session::{ProgressSnapshot, SessionState, SessionSummary};
use crate::stats::ItemStats;
use crate::{format_bytes, format_duration};

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";

/// Creates a progress bar counting finished items.
fn make_progress_bar(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} ({elapsed}) - {msg}",
        )
        .expect("progress template is valid")
        .progress_chars("━━╌"),
    );
    bar.enable_steady_tick(Duration::from_millis(250));
    bar
}

/// Renders orchestrator callbacks on an `indicatif` bar.
pub struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    pub fn new(total: usize) -> Self {
        Self {
            bar: make_progress_bar(total),
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl DownloadProgress for CliProgress {
    fn on_item_start(&self, index: usize, item: &ItemDescriptor) {
        self.bar.set_message(format!("{}. {}", index + 1, item.label()));
    }

    fn on_item_saved(&self, _index: usize, path: &Path, stats: &ItemStats) {
        self.bar.println(format!(
            "  ✓ {} ({}, {}/s)",
            path.display(),
            format_bytes(stats.bytes),
            format_bytes(stats.average_speed())
        ));
    }

    fn on_item_failed(&self, index: usize, item: &ItemDescriptor, reason: &str) {
        self.bar
            .println(format!("  ✗ {}. {}: {reason}", index + 1, item.label()));
    }

    fn on_item_skipped(&self, index: usize, item: &ItemDescriptor, reason: SkipReason) {
        if reason == SkipReason::Cancelled {
            self.bar
                .println(format!("  - {}. {}: cancelled", index + 1, item.label()));
        }
    }

    fn on_progress(&self, snapshot: ProgressSnapshot) {
        self.bar
            .set_position((snapshot.completed + snapshot.failed) as u64);
    }
}

/// Prints what is known about a single item.
pub fn print_metadata(meta: &VideoMetadata) {
    println!("\n{SEPARATOR}");
    println!("{}", meta.display_title());
    println!("{SEPARATOR}");
    println!("  Channel:   {}", meta.display_uploader());
    println!("  Duration:  {}", meta.display_duration());
    println!("  Views:     {}", meta.display_views());
    println!("  Uploaded:  {}", meta.display_upload_date());
    println!("{SEPARATOR}\n");
}

/// Prints a playlist listing with 1-based positions.
pub fn print_playlist(playlist: &PlaylistDescriptor) {
    println!("\n{SEPARATOR}");
    println!("{} ({} items)", playlist.title, playlist.total_count);
    println!("{SEPARATOR}");
    for (i, item) in playlist.items.iter().enumerate() {
        println!("  {:>3}. {}", i + 1, item.label());
    }
    println!("{SEPARATOR}\n");
}

/// Prints the outcome of a session.
pub fn print_summary(summary: &SessionSummary) {
    println!("\n{SEPARATOR}");
    println!("{}", summary.message());
    println!("{SEPARATOR}");

    let stats = &summary.stats;
    if stats.files_saved > 0 {
        println!("  Files saved:       {}", stats.files_saved);
        println!("  Total size:        {}", format_bytes(stats.total_bytes));
        println!("  Total time:        {}", format_duration(stats.elapsed));
        println!(
            "  Average speed:     {}/s",
            format_bytes(stats.average_speed())
        );
    }
    if summary.failed_count > 0 {
        println!("  Failed:            {}", summary.failed_count);
        for outcome in summary.outcomes.iter().filter(|o| o.is_failed()) {
            println!("    {}. {}", outcome.index + 1, outcome.item.label());
        }
    }
    if summary.state == SessionState::Cancelled {
        println!("  Not downloaded:    {}", summary.skipped_count);
    }

    println!("{SEPARATOR}");
}
