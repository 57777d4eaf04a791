// ============================================================
// Layer 6 — Progress Bars
// ============================================================

use indicatif::{ProgressBar, ProgressStyle};

/// A progress bar over `len` steps, or a hidden one when progress
/// output is disabled (tests, piped output).
pub fn progress_bar(len: usize, label: &'static str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(len as u64);
    match ProgressStyle::default_bar()
        .template("{msg:>8} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ETA:{eta}")
    {
        Ok(style) => bar.set_style(style.progress_chars("=>-")),
        Err(e)    => tracing::warn!("Invalid progress template: {e}"),
    }
    bar.set_message(label);
    bar
}
