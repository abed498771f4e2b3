//! Pipelines: analogy generation and student answering.
//!
//! Both run sequentially, one question at a time. A model failure skips the
//! current item with a warning; any other error aborts the run.

mod analogies;
mod answers;

pub use analogies::*;
pub use answers::*;

use indicatif::{ProgressBar, ProgressStyle};

const PROGRESS_TEMPLATE: &str = "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}";

fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let style = ProgressStyle::default_bar()
        .template(PROGRESS_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    let pb = ProgressBar::new(len as u64);
    pb.set_style(style);
    pb
}

/// Shorten `text` to `max` characters for log previews.
fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
