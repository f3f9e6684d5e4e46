use indicatif::{ProgressBar, ProgressStyle};

/// Console progress for one page's worth of concurrent fetches. Reporting
/// only; the pipeline never branches on it. Hidden automatically when stderr
/// is not a terminal.
pub fn page_bar(len: u64, message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::with_template("{msg:<24} [{bar:40}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_message(message);
    bar
}
