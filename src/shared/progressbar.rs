use indicatif::ProgressStyle;

static BAR_TEMPLATE: &str =
    "{spinner:.green} [{bar:40.cyan/blue}] {pos:>5}/{len:5} files [Elapsed: {elapsed_precise}] | [ETA: {eta_precise}]";
static BAR_CHARS: &str = "=> ";

/// Bar style for per-file work, prefixed with `task`.
pub fn get_progress_bar(task: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(&format!("{} {}", task, BAR_TEMPLATE))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars(BAR_CHARS)
}
