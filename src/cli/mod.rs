pub mod capture;
pub mod forget;
pub mod init;
pub mod save;
pub mod search;
pub mod status;

/// Shorten `text` to at most `max` characters, marking the cut with `...`.
pub(crate) fn preview(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max {
        return flat;
    }
    let cut: String = flat.chars().take(max).collect();
    format!("{cut}...")
}
