use once_cell::sync::Lazy;
use regex::Regex;

static BACKTICK_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`{3,}").unwrap());

/// A backtick fence longer than any fence already present in `text`.
pub fn get_fence(text: &str) -> String {
    let longest = BACKTICK_RUN_RE
        .find_iter(text)
        .map(|m| m.as_str().len())
        .max()
        .unwrap_or(2);
    "`".repeat(longest.max(2) + 1)
}

/// Wrap `content` in a fence that cannot collide with it.
pub fn fenced(content: &str, language: Option<&str>) -> String {
    let fence = get_fence(content);
    format!(
        "{fence}{}\n{}\n{fence}",
        language.unwrap_or_default(),
        filter_file_contents(content)
    )
}

/// Normalize file contents before they are sent to the agent.
pub fn filter_file_contents(content: &str) -> String {
    content.replace("\r\n", "\n")
}
