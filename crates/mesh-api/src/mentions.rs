use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Mentions past this many distinct names are ignored.
pub const MAX_MENTIONS: usize = 50;

/// `@name` at the start of the text or after a character that cannot be part
/// of a word (in any script), an address or another mention. Rejects
/// `email@x.com` and `josé@x.com`.
static MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\w@.])@([A-Za-z0-9_]+)").expect("mention pattern is valid")
});

/// Usernames mentioned in `text`, de-duplicated, in first-seen order, at
/// most [`MAX_MENTIONS`] of them.
pub fn extract_mentions(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    MENTION
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|name| seen.insert(*name))
        .take(MAX_MENTIONS)
        .map(str::to_string)
        .collect()
}
