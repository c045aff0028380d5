use std::sync::LazyLock;

use regex::Regex;

static MINUTES_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)m").expect("minutes pattern is valid"));
static SECONDS_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)s").expect("seconds pattern is valid"));

/// Converts a free-form duration (e.g. "90", "1:30", "1m30s", "30s 1m") to whole seconds.
///
/// Never fails: anything unrecognized (or overflowing) yields 0, which callers
/// must treat as "invalid", not as a zero-length march.
pub fn parse_seconds(raw: &str) -> u32 {
    let clean = raw.trim().to_lowercase();
    if clean.is_empty() {
        return 0;
    }

    // Plain seconds
    if clean.chars().all(|c| c.is_ascii_digit()) {
        return clean.parse().unwrap_or(0);
    }

    // M:S
    let parts: Vec<&str> = clean.split(':').collect();
    if parts.len() == 2 {
        if let (Ok(minutes), Ok(seconds)) = (parts[0].parse::<u32>(), parts[1].parse::<u32>()) {
            return minutes
                .checked_mul(60)
                .and_then(|m| m.checked_add(seconds))
                .unwrap_or(0);
        }
    }

    let minutes = capture_number(&MINUTES_TOKEN, &clean);
    let seconds = capture_number(&SECONDS_TOKEN, &clean);
    match (minutes, seconds) {
        (None, None) => 0,
        (m, s) => m
            .unwrap_or(0)
            .checked_mul(60)
            .and_then(|m| m.checked_add(s.unwrap_or(0)))
            .unwrap_or(0),
    }
}

fn capture_number(pattern: &Regex, text: &str) -> Option<u32> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Parses a comma- or space-separated batch of durations.
/// Tokens that parse to 0 are malformed and dropped.
pub fn parse_batch(raw: &str) -> Vec<u32> {
    raw.replace(',', " ")
        .split_whitespace()
        .map(parse_seconds)
        .filter(|&secs| secs > 0)
        .collect()
}
