//! URLs written out in plain text, the way coupon posts paste them.

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}'];

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)\b(?:https?://|www\.)[^\s<>"'`]+"#).expect("valid URL regex")
    })
}

fn scheme_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)https?://").expect("valid URL scheme regex"))
}

/// Every URL in `text`, in order, with the scheme forced to https.
///
/// Image links are skipped. Udemy URLs pasted back to back without a
/// separator are split into one URL each.
pub(crate) fn urls_in_text(text: &str) -> Vec<Url> {
    let mut urls = Vec::new();
    for found in url_pattern().find_iter(text) {
        let raw = found.as_str().trim_end_matches(TRAILING_PUNCTUATION);
        if raw.to_ascii_lowercase().ends_with(".jpg") {
            continue;
        }
        let Some(url) = with_https(raw) else {
            continue;
        };
        if url.host_str().is_some_and(|host| host.contains("udemy.com")) {
            urls.extend(split_concatenated(raw).into_iter().filter_map(with_https));
        } else {
            urls.push(url);
        }
    }
    urls
}

fn split_concatenated(raw: &str) -> Vec<&str> {
    let mut bounds = vec![0];
    bounds.extend(
        scheme_pattern()
            .find_iter(raw)
            .map(|found| found.start())
            .filter(|&start| start > 0),
    );
    bounds.push(raw.len());
    bounds
        .windows(2)
        .map(|pair| &raw[pair[0]..pair[1]])
        .collect()
}

fn with_https(raw: &str) -> Option<Url> {
    let lower = raw.to_ascii_lowercase();
    let candidate = if lower.starts_with("https://") {
        raw.to_string()
    } else if lower.starts_with("http://") {
        format!("https://{}", &raw["http://".len()..])
    } else {
        format!("https://{raw}")
    };
    let url = Url::parse(&candidate).ok()?;
    url.host_str()?;
    Some(url)
}
