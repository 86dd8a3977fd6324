//! Supported link detection.
//!
//! Matching is a plain case-insensitive substring test against a fixed list of
//! platform domains, not a URL parse.

/// Domain fragments the bot accepts
pub const SUPPORTED_DOMAINS: &[&str] = &[
    "youtube",
    "youtu.be",
    "tiktok",
    "instagram",
    "twitter",
    "x.com",
];

fn contains_supported_domain(text: &str) -> bool {
    let lower = text.to_lowercase();
    SUPPORTED_DOMAINS.iter().any(|domain| lower.contains(domain))
}

/// Returns `true` if `text` mentions one of [`SUPPORTED_DOMAINS`].
///
/// # Examples
///
/// ```
/// use media_fetch_bot::links::is_supported_link;
/// assert!(is_supported_link("https://YOUTU.BE/abc"));
/// assert!(!is_supported_link("https://example.com/x"));
/// ```
#[must_use]
pub fn is_supported_link(text: &str) -> bool {
    contains_supported_domain(text)
}

/// Picks the link out of a free-form message.
///
/// Returns the first whitespace-separated token that mentions a supported
/// domain, or `None` if the message is not supported at all.
///
/// # Examples
///
/// ```
/// use media_fetch_bot::links::extract_link;
/// assert_eq!(
///     extract_link("look at this https://youtu.be/abc please"),
///     Some("https://youtu.be/abc")
/// );
/// assert_eq!(extract_link("nothing here"), None);
/// ```
#[must_use]
pub fn extract_link(text: &str) -> Option<&str> {
    text.split_whitespace()
        .find(|token| contains_supported_domain(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_domain_is_accepted() {
        for domain in SUPPORTED_DOMAINS {
            let text = format!("https://{domain}/watch");
            assert!(is_supported_link(&text), "{text} should be supported");
        }
    }

    #[test]
    fn test_matching_is_substring_not_url_parse() {
        // No scheme, no host validation
        assert!(is_supported_link("my tiktok video"));
        assert!(is_supported_link("https://www.TikTok.com/@u/video/1"));
        assert!(!is_supported_link("https://vimeo.com/123"));
        assert!(!is_supported_link(""));
    }

    #[test]
    fn test_extract_link_picks_matching_token() {
        assert_eq!(
            extract_link("  https://x.com/user/status/1  "),
            Some("https://x.com/user/status/1")
        );
        assert_eq!(
            extract_link("see https://example.com and https://instagram.com/p/1"),
            Some("https://instagram.com/p/1")
        );
        assert_eq!(extract_link("https://example.com/x"), None);
    }
}
