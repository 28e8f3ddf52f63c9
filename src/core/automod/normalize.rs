// Content normalization and message pattern matching.
//
// Pure functions only - no state, no side effects.

use once_cell::sync::Lazy;
use regex::Regex;

/// Community invite links: scheme-optional, `www.`-optional, long and short hosts.
static INVITE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:https?://)?(?:www\.)?(?:discord\.gg|discord(?:app)?\.com/invite)/[A-Za-z0-9-]+")
        .unwrap()
});

/// Any http(s) URL at all.
static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)https?://").unwrap());

static URL_STRIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)https?://\S+").unwrap());
static USER_MENTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<@!?\d+>").unwrap());
static CHANNEL_MENTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<#\d+>").unwrap());
static ROLE_MENTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<@&\d+>").unwrap());
static NON_ALNUM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s]").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

pub fn contains_invite_link(text: &str) -> bool {
    INVITE_RE.is_match(text)
}

pub fn contains_url(text: &str) -> bool {
    URL_RE.is_match(text)
}

/// Canonicalize message text for repeat comparison.
///
/// Lowercases, strips URLs (links alone never drive repeat detection, only
/// flood detection), rewrites mention ids to stable placeholder tokens so
/// mention churn doesn't defeat the comparison, drops non-alphanumerics and
/// collapses whitespace.
pub fn normalize_for_repeat(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = URL_STRIP_RE.replace_all(&lowered, " ");
    let stripped = ROLE_MENTION_RE.replace_all(&stripped, "@role");
    let stripped = USER_MENTION_RE.replace_all(&stripped, "@user");
    let stripped = CHANNEL_MENTION_RE.replace_all(&stripped, "#channel");
    let stripped = NON_ALNUM_RE.replace_all(&stripped, "");
    let collapsed = WHITESPACE_RE.replace_all(&stripped, " ");
    collapsed.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invite_pattern_matches_all_host_variants() {
        assert!(contains_invite_link("join discord.gg/abc123"));
        assert!(contains_invite_link("https://discord.gg/abc123"));
        assert!(contains_invite_link("www.discord.com/invite/xyz"));
        assert!(contains_invite_link("https://discordapp.com/invite/a-b-c"));
        assert!(contains_invite_link("DISCORD.GG/LOUD"));
    }

    #[test]
    fn invite_pattern_ignores_ordinary_links() {
        assert!(!contains_invite_link("see https://example.com/invite"));
        assert!(!contains_invite_link("discord is fun"));
        assert!(!contains_invite_link("gg well played"));
    }

    #[test]
    fn url_pattern_requires_a_scheme() {
        assert!(contains_url("http://example.com"));
        assert!(contains_url("check HTTPS://EXAMPLE.COM now"));
        assert!(!contains_url("example.com without scheme"));
    }

    #[test]
    fn normalize_ignores_case_punctuation_and_urls() {
        assert_eq!(
            normalize_for_repeat("Buy NOW!!! http://x.co"),
            normalize_for_repeat("buy now")
        );
    }

    #[test]
    fn normalize_rewrites_mentions_to_placeholders() {
        assert_eq!(
            normalize_for_repeat("<@123> hey <@!456> see <#789> for <@&42>"),
            "user hey user see channel for role"
        );
    }

    #[test]
    fn normalize_collapses_whitespace_and_trims() {
        assert_eq!(normalize_for_repeat("  so   much\t\tspace  "), "so much space");
    }

    #[test]
    fn normalize_of_pure_link_is_empty() {
        assert_eq!(normalize_for_repeat("https://spam.example/offer?id=1"), "");
    }
}
