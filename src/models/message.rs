//! Notification message rendering and link extraction.
//!
//! Messages are Telegram HTML: anchor tags for links, `<code>` for the
//! contract address. Link extraction tries an ordered list of named
//! patterns in priority order; the first match wins.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::Item;

/// A named URL pattern tried during link extraction.
struct LinkPattern {
    name: &'static str,
    regex: Regex,
}

/// Patterns in priority order: profile domain, then generic shortener,
/// then any URL.
fn link_patterns() -> &'static [LinkPattern] {
    static PATTERNS: OnceLock<Vec<LinkPattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            LinkPattern {
                name: "profile",
                regex: Regex::new(r"https?://(?:www\.)?(?:twitter\.com|x\.com)/([A-Za-z0-9_]{1,15})\b")
                    .expect("static pattern"),
            },
            LinkPattern {
                name: "shortener",
                regex: Regex::new(r"https?://t\.co/[A-Za-z0-9]+").expect("static pattern"),
            },
            LinkPattern {
                name: "any-url",
                regex: Regex::new(r"https?://[^\s<>]+").expect("static pattern"),
            },
        ]
    })
}

/// Extract the best creator link from free text, first matching pattern wins.
pub fn extract_profile_link(text: &str) -> Option<String> {
    for pattern in link_patterns() {
        if let Some(m) = pattern.regex.find(text) {
            log::debug!("Link extracted via '{}' pattern", pattern.name);
            return Some(m.as_str().to_string());
        }
    }
    None
}

/// Extract a profile handle from free text. Only the profile-domain
/// pattern carries a handle; shorteners and bare URLs do not.
pub fn extract_handle(text: &str) -> Option<String> {
    let profile = &link_patterns()[0];
    profile
        .regex
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Render the alert message for a qualifying item.
pub fn format_alert(item: &Item, followers: u64) -> String {
    let address = &item.payload.address;
    let dexscreener = format!("https://dexscreener.com/solana/{address}");
    let solscan = format!("https://solscan.io/token/{address}");
    let boop = format!("https://boop.fun/tokens/{address}");

    let creator_line = match item.effective_subject() {
        Some(handle) => {
            let profile = extract_profile_link(&item.payload.description)
                .unwrap_or_else(|| format!("https://twitter.com/{handle}"));
            format!(
                "Creator: <a href='{profile}'>@{handle}</a> ({} followers)",
                group_thousands(followers)
            )
        }
        None => "Creator: unknown".to_string(),
    };

    format!(
        "🚨 New Token Alert! 🚨\n\n\
         Name: {name}\n\
         Symbol: {symbol}\n\
         {creator_line}\n\
         Contract: <code>{address}</code>\n\
         Created At: {created_at}\n\n\
         📊 <a href='{dexscreener}'>View on DEXScreener</a>\n\
         🔍 <a href='{solscan}'>View on Solscan</a>\n\
         🎯 <a href='{boop}'>View on Boop.fun</a>",
        name = item.payload.name,
        symbol = item.payload.symbol,
        created_at = item.created_at.to_rfc3339(),
    )
}

/// Format an integer with thousands separators.
fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
