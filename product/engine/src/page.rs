use crate::config::ScrapeConfig;
use crate::models::StatCount;
use crate::{EngineError, Result};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

const PAID_PARTNERSHIP_MARKER: &str = "Paid partnership with ";

pub const DEFAULT_LIKE_SELECTOR: &str = r#"span.x1ypdohk.x1s688f.x2fvf9.xe9ewy2[role="button"]"#;
pub const DEFAULT_COMMENT_SELECTOR: &str =
    "span.xdj266r.x14z9mp.xat24cr.x1lziwak.xexx8yu.xyri2b.x18d9i69.x1c1uobl.x1hl2dhg.x16tdsg8.x1vvkbs";
const POST_LINK_SELECTOR: &str = r#"a[href*="/p/"], a[href*="/reel/"]"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedPostStats {
    pub likes: StatCount,
    pub comments: StatCount,
    pub paid_partnership: bool,
}

#[derive(Debug, Clone)]
pub struct PageSelectors {
    likes: Selector,
    comments: Selector,
    post_links: Selector,
}

impl PageSelectors {
    pub fn new(like_selector: &str, comment_selector: &str) -> Result<Self> {
        Ok(Self {
            likes: parse_selector(like_selector)?,
            comments: parse_selector(comment_selector)?,
            post_links: parse_selector(POST_LINK_SELECTOR)?,
        })
    }

    pub fn from_config(config: &ScrapeConfig) -> Result<Self> {
        Self::new(&config.like_selector, &config.comment_selector)
    }
}

fn parse_selector(raw: &str) -> Result<Selector> {
    Selector::parse(raw)
        .map_err(|e| EngineError::InvalidInput(format!("invalid CSS selector {raw:?}: {e}")))
}

/// Likes come from the first like counter, comments from the first counter
/// whose text is all digits. Missing elements read as zero.
pub fn extract_post_stats(html: &str, selectors: &PageSelectors) -> ScrapedPostStats {
    let document = Html::parse_document(html);

    let likes = document
        .select(&selectors.likes)
        .map(|el| element_text(&el))
        .find(|text| !text.is_empty())
        .map(|text| StatCount::parse(&text))
        .unwrap_or_default();

    let comments = document
        .select(&selectors.comments)
        .map(|el| element_text(&el))
        .find(|text| !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()))
        .map(|text| StatCount::parse(&text))
        .unwrap_or_default();

    ScrapedPostStats {
        likes,
        comments,
        paid_partnership: html.contains(PAID_PARTNERSHIP_MARKER),
    }
}

/// Post permalinks on a profile page, absolute and de-duplicated in page order.
pub fn extract_post_links(html: &str, base_url: &str, selectors: &PageSelectors) -> Vec<String> {
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let mut seen: HashSet<String> = HashSet::new();
    let mut links = Vec::new();
    for anchor in document.select(&selectors.post_links) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(mut joined) = base.join(href.trim()) else {
            continue;
        };
        joined.set_query(None);
        joined.set_fragment(None);
        let link = joined.to_string();
        if seen.insert(link.clone()) {
            links.push(link);
        }
    }
    links
}

fn permalink_re() -> &'static Regex {
    static PERMALINK_RE: OnceLock<Regex> = OnceLock::new();
    PERMALINK_RE.get_or_init(|| {
        Regex::new(r"^https?://(?:[a-z0-9-]+\.)*[a-z0-9-]+\.[a-z]+/(?:[A-Za-z0-9._]+/)?(?:p|reel|tv)/([A-Za-z0-9_-]+)(?:[/?#]|$)")
            .expect("permalink regex")
    })
}

/// Shortcode of a post or reel permalink, `None` for anything else.
pub fn post_shortcode(post_url: &str) -> Option<String> {
    permalink_re()
        .captures(post_url.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// The permalink shortcode when there is one, otherwise the last non-empty
/// path segment reduced to a filesystem-safe directory name.
pub fn post_id_from_url(post_url: &str) -> String {
    if let Some(code) = post_shortcode(post_url) {
        return code;
    }
    let path = match Url::parse(post_url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => post_url
            .split(['?', '#'])
            .next()
            .unwrap_or("")
            .to_string(),
    };
    let raw = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .next_back()
        .unwrap_or("");
    let sanitized: String = raw
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "post".to_string()
    } else {
        sanitized
    }
}

pub fn profile_url(site_url: &str, username: &str) -> Result<String> {
    let username = username.trim().trim_start_matches('@').trim_matches('/');
    if username.is_empty()
        || !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
    {
        return Err(EngineError::InvalidInput(format!(
            "not a valid username: {username:?}"
        )));
    }
    let base = Url::parse(site_url)
        .map_err(|e| EngineError::InvalidInput(format!("invalid site url {site_url}: {e}")))?;
    let joined = base
        .join(&format!("{username}/"))
        .map_err(|e| EngineError::InvalidInput(e.to_string()))?;
    Ok(joined.to_string())
}

fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").trim().to_string()
}
