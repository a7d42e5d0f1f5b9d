use crate::config::ScrapeConfig;
use crate::models::{MediaCandidate, MediaKind};
use url::Url;

/// Fixed host and extension allowlist applied to every response.
#[derive(Debug, Clone)]
pub struct ClassifierRules {
    pub cdn_hosts: Vec<String>,
    pub video_extensions: Vec<String>,
}

impl ClassifierRules {
    pub fn from_config(config: &ScrapeConfig) -> Self {
        Self {
            cdn_hosts: config.cdn_hosts.clone(),
            video_extensions: config.video_extensions.clone(),
        }
    }

    fn matches_cdn(&self, url: &str) -> bool {
        match Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_ascii_lowercase)) {
            Some(host) => self
                .cdn_hosts
                .iter()
                .any(|cdn| host == *cdn || host.ends_with(&format!(".{cdn}"))),
            None => {
                let lowered = url.to_ascii_lowercase();
                self.cdn_hosts.iter().any(|cdn| lowered.contains(cdn.as_str()))
            }
        }
    }

    fn has_video_extension(&self, url: &str) -> bool {
        let path = match Url::parse(url) {
            Ok(parsed) => parsed.path().to_ascii_lowercase(),
            Err(_) => url
                .split(['?', '#'])
                .next()
                .unwrap_or("")
                .to_ascii_lowercase(),
        };
        self.video_extensions.iter().any(|ext| path.ends_with(ext.as_str()))
    }
}

impl Default for ClassifierRules {
    fn default() -> Self {
        Self::from_config(&ScrapeConfig::default())
    }
}

/// First match wins: CDN-hosted images, then anything declaring or looking
/// like video. Everything else is ignored.
pub fn classify(url: &str, content_type: &str, rules: &ClassifierRules) -> Option<MediaCandidate> {
    let kind = classify_kind(url, content_type, rules)?;
    Some(MediaCandidate::new(url, kind))
}

pub fn classify_kind(url: &str, content_type: &str, rules: &ClassifierRules) -> Option<MediaKind> {
    let content_type = content_type.to_ascii_lowercase();
    if content_type.contains("image") && rules.matches_cdn(url) {
        return Some(MediaKind::Image);
    }
    if content_type.contains("video") || rules.has_video_extension(url) {
        return Some(MediaKind::Video);
    }
    None
}
