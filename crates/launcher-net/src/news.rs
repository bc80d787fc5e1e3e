//! News feed cache.
//!
//! A time-bounded cache over the launcher feed document. Relative image
//! and link URLs are resolved against the feed base so the UI can use
//! them verbatim.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use launcher_bus::CachedState;

use crate::endpoints::Endpoints;
use crate::error::FetchError;
use crate::fetch::Fetcher;

/// Time between feed refreshes.
const CACHE_DURATION: Duration = Duration::from_secs(30 * 60);

/// One feed article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Stable article identifier.
    pub id: String,
    /// Headline.
    pub title: String,
    /// Short description.
    #[serde(default)]
    pub summary: String,
    /// Thumbnail URL, absolute after resolution.
    #[serde(default)]
    pub image_url: String,
    /// Full article URL, absolute after resolution.
    #[serde(default)]
    pub link_url: String,
    /// Publication timestamp, as published by the feed.
    #[serde(default)]
    pub published_at: String,
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    articles: Vec<Article>,
}

/// Cached accessor for the news feed.
pub struct NewsCache {
    cache: CachedState<Vec<Article>>,
}

impl NewsCache {
    /// An empty cache.
    pub fn new() -> NewsCache {
        NewsCache {
            cache: CachedState::new(),
        }
    }

    /// Articles currently cached, without fetching.
    pub fn cached(&self) -> Vec<Article> {
        self.cache.get().unwrap_or_default()
    }

    /// Drop the cache, forcing the next call to fetch.
    pub fn clear(&self) {
        self.cache.invalidate();
    }

    /// Fetch articles, returning `(has_new, articles)`.
    ///
    /// Serves the cache while fresh unless `force_refresh` is set.
    /// `has_new` is true when a refresh grew the article list.
    pub async fn articles(
        &self,
        fetcher: &Fetcher,
        endpoints: &Endpoints,
        release: &str,
        force_refresh: bool,
    ) -> Result<(bool, Vec<Article>), FetchError> {
        if !force_refresh && self.cache.is_fresh(CACHE_DURATION) {
            return Ok((false, self.cached()));
        }

        let previous_count = self.cached().len();
        let feed_url = endpoints.feed(release);
        let response: FeedResponse = match fetcher.get_json(&feed_url, &[]).await {
            Ok(response) => response,
            Err(err) => {
                self.cache.set_error(&err);
                return Err(err);
            }
        };

        let base = endpoints.feed_base(release);
        let articles: Vec<Article> = response
            .articles
            .into_iter()
            .map(|mut article| {
                article.image_url = resolve_url(&base, &article.image_url);
                article.link_url = resolve_url(&base, &article.link_url);
                article
            })
            .collect();

        let has_new = articles.len() > previous_count;
        self.cache.set(articles.clone());
        Ok((has_new, articles))
    }
}

impl Default for NewsCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a possibly-relative URL against the feed base.
///
/// Absolute and empty inputs pass through; unparseable bases leave the
/// value untouched rather than dropping the article.
fn resolve_url(base: &str, raw: &str) -> String {
    if raw.is_empty() || raw.contains("://") {
        return raw.to_string();
    }

    let base_with_slash = format!("{}/", base.trim_end_matches('/'));
    match reqwest::Url::parse(&base_with_slash).and_then(|b| b.join(raw)) {
        Ok(resolved) => resolved.to_string(),
        Err(err) => {
            warn!(base, raw, error = %err, "failed to resolve feed url");
            raw.to_string()
        }
    }
}
