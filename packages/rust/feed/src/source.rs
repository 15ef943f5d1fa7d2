//! HTTP content source backed by `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, instrument};

use postfeed_shared::{AppConfig, ContentSource, FeedItem, PostfeedError, Result};

use crate::extract::extract_text;
use crate::parse::parse_feed;

/// User-Agent string for feed and page requests.
const USER_AGENT: &str = concat!("postfeed/", env!("CARGO_PKG_VERSION"));

/// Settings for the HTTP client.
#[derive(Debug, Clone)]
pub struct FeedSourceConfig {
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum redirects followed per request.
    pub max_redirects: usize,
}

impl Default for FeedSourceConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FeedSourceConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.feed.timeout_secs),
            ..Self::default()
        }
    }
}

/// Fetches feeds and post pages over HTTP.
pub struct FeedSource {
    client: Client,
}

impl FeedSource {
    /// Build the HTTP client.
    pub fn new(config: FeedSourceConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .timeout(config.timeout)
            .build()
            .map_err(|e| PostfeedError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// GET `url` and return the body, treating any non-2xx status as an error.
    async fn fetch(&self, url: &str) -> Result<String> {
        debug!(%url, "fetching");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PostfeedError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PostfeedError::Network(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| PostfeedError::Network(format!("{url}: body read failed: {e}")))
    }
}

#[async_trait]
impl ContentSource for FeedSource {
    #[instrument(skip(self))]
    async fn get_items(&self, feed_url: &str) -> Result<Vec<FeedItem>> {
        let body = self.fetch(feed_url).await?;
        let items = parse_feed(&body);
        info!(items = items.len(), "feed parsed");
        Ok(items)
    }

    #[instrument(skip(self))]
    async fn get_text(&self, link: &str) -> Result<String> {
        let body = self.fetch(link).await?;
        let text = extract_text(&body);
        if text.is_empty() {
            return Err(PostfeedError::parse(format!("{link}: no readable text")));
        }
        debug!(chars = text.chars().count(), "text extracted");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source() -> FeedSource {
        FeedSource::new(FeedSourceConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn get_items_from_mock_feed() {
        let server = MockServer::start().await;
        let feed = format!(
            r#"<rss version="2.0"><channel>
  <item><link>{0}/abc123.html</link><title>First</title></item>
  <item><link>{0}/def456.html</link><title>Second</title></item>
</channel></rss>"#,
            server.uri()
        );

        Mock::given(method("GET"))
            .and(path("/feed.rss"))
            .respond_with(ResponseTemplate::new(200).set_body_string(feed))
            .mount(&server)
            .await;

        let items = source()
            .get_items(&format!("{}/feed.rss", server.uri()))
            .await
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].link, format!("{}/abc123.html", server.uri()));
        assert_eq!(items[1].title, "Second");
    }

    #[tokio::test]
    async fn get_items_http_error_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(path("/feed.rss"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = source()
            .get_items(&format!("{}/feed.rss", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, PostfeedError::Network(_)));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn get_text_extracts_page_body() {
        let server = MockServer::start().await;
        let page = r#"<html><body>
            <nav>Home | Essays</nav>
            <main><h1>Great Work</h1><p>Curiosity drives it.</p></main>
        </body></html>"#;

        Mock::given(method("GET"))
            .and(path("/greatwork.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page))
            .mount(&server)
            .await;

        let text = source()
            .get_text(&format!("{}/greatwork.html", server.uri()))
            .await
            .unwrap();

        assert_eq!(text, "Great Work Curiosity drives it.");
    }

    #[tokio::test]
    async fn get_text_not_found_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(path("/gone.html"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = source()
            .get_text(&format!("{}/gone.html", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, PostfeedError::Network(_)));
    }

    #[tokio::test]
    async fn get_text_empty_page_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(path("/blank.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
            .mount(&server)
            .await;

        let err = source()
            .get_text(&format!("{}/blank.html", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, PostfeedError::Parse { .. }));
    }

    #[test]
    fn config_takes_timeout_from_app_config() {
        let mut app = AppConfig::default();
        app.feed.timeout_secs = 5;
        let config = FeedSourceConfig::from(&app);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_redirects, 5);
    }
}
