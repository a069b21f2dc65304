use anyhow::{Context, Result};
use async_trait::async_trait;
use jarvis_core::collaborators::{Browser, VideoPlayer};
use regex::Regex;
use reqwest::{Client, Url};
use std::sync::Arc;

const RESULTS_URL: &str = "https://www.youtube.com/results";
const WATCH_URL: &str = "https://www.youtube.com/watch";

/// Plays the top search result for a query by opening its watch page.
pub struct YouTubePlayer {
    client: Client,
    browser: Arc<dyn Browser>,
}

impl YouTubePlayer {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self {
            client: Client::new(),
            browser,
        }
    }

    async fn first_result(&self, query: &str) -> Result<String> {
        let url = Url::parse_with_params(RESULTS_URL, &[("search_query", query)])?;
        let page = self
            .client
            .get(url)
            .send()
            .await
            .context("YouTube search request failed")?
            .error_for_status()
            .context("YouTube search returned an error status")?
            .text()
            .await
            .context("Failed to read YouTube results page")?;

        first_video_id(&page).with_context(|| format!("No videos found for '{query}'"))
    }

    fn open_video(&self, video_id: &str) -> Result<()> {
        let url = watch_url(video_id)?;
        tracing::info!("Opening {}", url);
        if !self.browser.open(url.as_str()) {
            anyhow::bail!("the browser could not be opened");
        }
        Ok(())
    }
}

#[async_trait]
impl VideoPlayer for YouTubePlayer {
    async fn play(&self, query: &str) -> Result<()> {
        let video_id = self.first_result(query).await?;
        self.open_video(&video_id)
    }
}

/// Finds the first video id embedded in a YouTube results page.
pub fn first_video_id(page: &str) -> Option<String> {
    let re = Regex::new(r#""videoId"\s*:\s*"([A-Za-z0-9_-]{11})""#).ok()?;
    re.captures(page)
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str().to_string())
}

pub fn watch_url(video_id: &str) -> Result<Url> {
    Ok(Url::parse_with_params(WATCH_URL, &[("v", video_id)])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use mockall::predicate::eq;

    mock! {
        pub Browser {}
        impl Browser for Browser {
            fn open(&self, url: &str) -> bool;
        }
    }

    #[test]
    fn extracts_first_video_id() {
        let page = r#"var ytInitialData = {"contents":[
            {"videoRenderer":{"videoId":"fJ9rUzIMcZQ","title":"Bohemian Rhapsody"}},
            {"videoRenderer":{"videoId":"yk3prd8GER4"}}]}"#;
        assert_eq!(first_video_id(page), Some("fJ9rUzIMcZQ".to_string()));
    }

    #[test]
    fn page_without_videos_has_no_id() {
        assert_eq!(first_video_id("<html>No results</html>"), None);
        assert_eq!(first_video_id(r#""videoId":"short""#), None);
    }

    #[test]
    fn watch_url_carries_the_id() {
        assert_eq!(
            watch_url("fJ9rUzIMcZQ").unwrap().as_str(),
            "https://www.youtube.com/watch?v=fJ9rUzIMcZQ"
        );
    }

    #[test]
    fn open_video_goes_through_the_browser() {
        let mut browser = MockBrowser::new();
        browser
            .expect_open()
            .with(eq("https://www.youtube.com/watch?v=fJ9rUzIMcZQ"))
            .times(1)
            .returning(|_| true);

        let player = YouTubePlayer::new(Arc::new(browser));
        assert!(player.open_video("fJ9rUzIMcZQ").is_ok());
    }

    #[test]
    fn refused_browser_is_an_error() {
        let mut browser = MockBrowser::new();
        browser.expect_open().returning(|_| false);

        let player = YouTubePlayer::new(Arc::new(browser));
        assert!(player.open_video("fJ9rUzIMcZQ").is_err());
    }
}
