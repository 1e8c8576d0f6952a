//! Feed capability: where native payloads come from

use crate::error::{FeedError, FeedResult};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Fetches one native payload per call.
#[async_trait]
pub trait SignalFeed: Send + Sync {
    async fn fetch(&self) -> FeedResult<String>;
}

/// HTTP GET feed
pub struct HttpFeed {
    client: Client,
    url: String,
}

impl HttpFeed {
    pub fn new(url: impl Into<String>, timeout: Duration) -> FeedResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("aegis-oracle/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SignalFeed for HttpFeed {
    async fn fetch(&self) -> FeedResult<String> {
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(FeedError::Status {
                status: response.status().as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

/// Scripted in-memory feed.
///
/// Returns queued responses in order, then repeats the fallback body (or
/// reports `Exhausted` when there is none).
#[derive(Default)]
pub struct StaticFeed {
    queue: Mutex<VecDeque<FeedResult<String>>>,
    fallback: Option<String>,
}

impl StaticFeed {
    /// Feed that always returns `body`
    pub fn repeating(body: impl Into<String>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: Some(body.into()),
        }
    }

    /// Feed that plays `responses` once, in order
    pub fn scripted(responses: impl IntoIterator<Item = FeedResult<String>>) -> Self {
        Self {
            queue: Mutex::new(responses.into_iter().collect()),
            fallback: None,
        }
    }

    pub fn push(&self, response: FeedResult<String>) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(response);
        }
    }
}

#[async_trait]
impl SignalFeed for StaticFeed {
    async fn fetch(&self) -> FeedResult<String> {
        let next = self
            .queue
            .lock()
            .map_err(|_| FeedError::Unavailable("feed lock poisoned".to_string()))?
            .pop_front();

        match next {
            Some(response) => response,
            None => self.fallback.clone().ok_or(FeedError::Exhausted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_feed_plays_in_order_then_exhausts() {
        let feed = StaticFeed::scripted([
            Ok("first".to_string()),
            Err(FeedError::Status { status: 503 }),
        ]);

        assert_eq!(feed.fetch().await.unwrap(), "first");
        assert!(matches!(feed.fetch().await, Err(FeedError::Status { status: 503 })));
        assert!(matches!(feed.fetch().await, Err(FeedError::Exhausted)));
    }

    #[tokio::test]
    async fn repeating_feed_never_runs_dry() {
        let feed = StaticFeed::repeating("{}");
        for _ in 0..3 {
            assert_eq!(feed.fetch().await.unwrap(), "{}");
        }
    }
}
