use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Result, VigilError};
use crate::executor::{ContentSink, PostReceipt};

/// Content sink that writes posts to the log instead of a social platform
#[derive(Debug, Default)]
pub struct LogContentSink;

#[async_trait]
impl ContentSink for LogContentSink {
    async fn publish(&self, text: &str) -> Result<PostReceipt> {
        let post_id = Uuid::new_v4().to_string();
        info!(%post_id, chars = text.chars().count(), "📣 {}", text);
        Ok(PostReceipt { post_id })
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Sliding-window post limit in front of another sink.
///
/// Over the limit the inner sink is not called and `RateLimited` is returned.
pub struct RateLimitedContentSink {
    inner: Arc<dyn ContentSink>,
    max_posts: usize,
    window: Duration,
    sent: Mutex<VecDeque<Instant>>,
}

impl RateLimitedContentSink {
    pub fn new(inner: Arc<dyn ContentSink>, max_posts: usize, window: Duration) -> Self {
        Self {
            inner,
            max_posts: max_posts.max(1),
            window,
            sent: Mutex::new(VecDeque::new()),
        }
    }

    /// Time until the next post would be accepted
    pub async fn retry_after(&self) -> Duration {
        let mut sent = self.sent.lock().await;
        self.evict(&mut sent);
        if sent.len() < self.max_posts {
            return Duration::ZERO;
        }
        sent.front()
            .map(|oldest| self.window.saturating_sub(oldest.elapsed()))
            .unwrap_or(Duration::ZERO)
    }

    fn evict(&self, sent: &mut VecDeque<Instant>) {
        while let Some(oldest) = sent.front() {
            if oldest.elapsed() >= self.window {
                sent.pop_front();
            } else {
                break;
            }
        }
    }
}

#[async_trait]
impl ContentSink for RateLimitedContentSink {
    async fn publish(&self, text: &str) -> Result<PostReceipt> {
        let mut sent = self.sent.lock().await;
        self.evict(&mut sent);

        if sent.len() >= self.max_posts {
            warn!(
                max_posts = self.max_posts,
                window_secs = self.window.as_secs(),
                "Post rate limit reached"
            );
            return Err(VigilError::RateLimited(format!(
                "{} posts per {}s",
                self.max_posts,
                self.window.as_secs()
            )));
        }

        let receipt = self.inner.publish(text).await?;
        sent.push_back(Instant::now());
        Ok(receipt)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
