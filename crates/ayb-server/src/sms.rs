//! Pluggable SMS provider seam (§6, §8 Non-goals). `ayb-server` exposes the
//! admin list/send/daily-stats surface; provider adapters (Twilio, etc.)
//! are out of scope for this core, so [`SmsProvider`] is the trait a real
//! deployment swaps in, same shape as [`crate::storage::ObjectStore`].

use ayb_error::ApiResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

#[derive(Debug, Clone, serde::Serialize)]
pub struct SmsMessage {
    pub id: Uuid,
    pub to: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub delivered: bool,
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct SmsDailyStats {
    pub sent: u64,
    pub delivered: u64,
    pub failed: u64,
}

#[async_trait]
pub trait SmsProvider: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> ApiResult<SmsMessage>;
    async fn list_recent(&self, limit: usize) -> ApiResult<Vec<SmsMessage>>;
    async fn daily_stats(&self) -> ApiResult<SmsDailyStats>;
}

/// Reference implementation: records every "send" as delivered in an
/// in-memory ring buffer, no network call. A real provider adapter
/// replaces this with an actual carrier API client.
pub struct NoopSmsProvider {
    sent: AtomicU64,
    log: parking_lot::Mutex<Vec<SmsMessage>>,
}

const LOG_CAPACITY: usize = 200;

impl NoopSmsProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sent: AtomicU64::new(0),
            log: parking_lot::Mutex::new(Vec::new()),
        }
    }
}

impl Default for NoopSmsProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SmsProvider for NoopSmsProvider {
    async fn send(&self, to: &str, body: &str) -> ApiResult<SmsMessage> {
        let message = SmsMessage {
            id: Uuid::new_v4(),
            to: to.to_string(),
            body: body.to_string(),
            sent_at: Utc::now(),
            delivered: true,
        };
        self.sent.fetch_add(1, Ordering::Relaxed);
        let mut log = self.log.lock();
        log.push(message.clone());
        if log.len() > LOG_CAPACITY {
            log.remove(0);
        }
        Ok(message)
    }

    async fn list_recent(&self, limit: usize) -> ApiResult<Vec<SmsMessage>> {
        let log = self.log.lock();
        Ok(log.iter().rev().take(limit).cloned().collect())
    }

    async fn daily_stats(&self) -> ApiResult<SmsDailyStats> {
        let sent = self.sent.load(Ordering::Relaxed);
        Ok(SmsDailyStats {
            sent,
            delivered: sent,
            failed: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_marks_message_delivered_and_is_listed() {
        let provider = NoopSmsProvider::new();
        provider.send("+15555550123", "hello").await.unwrap();
        let recent = provider.list_recent(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert!(recent[0].delivered);
    }

    #[tokio::test]
    async fn daily_stats_count_every_send_as_delivered() {
        let provider = NoopSmsProvider::new();
        provider.send("+1", "a").await.unwrap();
        provider.send("+2", "b").await.unwrap();
        let stats = provider.daily_stats().await.unwrap();
        assert_eq!(stats.sent, 2);
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn list_recent_respects_limit() {
        let provider = NoopSmsProvider::new();
        for i in 0..5 {
            provider.send(&format!("+{i}"), "x").await.unwrap();
        }
        let recent = provider.list_recent(2).await.unwrap();
        assert_eq!(recent.len(), 2);
    }
}
