//! Login rate limiting
//!
//! - failed attempts per email: 5 per 15 minutes
//! - login requests per client IP: 10 per minute

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::net::IpAddr;
use tokio::sync::RwLock;

const MAX_FAILED_PER_EMAIL: usize = 5;
const MAX_REQUESTS_PER_IP: usize = 10;

fn email_window() -> Duration {
    Duration::minutes(15)
}

fn ip_window() -> Duration {
    Duration::minutes(1)
}

/// Sliding-window counters keyed by email and IP
#[derive(Default)]
pub struct LoginRateLimiter {
    failed_by_email: RwLock<HashMap<String, Vec<DateTime<Utc>>>>,
    requests_by_ip: RwLock<HashMap<IpAddr, Vec<DateTime<Utc>>>>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_email_limited(&self, email: &str) -> bool {
        let cutoff = Utc::now() - email_window();
        let mut map = self.failed_by_email.write().await;
        let times = map.entry(email.to_lowercase()).or_default();
        times.retain(|t| *t > cutoff);
        times.len() >= MAX_FAILED_PER_EMAIL
    }

    pub async fn record_failed_attempt(&self, email: &str) {
        self.failed_by_email
            .write()
            .await
            .entry(email.to_lowercase())
            .or_default()
            .push(Utc::now());
    }

    /// Forget failures after a successful login
    pub async fn clear_email_attempts(&self, email: &str) {
        self.failed_by_email.write().await.remove(&email.to_lowercase());
    }

    pub async fn is_ip_limited(&self, ip: IpAddr) -> bool {
        let cutoff = Utc::now() - ip_window();
        let mut map = self.requests_by_ip.write().await;
        let times = map.entry(ip).or_default();
        times.retain(|t| *t > cutoff);
        times.len() >= MAX_REQUESTS_PER_IP
    }

    pub async fn record_ip_request(&self, ip: IpAddr) {
        self.requests_by_ip.write().await.entry(ip).or_default().push(Utc::now());
    }

    /// Drop expired timestamps and empty keys
    pub async fn cleanup(&self) {
        let now = Utc::now();

        let email_cutoff = now - email_window();
        self.failed_by_email.write().await.retain(|_, times| {
            times.retain(|t| *t > email_cutoff);
            !times.is_empty()
        });

        let ip_cutoff = now - ip_window();
        self.requests_by_ip.write().await.retain(|_, times| {
            times.retain(|t| *t > ip_cutoff);
            !times.is_empty()
        });
    }
}
