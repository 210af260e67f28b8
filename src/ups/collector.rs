//! Scrape Cycle
//!
//! One collection cycle turns the UPS status page into a full [`Readings`] set.
//!
//! # Cycle
//!
//! At most [`MAX_ATTEMPTS`] attempts are made. Each attempt logs in first when
//! the session is not authenticated, then fetches `/status`:
//!
//! - Network error or non-200 answer: the session is dropped and the next
//!   attempt logs in again (the card silently expires idle sessions)
//! - Unreadable status page: zero readings, no retry
//! - Login failure: zero readings, no retry
//!
//! # Locking
//!
//! The whole cycle, network I/O included, runs under one async mutex. Concurrent
//! `/metrics` requests queue behind it and each gets a reading set of its own
//! cycle. Every request is bounded by the client timeout, so a stuck card
//! cannot hold the lock indefinitely.

use super::fields::{self, MetricMeta, Readings};
use super::session::SessionManager;
use crate::config::Config;
use crate::error::Result;
use scraper::Html;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Attempts per cycle: the initial one plus one after a forced re-login
pub const MAX_ATTEMPTS: u32 = 2;

/// Source of readings for the metrics endpoint
pub trait Collector {
    /// Descriptors of every reading `collect` returns
    fn describe(&self) -> Vec<MetricMeta>;

    /// Run one collection cycle
    fn collect(&self) -> impl Future<Output = Readings> + Send;
}

/// Collects readings from an APC UPS network management card
pub struct UpsCollector {
    /// `None` once the collector has been shut down
    session: Mutex<Option<SessionManager>>,
    last_cycle_ok: AtomicBool,
}

impl UpsCollector {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            session: Mutex::new(Some(SessionManager::new(config)?)),
            last_cycle_ok: AtomicBool::new(false),
        })
    }

    /// Whether the most recent cycle produced live readings
    pub fn last_cycle_ok(&self) -> bool {
        self.last_cycle_ok.load(Ordering::SeqCst)
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(SessionManager::is_authenticated)
    }

    /// Wait for any in-flight cycle, then release the HTTP client and its
    /// connection pool. Later cycles report zero readings.
    pub async fn shutdown(&self) {
        let mut guard = self.session.lock().await;
        if guard.take().is_some() {
            info!("UPS HTTP client closed");
        }
        self.last_cycle_ok.store(false, Ordering::SeqCst);
    }
}

impl Collector for UpsCollector {
    fn describe(&self) -> Vec<MetricMeta> {
        fields::metric_metas()
    }

    async fn collect(&self) -> Readings {
        let mut guard = self.session.lock().await;

        let readings = match guard.as_mut() {
            Some(session) => run_cycle(session).await,
            None => {
                warn!("Collector is shut down, sending zero values");
                None
            }
        };

        self.last_cycle_ok.store(readings.is_some(), Ordering::SeqCst);
        readings.unwrap_or_else(fields::zero_readings)
    }
}

/// Drive one bounded-retry cycle. `None` means the zero fallback applies.
async fn run_cycle(session: &mut SessionManager) -> Option<Readings> {
    for attempt in 1..=MAX_ATTEMPTS {
        if !session.is_authenticated() {
            if let Err(e) = session.login().await {
                warn!("Re-login failed: {}", e);
                return None;
            }
            info!("Login to UPS successful");
        }

        match session.fetch_status().await {
            Ok(page) => {
                let readings = parse_status_page(&page);
                info!("Scrape successful on attempt {}", attempt);
                return Some(readings);
            }
            Err(e) if e.is_retryable() => {
                warn!("Scrape attempt {} failed: {}", attempt, e);
                session.invalidate();
            }
            Err(e) => {
                warn!("Error parsing status page: {}", e);
                session.invalidate();
                return None;
            }
        }
    }

    warn!("All scrape attempts failed. Sending zero values.");
    None
}

/// Parse a status page and extract every reading from it.
pub fn parse_status_page(page: &str) -> Readings {
    let document = Html::parse_document(page);
    fields::extract_all(&document)
}
