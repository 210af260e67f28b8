//! APC UPS Prometheus Exporter
//!
//! Scrapes the web interface of an APC UPS network management card and exposes
//! its readings as Prometheus metrics.
//!
//! # Overview
//!
//! The card has no machine-readable API. The exporter logs in through the same
//! HTML form a browser uses, keeps the session cookie, and reads the status page
//! on every Prometheus scrape. Expired sessions are detected and renewed within
//! the same scrape.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐   HTML + cookies    ┌──────────────┐
//! │  UPS card   │ ◄────────────────►  │   Exporter   │
//! │  (NMC web)  │  /logon, /status    │              │
//! └─────────────┘                     │  ┌────────┐  │      HTTP      ┌────────────┐
//!                                     │  │Session │  │ ◄────────────► │ Prometheus │
//!                                     │  └────────┘  │   /metrics     └────────────┘
//!                                     │  ┌────────┐  │
//!                                     │  │Metrics │  │
//!                                     │  └────────┘  │
//!                                     └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`ups`] - Login session, scrape cycle and field extraction
//! - [`metrics`] - Prometheus metric definitions
//! - [`server`] - HTTP server
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//!
//! # Quick Start
//!
//! ```no_run
//! use apc_ups_exporter::{config::Config, server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("/etc/apc-exporter/config.yaml")?;
//!     server::start(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Degraded Mode
//!
//! When the card cannot be reached or the login fails, every metric is still
//! exported with the value 0. Only configuration and listener errors stop the
//! process.

pub mod config;
pub mod error;
pub mod metrics;
pub mod server;
pub mod ups;
