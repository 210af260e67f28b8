//! In-process stand-in for an APC network management card.
//!
//! Serves `/logon`, `/j_security_check` (302 + session cookie) and a cookie
//! protected `/status`, with knobs to inject the failures the exporter must
//! survive.

#![allow(dead_code)]

use apc_ups_exporter::config::{Config, ServerConfig};
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Router,
};
use futures_util::StreamExt;
use secrecy::SecretString;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const USERNAME: &str = "apc";
pub const PASSWORD: &str = "s3cret&pass";
pub const FORM_TOKEN: &str = "tok-1234";
pub const FORM_TOKEN_ID: &str = "tokid-5678";

pub const LOGON_PAGE: &str = r#"<html><body>
<form action="j_security_check" method="post">
  <input type="hidden" name="formtoken" value="tok-1234">
  <input type="hidden" name="formtokenid" value="tokid-5678">
  <input type="text" name="j_username">
  <input type="password" name="j_password">
  <input type="submit" name="login" value="Log On">
</form>
</body></html>"#;

pub const STATUS_PAGE: &str = r#"<html><body>
<table>
  <tr><td>Device Status</td><td><span id="value_DeviceStatus">On Line</span></td></tr>
  <tr><td>Load</td><td><span id="value_RealPowerPct">23.5</span></td></tr>
  <tr><td>Runtime</td><td><span id="value_RuntimeRemaining">47</span></td></tr>
  <tr><td>Internal Temp</td><td><span id="value_InternalTemp">27.5°C / 81.5°F</span></td></tr>
  <tr><td>Load VA</td><td><span id="value_ApparentPowerPct">25.4</span></td></tr>
  <tr><td>Current</td><td><span id="value_LoadCurrent">1.6</span></td></tr>
  <tr><td>Input</td><td><span id="value_InputVoltage">230.4</span></td></tr>
  <tr><td>Output</td><td><span id="value_OutputVoltage">229.8</span></td></tr>
  <tr><td>Input Hz</td><td><span id="value_InputFrequency">49.9</span></td></tr>
  <tr><td>Output Hz</td><td><span id="value_OutputFrequency">50.1</span></td></tr>
  <tr><td>Battery</td><td><span id="value_BatteryCharge">98.5</span></td></tr>
  <tr><td>Battery DC</td><td><span id="value_VoltageDC">27.3</span></td></tr>
</table>
<div class="outlet"><span id="status0">On</span></div>
</body></html>"#;

/// What the card manages to send before it resets mid-page
pub const TRUNCATED_STATUS_PAGE: &str = "<html><body><span id=\"value_DeviceStatus\">On";

/// Readings `STATUS_PAGE` should produce, in catalog order
pub const EXPECTED: [(&str, f64); 13] = [
    ("device_status", 1.0),
    ("load_percent", 23.5),
    ("runtime_remaining_minutes", 47.0),
    ("internal_temperature_celsius", 27.5),
    ("load_power_percent_va", 25.4),
    ("load_current_amps", 1.6),
    ("input_voltage_vac", 230.4),
    ("output_voltage_vac", 229.8),
    ("input_frequency_hz", 49.9),
    ("output_frequency_hz", 50.1),
    ("battery_charge_percent", 98.5),
    ("battery_voltage_vdc", 27.3),
    ("outlet_status", 1.0),
];

#[derive(Default)]
pub struct FakeUps {
    pub logon_gets: AtomicUsize,
    pub login_posts: AtomicUsize,
    pub status_gets: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    session_id: AtomicUsize,
    /// Upcoming `/status` requests answered with 503
    pub status_failures: AtomicUsize,
    pub reject_login: AtomicBool,
    pub truncate_status: AtomicBool,
    pub delay_ms: AtomicU64,
    pub last_login_form: Mutex<Option<HashMap<String, String>>>,
}

impl FakeUps {
    /// Invalidate every issued session cookie, like an idle timeout on the card
    pub fn expire_sessions(&self) {
        self.session_id.fetch_add(1, Ordering::SeqCst);
    }

    pub fn fail_next_status(&self, count: usize) {
        self.status_failures.store(count, Ordering::SeqCst);
    }

    pub fn logins(&self) -> usize {
        self.login_posts.load(Ordering::SeqCst)
    }

    pub fn status_fetches(&self) -> usize {
        self.status_gets.load(Ordering::SeqCst)
    }

    fn cookie(&self) -> String {
        format!("APCSID=session-{}", self.session_id.load(Ordering::SeqCst))
    }

    async fn enter(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        InFlight(self)
    }
}

struct InFlight<'a>(&'a FakeUps);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn logon(State(ups): State<Arc<FakeUps>>) -> impl IntoResponse {
    let _guard = ups.enter().await;
    ups.logon_gets.fetch_add(1, Ordering::SeqCst);
    axum::response::Html(LOGON_PAGE)
}

async fn security_check(
    State(ups): State<Arc<FakeUps>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let _guard = ups.enter().await;
    ups.login_posts.fetch_add(1, Ordering::SeqCst);

    let accepted = !ups.reject_login.load(Ordering::SeqCst)
        && form.get("j_username").map(String::as_str) == Some(USERNAME)
        && form.get("j_password").map(String::as_str) == Some(PASSWORD)
        && form.get("formtoken").map(String::as_str) == Some(FORM_TOKEN)
        && form.get("formtokenid").map(String::as_str) == Some(FORM_TOKEN_ID);

    *ups.last_login_form.lock().unwrap() = Some(form);

    if !accepted {
        return (StatusCode::FORBIDDEN, "Login failed").into_response();
    }

    Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, "/home")
        .header(header::SET_COOKIE, format!("{}; Path=/", ups.cookie()))
        .body(Body::empty())
        .unwrap()
}

async fn home(State(ups): State<Arc<FakeUps>>) -> impl IntoResponse {
    let _guard = ups.enter().await;
    axum::response::Html("<html><body>Welcome</body></html>")
}

async fn status(State(ups): State<Arc<FakeUps>>, headers: HeaderMap) -> Response {
    let _guard = ups.enter().await;
    ups.status_gets.fetch_add(1, Ordering::SeqCst);

    let failures = ups.status_failures.load(Ordering::SeqCst);
    if failures > 0 {
        ups.status_failures.store(failures - 1, Ordering::SeqCst);
        return (StatusCode::SERVICE_UNAVAILABLE, "busy").into_response();
    }

    let has_session = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|cookies| cookies.split("; ").any(|c| c == ups.cookie()));
    if !has_session {
        return (StatusCode::FORBIDDEN, "Session expired").into_response();
    }

    if ups.truncate_status.load(Ordering::SeqCst) {
        // Headers and the first chunk go out, then the connection drops short
        // of the announced length, so only the body read fails
        let head = futures_util::stream::once(async {
            Ok::<_, std::io::Error>(TRUNCATED_STATUS_PAGE)
        });
        let reset = futures_util::stream::once(async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Err::<&'static str, _>(std::io::Error::other("card reset"))
        });
        return Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/html")
            .header(header::CONTENT_LENGTH, STATUS_PAGE.len())
            .body(Body::from_stream(head.chain(reset)))
            .unwrap();
    }

    axum::response::Html(STATUS_PAGE).into_response()
}

/// Start the fake card on an ephemeral port and return its base URL
pub async fn spawn(ups: Arc<FakeUps>) -> String {
    let app = Router::new()
        .route("/logon", get(logon))
        .route("/j_security_check", post(security_check))
        .route("/home", get(home))
        .route("/status", get(status))
        .with_state(ups);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

pub fn test_config(ups_url: &str) -> Config {
    Config {
        ups_url: ups_url.to_string(),
        username: USERNAME.to_string(),
        password: SecretString::new(PASSWORD.to_string().into()),
        verify_ssl: true,
        request_timeout_seconds: 5,
        server: ServerConfig {
            addr: "127.0.0.1".to_string(),
            port: 0,
        },
    }
}

/// A base URL nothing listens on
pub async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
