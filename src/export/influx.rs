//! InfluxDB HTTP write API sink.

use crate::core::{Result, StatsError};
use crate::export::point::BatchPoints;
use crate::export::PointSink;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use std::time::{Duration, Instant};

/// Connection settings for [`InfluxClient`]
#[derive(Debug, Clone)]
pub struct InfluxConfig {
    /// Base URL, e.g. `http://localhost:8086`
    pub address: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl InfluxConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            username: None,
            password: None,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Parse and check a sink base address.
///
/// Only absolute `http`/`https` URLs with a host are accepted.
pub fn parse_address(address: &str) -> Result<Url> {
    let url = Url::parse(address)
        .map_err(|e| StatsError::config(format!("invalid influx address '{}': {}", address, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(StatsError::config(format!(
            "influx address '{}' must use http or https",
            address
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(StatsError::config(format!(
            "influx address '{}' has no host",
            address
        )));
    }

    Ok(url)
}

fn endpoint(base: &Url, name: &str) -> Url {
    let mut url = base.clone();
    let path = format!("{}/{}", base.path().trim_end_matches('/'), name);
    url.set_path(&path);
    url.set_query(None);
    url
}

/// Client for the InfluxDB 1.x `/write` endpoint.
#[derive(Debug)]
pub struct InfluxClient {
    http: reqwest::Client,
    write_url: Url,
    ping_url: Url,
    credentials: Option<(String, String)>,
}

impl InfluxClient {
    /// Build a client, failing on a malformed address or HTTP client setup
    pub fn new(config: InfluxConfig) -> Result<Self> {
        let base = parse_address(&config.address)?;

        let credentials = match (config.username, config.password) {
            (Some(user), Some(pass)) => Some((user, pass)),
            (None, None) => None,
            _ => {
                return Err(StatsError::config(
                    "influx username and password must be given together",
                ))
            },
        };

        let http = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            write_url: endpoint(&base, "write"),
            ping_url: endpoint(&base, "ping"),
            credentials,
        })
    }

    pub fn write_url(&self) -> &Url {
        &self.write_url
    }

    /// Check that the server answers, returning the round trip time
    pub async fn ping(&self) -> Result<Duration> {
        let start = Instant::now();
        let rsp = self.http.get(self.ping_url.clone()).send().await?;
        let status = rsp.status();
        if status.is_success() {
            Ok(start.elapsed())
        } else {
            Err(StatsError::sink(format!("ping failed: {}", status.as_u16())))
        }
    }
}

#[async_trait]
impl PointSink for InfluxClient {
    async fn write(&self, batch: BatchPoints) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut url = self.write_url.clone();
        url.query_pairs_mut()
            .append_pair("db", batch.database())
            .append_pair("precision", batch.precision().as_str());

        let mut req = self
            .http
            .post(url)
            .header(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))
            .body(batch.to_line_protocol());
        if let Some((user, pass)) = &self.credentials {
            req = req.basic_auth(user, Some(pass));
        }

        let rsp = req.send().await?;
        let status = rsp.status();
        if status == StatusCode::OK || status == StatusCode::NO_CONTENT {
            return Ok(());
        }

        let detail = rsp.text().await.unwrap_or_default();
        if detail.trim().is_empty() {
            Err(StatsError::sink(format!("error response: {}", status.as_u16())))
        } else {
            Err(StatsError::sink(format!(
                "error response: {} {}",
                status.as_u16(),
                detail.trim()
            )))
        }
    }

    fn name(&self) -> &str {
        "influx"
    }
}
