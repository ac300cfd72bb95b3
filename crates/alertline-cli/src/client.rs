//! Minimal HTTP client for a running server.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Method;
use serde_json::Value;

use alertline_api::models::ApiResponse;
use alertline_api::{hash_token, Config};
use alertline_core::config::headers;
use alertline_core::IncomingReport;

pub struct Client {
    http: reqwest::Client,
    base_url: String,
    token_hash: Option<String>,
}

impl Client {
    /// Client for the server described by `config`. A wildcard listen
    /// address is reached through loopback.
    pub fn from_config(config: &Config, token: Option<&str>) -> Result<Self> {
        let addr = config.socket_addr()?;
        let ip = match addr.ip() {
            IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
            ip => ip,
        };
        let host = match ip {
            IpAddr::V4(ip) => ip.to_string(),
            IpAddr::V6(ip) => format!("[{}]", ip),
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.server_write_timeout_secs.max(1)))
            .user_agent(format!("alertline-cli/{}", alertline_core::VERSION))
            .build()?;

        Ok(Self {
            http,
            base_url: format!("http://{}:{}", host, addr.port()),
            token_hash: token.map(hash_token),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn ping(&self) -> Result<Value> {
        self.request(Method::GET, "/api/ping", None).await
    }

    pub async fn send(&self, report: &IncomingReport) -> Result<Value> {
        let body = serde_json::to_value(report)?;
        self.request(Method::POST, "/api/report", Some(body)).await
    }

    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method, &url);
        if let Some(hash) = &self.token_hash {
            request = request.header(headers::API_TOKEN, hash);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("cannot reach {}", url))?;
        let status = response.status();
        let envelope: ApiResponse<Value> = response
            .json()
            .await
            .with_context(|| format!("unexpected response from {} ({})", url, status))?;

        match (envelope.success, envelope.data, envelope.error) {
            (true, Some(data), _) => Ok(data),
            (_, _, Some(error)) => bail!("{} {}: {}", status, error.code, error.message),
            _ => bail!("{} without data", status),
        }
    }
}
