use crate::app::ports::{FetchOptions, FetchResponse, HttpClientPort};
use crate::common::constants::{BROWSER_ACCEPT, BROWSER_ACCEPT_LANGUAGE, DEFAULT_USER_AGENT};
use crate::observability::metrics;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use std::time::Instant;
use tracing::{debug, warn};

pub struct ReqwestHttp {
    client: reqwest::Client,
    user_agent: String,
}

impl Default for ReqwestHttp {
    fn default() -> Self {
        Self::new(DEFAULT_USER_AGENT)
    }
}

impl ReqwestHttp {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            user_agent: user_agent.into(),
        }
    }
}

#[async_trait]
impl HttpClientPort for ReqwestHttp {
    async fn get(&self, url: &str, options: &FetchOptions) -> FetchResponse {
        let started = Instant::now();
        let mut request = self.client.get(url).timeout(options.timeout);
        if options.browser_mode {
            request = request
                .header(USER_AGENT, self.user_agent.as_str())
                .header(ACCEPT, BROWSER_ACCEPT)
                .header(ACCEPT_LANGUAGE, BROWSER_ACCEPT_LANGUAGE);
        }
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let resp = match request.send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!("GET {} failed: {}", url, e);
                metrics::fetch::request_error();
                return FetchResponse::failed(0, e.to_string());
            }
        };

        let status = resp.status();
        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!("GET {} body read failed: {}", url, e);
                metrics::fetch::request_error();
                return FetchResponse::failed(status.as_u16(), e.to_string());
            }
        };
        metrics::fetch::request_duration(started.elapsed().as_secs_f64());

        if !status.is_success() {
            debug!("GET {} returned status {}", url, status);
            metrics::fetch::request_error();
            return FetchResponse {
                success: false,
                status_code: status.as_u16(),
                body,
                error: Some(format!("HTTP status {}", status)),
            };
        }

        metrics::fetch::request_success(body.len());
        FetchResponse::ok(status.as_u16(), body)
    }
}
