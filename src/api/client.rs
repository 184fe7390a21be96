use super::constants::{self, CONTENT_TYPE_XML, service_endpoint};
use super::envelope;
use super::logging::CallLogger;
use super::transport::{SoapCall, SoapTransport};
use crate::config::Config;
use crate::error::{Error, RemoteFailure, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::StatusCode;
use std::time::Duration;

/// HTTP client for the application server's JWS endpoints with connection pooling
pub struct AppServerClient {
    base_url: String,
    auth_user: String,
    http_client: reqwest::Client,
    logger: CallLogger,
}

impl AppServerClient {
    /// Builds the client; no request is sent until the first call.
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config.app_server_base_url();
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(config.http.timeout_secs))
            .connect_timeout(Duration::from_secs(config.http.connect_timeout_secs))
            .user_agent(concat!("applus-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Connection {
                endpoint: base_url.clone(),
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self::with_custom_client(config, http_client))
    }

    pub fn with_custom_client(config: &Config, http_client: reqwest::Client) -> Self {
        Self {
            base_url: config.app_server_base_url(),
            auth_user: constants::auth_user(&config.appserver.user, &config.appserver.env),
            http_client,
            logger: CallLogger::new(config.http.log_payloads),
        }
    }

    async fn send(&self, call: &SoapCall, url: &str, body: String) -> Result<Option<String>> {
        let service = call.service.to_string();

        let response = self
            .http_client
            .post(url)
            .basic_auth(&self.auth_user, Some(""))
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE_XML)
            .header("SOAPAction", "\"\"")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    Error::Connection {
                        endpoint: url.to_string(),
                        message: e.to_string(),
                    }
                } else {
                    Error::remote(&service, &call.method, RemoteFailure::Transport(e.to_string()))
                }
            })?;

        let status = response.status();
        debug!("{} {} -> {}", call.service, call.method, status);

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::Connection {
                endpoint: url.to_string(),
                message: format!("credentials rejected for user '{}' ({})", self.auth_user, status),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::remote(&service, &call.method, RemoteFailure::Transport(e.to_string())))?;

        if status.is_success() {
            return envelope::parse_response(&text, &service, &call.method);
        }

        // Axis reports faults with HTTP 500; anything else without a fault is a status error.
        match envelope::parse_response(&text, &service, &call.method) {
            Err(err @ Error::RemoteCall { failure: RemoteFailure::Fault(_), .. }) => Err(err),
            _ => Err(Error::remote(
                &service,
                &call.method,
                RemoteFailure::Status(status.as_u16(), text.chars().take(500).collect()),
            )),
        }
    }
}

#[async_trait]
impl SoapTransport for AppServerClient {
    async fn invoke(&self, call: &SoapCall) -> Result<Option<String>> {
        let url = service_endpoint(&self.base_url, &call.service);
        let context = self.logger.start_call(&call.service.to_string(), &call.method);

        let outcome = match envelope::build_request(&url, &call.method, &call.params) {
            Ok(body) => {
                self.logger.log_payload(&context, &body);
                self.send(call, &url, body).await
            }
            Err(e) => Err(e),
        };

        self.logger.complete_call(&context, &outcome);
        outcome
    }

    fn endpoint(&self) -> String {
        self.base_url.clone()
    }
}
