//! The identified HTTP client.
//!
//! Every outbound request carries the launcher's user-agent and the
//! `X-Hytale-Launcher-Version` / `X-Hytale-Launcher-Branch` headers. The
//! client has connect and read timeouts but no overall deadline: large
//! downloads run as long as bytes keep flowing.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use tracing::debug;

use launcher_types::BuildInfo;

use crate::error::FetchError;
use crate::mode::NetworkMode;

/// Header carrying the launcher version.
pub const VERSION_HEADER: &str = "X-Hytale-Launcher-Version";

/// Header carrying the release branch.
pub const BRANCH_HEADER: &str = "X-Hytale-Launcher-Branch";

/// HTTP client wrapper shared by all outbound callers.
pub struct Fetcher {
    client: reqwest::Client,
    mode: Arc<NetworkMode>,
}

impl Fetcher {
    /// Build the client with identifying headers and transport timeouts.
    pub fn new(build: BuildInfo, mode: Arc<NetworkMode>) -> Result<Fetcher, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&build.user_agent())
                .unwrap_or_else(|_| HeaderValue::from_static("hytale-launcher")),
        );
        if let Ok(value) = HeaderValue::from_str(build.version) {
            headers.insert(VERSION_HEADER, value);
        }
        if let Ok(value) = HeaderValue::from_str(build.release) {
            headers.insert(BRANCH_HEADER, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .read_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Fetcher { client, mode })
    }

    /// The underlying client, for streaming callers.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// The shared network mode.
    pub fn mode(&self) -> &NetworkMode {
        &self.mode
    }

    /// GET `url` and decode the JSON body into `T`. Non-200 is an error.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        self.mode.offline_error()?;
        debug!(url, "fetching json");

        let resp = self.client.get(url).query(query).send().await?;
        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(resp.json().await?)
    }

    /// GET `url` with a bearer token and decode the JSON body.
    pub async fn get_json_with_bearer<T: DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, FetchError> {
        self.mode.offline_error()?;
        debug!(url, "fetching json (authenticated)");

        let resp = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {access_token}"))
            .send()
            .await?;
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(FetchError::Auth(format!("{url} answered {status}")));
        }
        if status != reqwest::StatusCode::OK {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(resp.json().await?)
    }
}
