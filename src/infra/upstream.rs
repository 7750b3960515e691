use std::time::Duration;

use serde_json::Value;

use crate::domain::error::UpstreamError;
use crate::domain::model::{HttpMethod, ResolvedPath};
use crate::domain::services::UpstreamHandler;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Production `UpstreamHandler` backed by a reqwest client.
pub struct HttpUpstreamHandler {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl HttpUpstreamHandler {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, request_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            // Never follow redirects — the tracker could redirect to internal hosts.
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            request_timeout,
        })
    }

    fn url_for(&self, path: &ResolvedPath) -> String {
        format!("{}{}", self.base_url, path.path)
    }
}

fn reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait::async_trait]
impl UpstreamHandler for HttpUpstreamHandler {
    async fn execute(
        &self,
        path: &ResolvedPath,
        method: HttpMethod,
        payload: Option<&Value>,
    ) -> Result<Value, UpstreamError> {
        let url = self.url_for(path);
        let mut request = self.client.request(reqwest_method(method), &url);
        if let Some(body) = payload {
            request = request.json(body);
        }

        let response = tokio::time::timeout(self.request_timeout, request.send())
            .await
            .map_err(|_| UpstreamError::Timeout {
                elapsed_secs: self.request_timeout.as_secs(),
            })?
            .map_err(|e| UpstreamError::Network {
                detail: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| UpstreamError::Server {
                status: status.as_u16(),
                detail: format!("invalid JSON body: {e}"),
            });
        }

        let detail = response.text().await.unwrap_or_default();
        Err(match status.as_u16() {
            404 => UpstreamError::NotFound {
                detail: format!("{url} returned 404"),
            },
            s if s >= 500 => UpstreamError::Server { status: s, detail },
            s => UpstreamError::Validation {
                detail: format!("upstream rejected the request (status {s}): {detail}"),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let handler =
            HttpUpstreamHandler::new("https://tracker.example.com/", Duration::from_secs(30))
                .unwrap();
        let resolved = ResolvedPath {
            path: "/rest/v2/issues/1".into(),
            surface: "upstream".into(),
            consumed: BTreeMap::new(),
        };
        assert_eq!(
            handler.url_for(&resolved),
            "https://tracker.example.com/rest/v2/issues/1"
        );
    }
}
