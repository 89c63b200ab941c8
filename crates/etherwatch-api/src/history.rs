// History endpoint HTTP client
//
// Wraps `reqwest::Client` with the controller's `/api/history` query
// contract. Anything but a 2xx with a well-formed JSON body is an error;
// the caller decides how to surface it.

use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::origin;
use crate::transport::TransportConfig;
use crate::types::HistoryResponse;

/// Longest body excerpt kept in deserialization error messages.
const BODY_PREVIEW_CHARS: usize = 200;

/// Raw HTTP client for the controller's history query endpoint.
#[derive(Debug, Clone)]
pub struct HistoryClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl HistoryClient {
    /// Create a history client for the controller at `origin`
    /// (e.g. `http://10.0.0.5:8080`).
    pub fn new(origin: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::with_client(origin, http)
    }

    /// Create a history client around a pre-built `reqwest::Client`.
    pub fn with_client(origin: &str, http: reqwest::Client) -> Result<Self, Error> {
        Ok(Self {
            http,
            endpoint: origin::history_url(origin)?,
        })
    }

    /// The endpoint URL, without query parameters.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Build the query URL for one interface's recent history.
    pub fn query_url(&self, device: &str, iface: &str, minutes: u32) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("device", device)
            .append_pair("iface", iface)
            .append_pair("minutes", &minutes.to_string());
        url
    }

    /// Fetch the last `minutes` of samples for `device`/`iface`.
    ///
    /// `GET /api/history?device=<id>&iface=<name>&minutes=<n>`
    pub async fn fetch_history(
        &self,
        device: &str,
        iface: &str,
        minutes: u32,
    ) -> Result<HistoryResponse, Error> {
        let url = self.query_url(device, iface, minutes);
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        let status = resp.status();

        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url: resp.url().to_string(),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })
    }
}
