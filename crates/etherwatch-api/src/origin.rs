//! Controller origin resolution.
//!
//! The client talks to exactly one controller. Its base address comes
//! from an explicit override when one is configured, otherwise it is
//! inferred from the location the client itself is served from: local
//! development servers run on well-known ports and are redirected to the
//! controller's default port on the same host.

use url::Url;

use crate::error::Error;

/// Ports used by local development front-end servers.
pub const DEV_SERVER_PORTS: [u16; 2] = [5173, 4173];

/// Port the controller listens on by default.
pub const DEFAULT_CONTROLLER_PORT: u16 = 8080;

/// Path of the streaming telemetry endpoint.
pub const STREAM_PATH: &str = "/ws";

/// Path of the history query endpoint.
pub const HISTORY_PATH: &str = "/api/history";

/// Where the client believes it is running: scheme, host and optional port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
}

impl Location {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port,
        }
    }

    /// Parse a location from an absolute URL such as `http://localhost:5173/`.
    ///
    /// Only an explicitly written port is kept; `http://host` stays portless.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let url = Url::parse(input)?;
        let host = url
            .host_str()
            .ok_or(Error::InvalidUrl(url::ParseError::EmptyHost))?;
        Ok(Self::new(url.scheme(), host, url.port()))
    }

    fn origin_with_port(&self, port: Option<u16>) -> String {
        match port {
            Some(port) => format!("{}://{}:{port}", self.scheme, self.host),
            None => format!("{}://{}", self.scheme, self.host),
        }
    }

    /// `scheme://host[:port]`.
    pub fn origin(&self) -> String {
        self.origin_with_port(self.port)
    }
}

/// Resolve the controller's HTTP origin.
///
/// A non-blank override wins and is returned as written (surrounding
/// whitespace trimmed). Otherwise a location on a dev-server port maps to
/// [`DEFAULT_CONTROLLER_PORT`] on the same scheme and host, and any other
/// location is its own origin.
pub fn resolve_controller_origin(override_origin: Option<&str>, location: &Location) -> String {
    if let Some(origin) = override_origin.map(str::trim).filter(|o| !o.is_empty()) {
        return origin.to_owned();
    }

    match location.port {
        Some(port) if DEV_SERVER_PORTS.contains(&port) => {
            location.origin_with_port(Some(DEFAULT_CONTROLLER_PORT))
        }
        _ => location.origin(),
    }
}

/// Map an HTTP(S) origin to its websocket equivalent.
///
/// `http` becomes `ws`, `https` becomes `wss`. Origins already in
/// websocket form, or in any other form, pass through unchanged.
pub fn to_stream_origin(origin: &str) -> String {
    if origin.starts_with("ws://") || origin.starts_with("wss://") {
        return origin.to_owned();
    }
    if let Some(rest) = origin.strip_prefix("https://") {
        return format!("wss://{rest}");
    }
    if let Some(rest) = origin.strip_prefix("http://") {
        return format!("ws://{rest}");
    }
    origin.to_owned()
}

/// Full URL of the streaming telemetry endpoint for `origin`.
pub fn stream_url(origin: &str) -> Result<Url, Error> {
    let base = to_stream_origin(origin.trim_end_matches('/'));
    Ok(Url::parse(&format!("{base}{STREAM_PATH}"))?)
}

/// Full URL of the history endpoint for `origin`, without query parameters.
pub fn history_url(origin: &str) -> Result<Url, Error> {
    let base = origin.trim_end_matches('/');
    Ok(Url::parse(&format!("{base}{HISTORY_PATH}"))?)
}
