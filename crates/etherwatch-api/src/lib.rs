// etherwatch-api: wire contract of the EtherWatch controller (telemetry feed + history)

pub mod error;
pub mod feed;
pub mod history;
pub mod origin;
pub mod transport;
pub mod types;

pub use error::Error;
pub use feed::{FeedEvent, FeedHandle, ReconnectConfig};
pub use history::HistoryClient;
pub use origin::{Location, resolve_controller_origin, to_stream_origin};
pub use transport::{TlsMode, TransportConfig};
