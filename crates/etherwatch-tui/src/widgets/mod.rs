pub mod rate_fmt;
pub mod status_badge;
