pub mod cache;
pub mod client;
pub mod decode;
pub mod rate_limiter;
pub mod transport;

pub use client::IssClient;
pub use transport::{HttpIssTransport, IssTransport, TransportError};
