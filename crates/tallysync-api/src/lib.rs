// tallysync-api: Async REST client for the tallysync backend (table reads + probes)

pub mod error;
pub mod rest;
pub mod transport;

pub use error::Error;
pub use rest::RestClient;
pub use transport::{TlsMode, TransportConfig};
