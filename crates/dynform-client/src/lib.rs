#![allow(missing_docs)]

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod retry;
#[cfg(feature = "test-util")]
pub mod testing;
pub mod transport;

pub use cache::QueryCache;
pub use client::RemoteDataCache;
pub use config::{CacheConfig, ClientConfig, DEFAULT_BASE_URL};
pub use error::FetchError;
pub use retry::{RetryPolicy, StatusRange, run_with_retry};
#[cfg(feature = "http")]
pub use transport::HttpTransport;
pub use transport::{FormTransport, SubmitResponse};
