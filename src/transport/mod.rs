//! HTTP transport shared by the provider adapters.

mod http;

pub use http::HttpTransport;
