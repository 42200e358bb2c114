//! HTTP transport for identity probes, project reads and project writes.

mod http;

pub use http::HttpClient;
