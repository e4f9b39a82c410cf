//! Production HTTP transport over `reqwest`: multipart capture upload,
//! server-sent event stream, and recall queries.

mod client;
mod config;
mod sse;

pub use client::HttpTransport;
pub use config::ApiConfig;
