//! DjangoVerseHub API client

pub mod api;
pub mod endpoints;
#[cfg(test)]
pub mod mock;
pub mod models;
pub mod rate_limit;
pub mod transport;

pub use api::{ApiClient, ApiResponse, ClientSettings, RequestOptions};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
