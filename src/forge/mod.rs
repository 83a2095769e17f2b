//! GitFlic API core: transport, retries, payload normalization and the
//! per-resource services built on top of them.

pub mod client;
pub mod cookies;
pub mod page;
pub mod request;
pub mod retry;
pub mod services;
pub mod status;
pub mod time;

pub use client::{Client, Download, CLOUD_HOST};
pub use request::{ApiRequest, Method};
pub use services::RepoRef;
