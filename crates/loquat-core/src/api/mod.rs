//! HTTP access to the chat backend

pub mod backend;
pub mod client;

pub use backend::ChatBackend;
pub use client::ChatApiClient;
