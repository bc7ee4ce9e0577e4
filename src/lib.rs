//! Translation Gateway - LLM-backed translation over HTTP
//!
//! This crate provides both the server binary and the reusable pieces behind
//! it: configuration, the completion client, the translator service and the
//! axum router.

pub mod config;
pub mod gateway;
pub mod services;

pub use config::Config;
pub use services::translator::TranslatorService;
