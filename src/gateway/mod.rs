//! HTTP gateway: request validation, dispatch and error mapping

pub mod error;
pub mod request;
pub mod server;

pub use error::GatewayError;
pub use request::{Operation, TranslationRequest, TranslationResponse};
pub use server::{router, serve, GatewayState};
