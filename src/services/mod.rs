//! Outbound services

pub mod completion;
pub mod translator;
