pub mod error;
pub mod lifecycle;
pub mod relay_service;
