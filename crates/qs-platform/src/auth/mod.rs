//! Authentication infrastructure

pub mod token_service;
