//! Shared infrastructure

pub mod error;
pub mod indexes;
pub mod middleware;
