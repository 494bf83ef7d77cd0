//! Quillspace Common
//!
//! Cross-cutting helpers shared by the platform library and server binaries.

pub mod logging;
