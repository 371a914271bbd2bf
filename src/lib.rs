//! CGP Rip Library
//!
//! Rips a book from the CGP online reader into a single PDF. The binary in
//! main.rs wraps this crate in a CLI and a local relay server.
//!
//! # Modules
//!
//! - `vendor`: session login, signed cookies and asset fetches
//! - `pipeline`: page ranges, the bounded page assembler and the rip driver
//! - `pdf`: document assembly (image layers and outline)
//! - `storage`: output directory layout
//! - `routes`: relay API

pub mod config;
pub mod error;
pub mod pdf;
pub mod pipeline;
pub mod routes;
pub mod state;
pub mod storage;
pub mod vendor;

#[cfg(test)]
mod test_support;

pub use error::{Result, RipError};
