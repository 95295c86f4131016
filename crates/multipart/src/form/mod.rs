//! The materialization layer.
//!
//! Consumes framing events from [`crate::codec`] and produces randomly
//! re-readable parts under strict resource bounds:
//!
//! - [`MultipartPart`]: one materialized part, in memory up to the spool
//!   threshold and in an anonymous temporary file beyond it
//! - [`PartMaterializer`]: the event consumer enforcing the spool threshold
//!   and the aggregate memory/disk budgets of one session
//! - [`MultipartParser`]: drives the framing parser and the materializer
//!   over a whole byte source and exposes completed parts by field name
//! - [`MultipartConfig`]: the combined configuration of both layers
//!
//! All I/O here is synchronous and caller-driven; temporary files are owned
//! by their part and removed on drop, on every exit path.

mod materializer;
pub use materializer::PartMaterializer;

mod parser;
pub use parser::MultipartConfig;
pub use parser::MultipartParser;

mod part;
pub use part::MultipartPart;
