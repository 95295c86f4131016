//! The multipart framing layer.
//!
//! This module turns raw bytes into structured framing events using a state
//! machine pattern:
//!
//! - [`PushMultipartParser`]: the incremental parser; push chunks in, drain
//!   [`Events`] out, or drive it through its `tokio_util::codec::Decoder`
//!   impl
//! - Delimiter scanning via the [`scanner`] module
//!
//! The framing layer performs no I/O and allocates no more than the current
//! segment's in-flight data; resource-bounded materialization of whole
//! parts lives in [`crate::form`].

mod push_parser;
mod scanner;

pub use push_parser::Events;
pub use push_parser::PushMultipartParser;
