//! Core protocol types for multipart decoding.
//!
//! This module holds the vocabulary shared by the framing and
//! materialization layers:
//!
//! - **Events** ([`item`]): [`MultipartItem`], the stream of framing events
//!   emitted by the push parser
//! - **Segments** ([`segment`]): [`MultipartSegment`], one segment's header
//!   block with derived accessors
//! - **Limits** ([`limits`]): [`ParserLimits`] and [`SpoolPolicy`], the
//!   defensive ceilings both layers enforce
//! - **Errors** ([`error`]): [`MultipartError`], the single error type for
//!   the whole decode, and [`ErrorCategory`]
//!
//! Everything here is pure data; the state machines that produce and
//! consume these types live in [`crate::codec`] and [`crate::form`].

mod error;
pub use error::ErrorCategory;
pub use error::MultipartError;

mod item;
pub use item::MultipartItem;

mod segment;
pub use segment::MultipartSegment;

mod limits;
pub use limits::ParserLimits;
pub use limits::SpoolPolicy;
