//! An incremental `multipart/form-data` decoder
//!
//! This crate decodes `multipart/form-data` bodies
//! ([RFC 7578](https://tools.ietf.org/html/rfc7578)) — the wire format
//! browsers and HTTP clients use to upload files and form fields —
//! incrementally, from a byte stream whose total length may be unknown in
//! advance, while defending against malformed or adversarial input.
//!
//! # Features
//!
//! - Incremental push parsing with chunk-boundary independence: feed
//!   arbitrarily small chunks, get the same event sequence
//! - No I/O and no blocking in the framing layer; usable from blocking
//!   reads and event-driven stacks alike
//! - `tokio_util::codec::Decoder` integration for `FramedRead`-style use
//! - Resource-bounded materialization: per-part memory spooling to
//!   anonymous temporary files plus aggregate memory and disk budgets
//! - Configurable defensive limits on header size, header count, segment
//!   count, segment size and total body length
//! - Strict and lenient conformance modes
//! - Untrusted-filename sanitization (Windows, UNC and POSIX paths reduce
//!   to their final component)
//!
//! # Example
//!
//! ```
//! use std::io::Cursor;
//! use micro_multipart::form::{MultipartConfig, MultipartParser};
//! use micro_multipart::protocol::{ParserLimits, SpoolPolicy};
//!
//! let body = b"--frontier\r\n\
//!     Content-Disposition: form-data; name=\"title\"\r\n\
//!     \r\n\
//!     weekly report\r\n\
//!     --frontier\r\n\
//!     Content-Disposition: form-data; name=\"file\"; filename=\"report.txt\"\r\n\
//!     Content-Type: text/plain\r\n\
//!     \r\n\
//!     the report content\r\n\
//!     --frontier--\r\n";
//!
//! // every ceiling is explicit: pick values that fit your deployment
//! let limits = ParserLimits {
//!     max_header_size: 8 * 1024,
//!     max_header_count: 16,
//!     max_segment_count: 100,
//!     max_segment_size: 8 * 1024 * 1024,
//! };
//! let policy = SpoolPolicy {
//!     spool_limit: 64 * 1024,
//!     memory_limit: 1024 * 1024,
//!     disk_limit: 64 * 1024 * 1024,
//!     buffer_size: 16 * 1024,
//! };
//!
//! let config = MultipartConfig::new(limits, policy);
//! let mut form = MultipartParser::parse(Cursor::new(&body[..]), "frontier", config).unwrap();
//!
//! assert_eq!(form.get_mut("title").unwrap().value().unwrap(), "weekly report");
//!
//! let file = form.get("file").unwrap();
//! assert_eq!(file.filename(), Some("report.txt"));
//! assert_eq!(file.content_type(), Some("text/plain"));
//! assert_eq!(file.size(), 18);
//! ```
//!
//! For streaming use — bodies arriving chunk by chunk over the wire —
//! drive [`codec::PushMultipartParser`] directly and consume its event
//! stream; see the module documentation of [`codec`].
//!
//! # Architecture
//!
//! The crate is organized into four modules:
//!
//! - [`codec`]: the framing layer — a byte-level state machine turning
//!   chunked input into segment, body-fragment, end-of-segment and
//!   end-of-stream events
//! - [`form`]: the materialization layer — turns body events into
//!   re-readable parts under spool thresholds and aggregate budgets
//! - [`protocol`]: the shared vocabulary — events, segments, limits and
//!   the error type
//! - [`header`]: the parameter grammar of Content-Disposition and
//!   Content-Type header values
//!
//! Data flows raw bytes → [`codec::PushMultipartParser`] →
//! [`protocol::MultipartItem`] events → [`form::PartMaterializer`] →
//! [`form::MultipartPart`] → [`form::MultipartParser`] collection.
//!
//! # Error Handling
//!
//! Every violation — framing or grammar errors, exceeded resource limits,
//! use of a closed parser — surfaces as [`protocol::MultipartError`] with a
//! message identifying the violated invariant. All errors are fatal to the
//! current decode: there is no retry or partial recovery, and callers are
//! expected to map a failure to a 4xx response.
//!
//! # Resource Model
//!
//! Single-threaded and synchronous. The framing parser buffers no more
//! than the current segment's in-flight data plus the residual needed to
//! detect delimiters split across chunks; backpressure is implicit because
//! the caller controls how fast bytes are fed in. Spilled parts own their
//! anonymous temporary files, which the operating system reclaims as soon
//! as the part is dropped, on every exit path.
//!
//! # Limitations
//!
//! - Decoding only; multipart generation is out of scope
//! - No HTTP transport or chunked-transfer decoding: callers feed raw
//!   decoded body bytes
//! - Form values are exposed as raw bytes plus a declared charset;
//!   beyond [`form::MultipartPart::value`] no transcoding is performed

pub mod codec;
pub mod form;
pub mod header;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
