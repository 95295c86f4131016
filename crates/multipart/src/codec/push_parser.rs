//! Incremental framing parser for `multipart/form-data` bodies.
//!
//! This module provides the byte-level state machine that turns a sequence
//! of arbitrarily-chunked buffers into [`MultipartItem`] events, as defined
//! in [RFC 7578](https://tools.ietf.org/html/rfc7578). The parser performs
//! no I/O and never blocks: it is driven by a caller that submits byte
//! chunks as they become available, which makes it equally usable from
//! blocking reads and event-driven stacks.
//!
//! The central correctness property is chunk-boundary independence: for any
//! valid body and any way of splitting it into chunks (down to one byte at
//! a time), the resulting sequence of (segment, concatenated body,
//! end-of-segment) tuples is identical. Body fragments may be re-chunked
//! arbitrarily relative to the input chunking.
//!
//! Buffering is bounded: only the current segment's undelivered data plus
//! the small residual needed to detect a delimiter split across chunk
//! boundaries is retained between calls.

use bytes::{Buf, Bytes, BytesMut};
use encoding_rs::{Encoding, UTF_8};
use tokio_util::codec::Decoder;
use tracing::{debug, trace};

use crate::codec::scanner::{self, DelimiterScanner};
use crate::header::is_token;
use crate::protocol::{MultipartError, MultipartItem, MultipartSegment, ParserLimits};
use crate::ensure;

/// Framing states of one multipart stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Before the first delimiter line.
    Preamble,
    /// Accumulating one segment's header block.
    Header,
    /// Streaming one segment's body.
    Body,
    /// The terminal delimiter has been seen.
    Epilogue,
}

/// The incremental `multipart/form-data` framing parser.
///
/// Converts byte chunks into framing events with no full-body buffering.
/// Per segment it emits one [`MultipartItem::Segment`], zero or more
/// non-empty [`MultipartItem::Chunk`]s and one [`MultipartItem::SegmentEnd`];
/// after the final segment a single [`MultipartItem::Eof`] marks stream
/// completion.
///
/// Two driving styles share the same state machine:
///
/// - **Push**: call [`parse`](Self::parse) with each chunk as it arrives and
///   drain the returned [`Events`] iterator; an empty chunk (or
///   [`close`](Self::close)) signals end of input.
/// - **Codec**: the [`Decoder`] impl decodes from an external `BytesMut`,
///   so the parser can drive a `FramedRead` in async stacks.
///
/// Use one style per parser instance; mixing them splits the input across
/// two buffers.
///
/// # Example
///
/// ```
/// use micro_multipart::codec::PushMultipartParser;
/// use micro_multipart::protocol::{MultipartItem, ParserLimits};
///
/// let limits = ParserLimits {
///     max_header_size: 4096,
///     max_header_count: 8,
///     max_segment_count: 10,
///     max_segment_size: 1024 * 1024,
/// };
/// let mut parser = PushMultipartParser::new(b"boundary", limits).unwrap();
///
/// let body = b"--boundary\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nhello\r\n--boundary--";
/// for event in parser.parse(body) {
///     match event.unwrap() {
///         MultipartItem::Segment(segment) => assert_eq!(segment.name(), "a"),
///         MultipartItem::Chunk(data) => assert_eq!(&data[..], b"hello"),
///         MultipartItem::SegmentEnd | MultipartItem::Eof => {}
///     }
/// }
/// parser.close().unwrap();
/// ```
#[derive(Debug)]
pub struct PushMultipartParser {
    scanner: DelimiterScanner,
    limits: ParserLimits,
    strict: bool,
    header_charset: &'static Encoding,
    content_length: Option<u64>,

    state: State,
    closed: bool,
    failed: bool,

    /// Rolling buffer for the push API.
    buffer: BytesMut,
    /// Bytes ever submitted through the push API.
    total_in: u64,
    /// Bytes consumed by the state machine, whichever driving style.
    consumed: u64,
    /// Error detected at feed time, delivered by the next [`Events`] pull.
    pending_error: Option<MultipartError>,

    /// True while the preamble position is known to be inside a junk line.
    preamble_mid_line: bool,

    header_lines: Vec<(String, String)>,
    /// Cumulative size of the logical header currently being accumulated.
    current_header_size: usize,
    segment_count: usize,

    /// Bytes of the current segment body delivered so far.
    body_size: u64,
    /// The current segment's own Content-Length header, if declared.
    declared_length: Option<u64>,

    /// An [`MultipartItem::Eof`] still owed to the caller.
    eof_pending: bool,
    /// The optional CRLF directly after the terminal delimiter was handled.
    epilogue_crlf_done: bool,
}

impl PushMultipartParser {
    /// Creates a parser for the given boundary.
    ///
    /// The boundary comes from the `boundary` parameter of the request's
    /// Content-Type header and is validated against RFC 2046 section 5.1.1
    /// (1 to 70 bytes from the boundary character set, not ending in a
    /// space).
    pub fn new(boundary: impl AsRef<[u8]>, limits: ParserLimits) -> Result<Self, MultipartError> {
        let boundary = boundary.as_ref();
        validate_boundary(boundary)?;

        Ok(Self {
            scanner: DelimiterScanner::new(boundary),
            limits,
            strict: false,
            header_charset: UTF_8,
            content_length: None,
            state: State::Preamble,
            closed: false,
            failed: false,
            buffer: BytesMut::new(),
            total_in: 0,
            consumed: 0,
            pending_error: None,
            preamble_mid_line: false,
            header_lines: Vec::new(),
            current_header_size: 0,
            segment_count: 0,
            body_size: 0,
            declared_length: None,
            eof_pending: false,
            epilogue_crlf_done: false,
        })
    }

    /// Declares the exact byte count of the whole body. Submitting more
    /// bytes than this fails immediately; signaling end of input before
    /// this many bytes were seen fails with a distinguishing message.
    pub fn with_content_length(mut self, content_length: u64) -> Self {
        self.content_length = Some(content_length);
        self
    }

    /// Toggles pedantic RFC conformance. Strict mode rejects preamble
    /// junk and epilogue junk that lenient mode silently discards.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Sets the encoding used to decode segment header bytes.
    /// Defaults to UTF-8.
    pub fn with_header_charset(mut self, charset: &'static Encoding) -> Self {
        self.header_charset = charset;
        self
    }

    /// Returns true once the terminal delimiter has been recognized.
    pub fn is_complete(&self) -> bool {
        self.state == State::Epilogue
    }

    /// Returns true once end of input has been signaled.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Submits the next chunk and returns the events it unlocked.
    ///
    /// Safe to call with arbitrarily small chunks. An empty chunk signals
    /// end of input: an error if the stream is not complete, otherwise the
    /// parser transitions to closed. Any call after that fails with
    /// "Parser closed", as does any call after a previous error.
    pub fn parse(&mut self, chunk: &[u8]) -> Events<'_> {
        if self.closed || self.failed {
            self.pending_error = Some(MultipartError::ParserClosed);
            return Events { parser: self };
        }

        if chunk.is_empty() {
            if let Err(e) = self.end_of_input() {
                self.pending_error = Some(e);
            }
            return Events { parser: self };
        }

        self.total_in += chunk.len() as u64;
        if let Some(limit) = self.content_length {
            if self.total_in > limit {
                self.pending_error = Some(MultipartError::ContentLengthLimitExceeded);
                return Events { parser: self };
            }
        }

        self.buffer.extend_from_slice(chunk);
        Events { parser: self }
    }

    /// Signals end of input.
    ///
    /// Must be called (or an empty chunk submitted) once no more bytes are
    /// available. Fails with "Unexpected end of multipart stream" if the
    /// terminal delimiter has not been seen. Idempotent after a successful
    /// close. Note that closing discards any events not yet drained.
    pub fn close(&mut self) -> Result<(), MultipartError> {
        if self.closed {
            return Ok(());
        }
        ensure!(!self.failed, MultipartError::ParserClosed);
        self.end_of_input()
    }

    fn end_of_input(&mut self) -> Result<(), MultipartError> {
        self.closed = true;
        if self.state == State::Epilogue {
            return Ok(());
        }
        self.failed = true;
        Err(self.unexpected_end(self.total_in))
    }

    fn unexpected_end(&self, observed: u64) -> MultipartError {
        match self.content_length {
            Some(expected) if observed < expected => MultipartError::UnexpectedEndBeforeLength,
            _ => MultipartError::UnexpectedEnd,
        }
    }

    /// Advances the state machine by at most one event.
    fn step(&mut self, src: &mut BytesMut) -> Result<Option<MultipartItem>, MultipartError> {
        let before = src.len();
        let result = self.step_inner(src);
        self.consumed += (before - src.len()) as u64;
        result
    }

    fn step_inner(&mut self, src: &mut BytesMut) -> Result<Option<MultipartItem>, MultipartError> {
        loop {
            match self.state {
                State::Preamble => {
                    if !self.step_preamble(src)? {
                        return Ok(None);
                    }
                    // transitioned to Header; keep going
                }
                State::Header => return self.step_header(src),
                State::Body => return self.step_body(src),
                State::Epilogue => return self.step_epilogue(src),
            }
        }
    }

    /// Scans for the first delimiter line.
    ///
    /// Returns true once `--boundary\r\n` has been consumed and the parser
    /// moved to the header state.
    ///
    /// Strict mode requires the stream to open with the delimiter line;
    /// lenient mode discards preceding junk line by line. In both modes a
    /// delimiter terminated by a bare LF is rejected.
    fn step_preamble(&mut self, src: &mut BytesMut) -> Result<bool, MultipartError> {
        if self.strict { self.step_preamble_strict(src) } else { self.step_preamble_lenient(src) }
    }

    fn step_preamble_strict(&mut self, src: &mut BytesMut) -> Result<bool, MultipartError> {
        let first_line = self.scanner.first_line();
        let probe = src.len().min(first_line.len());
        if src[..probe] != first_line[..probe] {
            let dash = self.scanner.dash_boundary().len();
            if src.len() > dash
                && src[..dash] == first_line[..dash]
                && src[dash] == b'\n'
            {
                return Err(MultipartError::InvalidLineBreak);
            }
            return Err(MultipartError::UnexpectedPreamble);
        }
        if probe < first_line.len() {
            // prefix so far; need more bytes
            return Ok(false);
        }
        src.advance(first_line.len());
        self.enter_header_state();
        Ok(true)
    }

    fn step_preamble_lenient(&mut self, src: &mut BytesMut) -> Result<bool, MultipartError> {
        loop {
            if src.is_empty() {
                return Ok(false);
            }

            if self.preamble_mid_line {
                // inside a junk line; everything up to the next LF is junk
                match src.iter().position(|&b| b == b'\n') {
                    Some(idx) => {
                        src.advance(idx + 1);
                        self.preamble_mid_line = false;
                    }
                    None => {
                        src.clear();
                        return Ok(false);
                    }
                }
                continue;
            }

            // at a line start
            let first_line = self.scanner.first_line();
            let probe = src.len().min(first_line.len());
            if src[..probe] == first_line[..probe] {
                if probe < first_line.len() {
                    return Ok(false);
                }
                src.advance(first_line.len());
                self.enter_header_state();
                return Ok(true);
            }

            let dash = self.scanner.dash_boundary().len();
            if src.len() > dash && src[..dash] == first_line[..dash] && src[dash] == b'\n' {
                return Err(MultipartError::InvalidLineBreak);
            }

            // a junk line; skip it
            trace!("discarding preamble junk line");
            match src.iter().position(|&b| b == b'\n') {
                Some(idx) => src.advance(idx + 1),
                None => {
                    src.clear();
                    self.preamble_mid_line = true;
                    return Ok(false);
                }
            }
        }
    }

    /// Consumes header lines until the blank line that ends the block.
    ///
    /// Emits [`MultipartItem::Segment`] once the block is complete.
    fn step_header(&mut self, src: &mut BytesMut) -> Result<Option<MultipartItem>, MultipartError> {
        loop {
            let Some(pos) = scanner::find_crlf(src) else {
                // no complete line yet; reject a line that can no longer fit
                let pending = if src.first().is_some_and(|&b| b == b' ' || b == b'\t') {
                    self.current_header_size + src.len()
                } else {
                    src.len()
                };
                ensure!(
                    pending <= self.limits.max_header_size,
                    MultipartError::HeaderSizeLimitExceeded
                );
                return Ok(None);
            };

            if pos == 0 {
                // blank line: the header block is complete
                src.advance(2);
                let lines = std::mem::take(&mut self.header_lines);
                let segment = MultipartSegment::new(lines, self.strict)?;

                self.segment_count += 1;
                ensure!(
                    self.segment_count <= self.limits.max_segment_count,
                    MultipartError::SegmentCountLimitExceeded
                );

                self.declared_length = segment.content_length();
                self.body_size = 0;
                self.state = State::Body;
                debug!(name = segment.name(), filename = segment.filename(), "segment opened");
                return Ok(Some(MultipartItem::Segment(segment)));
            }

            let line = src.split_to(pos);
            src.advance(2);
            self.parse_header_line(&line)?;
        }
    }

    fn parse_header_line(&mut self, line: &[u8]) -> Result<(), MultipartError> {
        let (text, had_errors) = self.header_charset.decode_without_bom_handling(line);
        ensure!(!had_errors, MultipartError::HeaderDecodeFailed);

        if text.starts_with(' ') || text.starts_with('\t') {
            // RFC 822 folded continuation of the previous header
            self.current_header_size += line.len();
            ensure!(
                self.current_header_size <= self.limits.max_header_size,
                MultipartError::HeaderSizeLimitExceeded
            );
            let last =
                self.header_lines.last_mut().ok_or(MultipartError::UnexpectedContinuation)?;
            let continuation = text.trim();
            if !continuation.is_empty() {
                if !last.1.is_empty() {
                    last.1.push(' ');
                }
                last.1.push_str(continuation);
            }
            return Ok(());
        }

        self.current_header_size = line.len();
        ensure!(
            self.current_header_size <= self.limits.max_header_size,
            MultipartError::HeaderSizeLimitExceeded
        );

        let Some(colon) = text.find(':') else {
            return Err(MultipartError::MalformedHeader);
        };
        let name = &text[..colon];
        ensure!(!name.is_empty(), MultipartError::MalformedHeader);
        ensure!(is_token(name), MultipartError::InvalidHeaderName);

        let value = text[colon + 1..].trim().to_string();
        self.header_lines.push((name.to_string(), value));
        ensure!(
            self.header_lines.len() <= self.limits.max_header_count,
            MultipartError::HeaderCountLimitExceeded
        );
        Ok(())
    }

    /// Streams body bytes up to the next delimiter line.
    ///
    /// The CRLF directly before a delimiter belongs to the delimiter, not
    /// the body. A delimiter followed by CRLF opens the next segment; one
    /// followed by `--` completes the stream; one followed by a bare LF is
    /// rejected; anything else means the match was body data after all.
    fn step_body(&mut self, src: &mut BytesMut) -> Result<Option<MultipartItem>, MultipartError> {
        match self.scanner.find_delimiter(src) {
            Some(idx) => {
                let after = idx + self.scanner.delimiter_len();
                if src.len() < after + 2 {
                    // cannot classify the delimiter yet
                    if idx > 0 {
                        return self.emit_body(src, idx).map(Some);
                    }
                    return Ok(None);
                }
                if idx > 0 {
                    // deliver the body bytes first; the delimiter is
                    // handled on the next step
                    return self.emit_body(src, idx).map(Some);
                }
                match (src[after], src[after + 1]) {
                    (b'\r', b'\n') => {
                        self.check_declared_length()?;
                        src.advance(after + 2);
                        self.enter_header_state();
                        debug!("segment closed");
                        Ok(Some(MultipartItem::SegmentEnd))
                    }
                    (b'-', b'-') => {
                        self.check_declared_length()?;
                        src.advance(after + 2);
                        self.state = State::Epilogue;
                        self.eof_pending = true;
                        self.epilogue_crlf_done = false;
                        debug!(segments = self.segment_count, "terminal delimiter seen");
                        Ok(Some(MultipartItem::SegmentEnd))
                    }
                    (b'\n', _) => Err(MultipartError::InvalidLineBreak),
                    _ => {
                        // a body line that merely starts like a delimiter;
                        // move past its CRLF and keep scanning
                        self.emit_body(src, idx + 2).map(Some)
                    }
                }
            }
            None => {
                let keep = self.scanner.retained_tail();
                if src.len() > keep {
                    let emit = src.len() - keep;
                    return self.emit_body(src, emit).map(Some);
                }
                Ok(None)
            }
        }
    }

    fn emit_body(
        &mut self,
        src: &mut BytesMut,
        count: usize,
    ) -> Result<MultipartItem, MultipartError> {
        let new_size = self.body_size + count as u64;
        if let Some(declared) = self.declared_length {
            ensure!(new_size <= declared, MultipartError::SegmentLengthExceeded);
        }
        ensure!(new_size <= self.limits.max_segment_size, MultipartError::SegmentSizeLimitExceeded);
        self.body_size = new_size;
        let data: Bytes = src.split_to(count).freeze();
        trace!(len = data.len(), "body fragment");
        Ok(MultipartItem::Chunk(data))
    }

    fn check_declared_length(&self) -> Result<(), MultipartError> {
        if let Some(declared) = self.declared_length {
            ensure!(self.body_size == declared, MultipartError::SegmentSizeMismatch);
        }
        Ok(())
    }

    /// Handles everything after the terminal delimiter.
    ///
    /// One CRLF directly after `--boundary--` is part of the close
    /// delimiter line and consumed silently. Bytes beyond that are
    /// epilogue: rejected in strict mode, discarded otherwise.
    fn step_epilogue(&mut self, src: &mut BytesMut) -> Result<Option<MultipartItem>, MultipartError> {
        if self.eof_pending {
            self.eof_pending = false;
            return Ok(Some(MultipartItem::Eof));
        }

        if !self.epilogue_crlf_done {
            if src.is_empty() {
                return Ok(None);
            }
            if src[0] == b'\r' {
                if src.len() < 2 {
                    return Ok(None);
                }
                if src[1] == b'\n' {
                    src.advance(2);
                }
            }
            self.epilogue_crlf_done = true;
        }

        if src.is_empty() {
            return Ok(None);
        }
        ensure!(!self.strict, MultipartError::UnexpectedEpilogue);
        trace!(len = src.len(), "discarding epilogue bytes");
        src.clear();
        Ok(None)
    }

    fn enter_header_state(&mut self) {
        self.state = State::Header;
        self.header_lines.clear();
        self.current_header_size = 0;
    }
}

/// Draining iterator over the events unlocked by one [`PushMultipartParser::parse`] call.
///
/// Yields zero or more events per call. Dropping it early keeps the
/// undecoded bytes buffered for the next call.
#[derive(Debug)]
pub struct Events<'a> {
    parser: &'a mut PushMultipartParser,
}

impl Iterator for Events<'_> {
    type Item = Result<MultipartItem, MultipartError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.parser.pending_error.take() {
            self.parser.failed = true;
            return Some(Err(err));
        }
        if self.parser.failed {
            return None;
        }

        let mut buffer = std::mem::take(&mut self.parser.buffer);
        let result = self.parser.step(&mut buffer);
        self.parser.buffer = buffer;

        match result {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(e) => {
                self.parser.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Implementation of the [`Decoder`] trait over an external buffer.
///
/// This lets the framing parser drive a `FramedRead` directly. The
/// `content_length` ceiling applies to the bytes made visible to the
/// decoder; `decode_eof` applies the end-of-input rules.
impl Decoder for PushMultipartParser {
    type Item = MultipartItem;
    type Error = MultipartError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        ensure!(!self.closed && !self.failed, MultipartError::ParserClosed);
        if let Some(limit) = self.content_length {
            if self.consumed + src.len() as u64 > limit {
                self.failed = true;
                return Err(MultipartError::ContentLengthLimitExceeded);
            }
        }
        self.step(src).inspect_err(|_| self.failed = true)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.closed && self.state == State::Epilogue {
            // a framed stream may poll past completion
            return Ok(None);
        }
        if let Some(item) = self.decode(src)? {
            return Ok(Some(item));
        }
        if self.state == State::Epilogue {
            self.closed = true;
            return Ok(None);
        }
        self.failed = true;
        Err(self.unexpected_end(self.consumed + src.len() as u64))
    }
}

/// Validates a boundary against RFC 2046 section 5.1.1.
fn validate_boundary(boundary: &[u8]) -> Result<(), MultipartError> {
    ensure!(!boundary.is_empty() && boundary.len() <= 70, MultipartError::InvalidBoundary);
    ensure!(
        boundary.iter().all(|&c| c.is_ascii_alphanumeric() || b"'()+_,-./:=? ".contains(&c)),
        MultipartError::InvalidBoundary
    );
    ensure!(boundary.last() != Some(&b' '), MultipartError::InvalidBoundary);
    Ok(())
}
