use std::io::{self, Read};

use encoding_rs::{Encoding, UTF_8};
use tracing::debug;

use crate::codec::PushMultipartParser;
use crate::form::{MultipartPart, PartMaterializer};
use crate::protocol::{MultipartError, ParserLimits, SpoolPolicy};

/// Configuration for a whole-stream decode.
///
/// The limit bundles are required; the remaining knobs default to the
/// lenient, UTF-8 configuration via [`MultipartConfig::new`].
#[derive(Debug, Clone, Copy)]
pub struct MultipartConfig {
    /// Framing-layer ceilings.
    pub limits: ParserLimits,
    /// Materialization thresholds and budgets.
    pub policy: SpoolPolicy,
    /// Pedantic RFC conformance versus lenient real-world tolerance.
    pub strict: bool,
    /// Exact byte count of the whole body, when known in advance.
    pub content_length: Option<u64>,
    /// Encoding for segment header bytes.
    pub header_charset: &'static Encoding,
    /// Default encoding for part values without a declared charset.
    pub charset: &'static Encoding,
}

impl MultipartConfig {
    pub fn new(limits: ParserLimits, policy: SpoolPolicy) -> Self {
        Self {
            limits,
            policy,
            strict: false,
            content_length: None,
            header_charset: UTF_8,
            charset: UTF_8,
        }
    }
}

/// Decodes a whole `multipart/form-data` body into a part collection.
///
/// Drives [`PushMultipartParser`] and [`PartMaterializer`] over a byte
/// source, then exposes the completed parts by field name in document
/// order. Each instance consumes exactly one body once.
///
/// Dropping the collection drops every part, which removes the temporary
/// files of spilled parts.
///
/// # Example
///
/// ```
/// use std::io::Cursor;
/// use micro_multipart::form::{MultipartConfig, MultipartParser};
/// use micro_multipart::protocol::{ParserLimits, SpoolPolicy};
///
/// let body = b"--frontier\r\n\
///     Content-Disposition: form-data; name=\"greeting\"\r\n\
///     \r\n\
///     hello\r\n\
///     --frontier--\r\n";
///
/// let limits = ParserLimits {
///     max_header_size: 4096,
///     max_header_count: 8,
///     max_segment_count: 20,
///     max_segment_size: 1024 * 1024,
/// };
/// let policy = SpoolPolicy {
///     spool_limit: 64 * 1024,
///     memory_limit: 1024 * 1024,
///     disk_limit: 16 * 1024 * 1024,
///     buffer_size: 8 * 1024,
/// };
///
/// let config = MultipartConfig::new(limits, policy);
/// let mut form = MultipartParser::parse(Cursor::new(&body[..]), "frontier", config).unwrap();
/// let part = form.get_mut("greeting").unwrap();
/// assert_eq!(part.value().unwrap(), "hello");
/// ```
#[derive(Debug)]
pub struct MultipartParser {
    parts: Vec<MultipartPart>,
}

impl MultipartParser {
    /// Reads `source` to the end and decodes every part.
    ///
    /// The boundary comes from the `boundary` parameter of the request's
    /// Content-Type header. Fails on the first framing, limit or io
    /// violation; parts materialized before the failure are dropped,
    /// releasing any temporary files.
    pub fn parse<R: Read>(
        mut source: R,
        boundary: impl AsRef<[u8]>,
        config: MultipartConfig,
    ) -> Result<Self, MultipartError> {
        let mut parser = PushMultipartParser::new(boundary, config.limits)
            .map(|parser| parser.strict(config.strict).with_header_charset(config.header_charset))?;
        if let Some(content_length) = config.content_length {
            parser = parser.with_content_length(content_length);
        }
        let mut materializer = PartMaterializer::new(config.policy).with_charset(config.charset);

        let mut parts = Vec::new();
        let mut chunk = vec![0u8; config.policy.buffer_size.max(1)];
        loop {
            let n = match source.read(&mut chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(MultipartError::io(e)),
            };
            for item in parser.parse(&chunk[..n]) {
                if let Some(part) = materializer.materialize(item?)? {
                    parts.push(part);
                }
            }
            if n == 0 {
                break;
            }
        }

        debug!(parts = parts.len(), "multipart body decoded");
        Ok(Self { parts })
    }

    /// First part with the given field name, if any. Field names are
    /// matched case-sensitively, unlike header names.
    pub fn get(&self, name: &str) -> Option<&MultipartPart> {
        self.parts.iter().find(|part| part.name() == name)
    }

    /// Mutable access to the first part with the given field name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut MultipartPart> {
        self.parts.iter_mut().find(|part| part.name() == name)
    }

    /// Every part with the given field name, in document order.
    pub fn get_all(&self, name: &str) -> Vec<&MultipartPart> {
        self.parts.iter().filter(|part| part.name() == name).collect()
    }

    /// All parts in document order.
    pub fn iter(&self) -> std::slice::Iter<'_, MultipartPart> {
        self.parts.iter()
    }

    /// Mutable iteration over all parts in document order.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, MultipartPart> {
        self.parts.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Consumes the collection, returning the parts in document order.
    pub fn into_parts(self) -> Vec<MultipartPart> {
        self.parts
    }
}

impl IntoIterator for MultipartParser {
    type Item = MultipartPart;
    type IntoIter = std::vec::IntoIter<MultipartPart>;

    fn into_iter(self) -> Self::IntoIter {
        self.parts.into_iter()
    }
}

impl<'a> IntoIterator for &'a MultipartParser {
    type Item = &'a MultipartPart;
    type IntoIter = std::slice::Iter<'a, MultipartPart>;

    fn into_iter(self) -> Self::IntoIter {
        self.parts.iter()
    }
}
