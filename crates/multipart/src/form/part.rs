use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;

use encoding_rs::Encoding;

use crate::protocol::{MultipartError, MultipartSegment};

/// Backing store of one part's body: an in-memory buffer up to the spool
/// threshold, an anonymous temporary file beyond it. Never both at once.
pub(crate) enum PartBody {
    Buffered(Cursor<Vec<u8>>),
    Spooled(File),
}

impl fmt::Debug for PartBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartBody::Buffered(cursor) => {
                f.debug_tuple("Buffered").field(&cursor.get_ref().len()).finish()
            }
            PartBody::Spooled(_) => f.debug_tuple("Spooled").finish(),
        }
    }
}

/// One materialized `multipart/form-data` part.
///
/// The body is randomly re-readable through the [`Read`] and [`Seek`]
/// impls. The read cursor sits wherever the last operation left it — after
/// materialization that is the end of the body, and it is never rewound
/// automatically: callers wanting to re-read from the start must seek
/// explicitly. This mirrors the fact that a part is a streaming object, not
/// a buffer snapshot.
///
/// A spilled part owns its temporary file; the file is anonymous
/// (pre-unlinked), so its disk space is released when the part is dropped,
/// on every exit path.
#[derive(Debug)]
pub struct MultipartPart {
    segment: MultipartSegment,
    body: PartBody,
    size: u64,
    buffer_size: usize,
    default_charset: &'static Encoding,
}

impl MultipartPart {
    pub(crate) fn new(
        segment: MultipartSegment,
        buffer_size: usize,
        default_charset: &'static Encoding,
    ) -> Self {
        Self {
            segment,
            body: PartBody::Buffered(Cursor::new(Vec::new())),
            size: 0,
            buffer_size,
            default_charset,
        }
    }

    /// Appends to the in-memory buffer. Caller has verified the spool
    /// threshold and the memory budget.
    pub(crate) fn append_buffered(&mut self, data: &[u8]) {
        match &mut self.body {
            PartBody::Buffered(cursor) => {
                cursor.get_mut().extend_from_slice(data);
                let len = cursor.get_ref().len() as u64;
                cursor.set_position(len);
            }
            PartBody::Spooled(_) => unreachable!("append_buffered on a spooled part"),
        }
        self.size += data.len() as u64;
    }

    /// Moves the buffered content into a fresh anonymous temporary file and
    /// returns the number of bytes freed from memory. One-way: a part never
    /// moves back to memory.
    pub(crate) fn spill(&mut self) -> io::Result<usize> {
        let PartBody::Buffered(cursor) = &mut self.body else {
            unreachable!("spill on a spooled part");
        };
        let buffered = std::mem::take(cursor).into_inner();
        let mut file = tempfile::tempfile()?;
        file.write_all(&buffered)?;
        self.body = PartBody::Spooled(file);
        Ok(buffered.len())
    }

    /// Appends directly to the temporary file. Caller has verified the
    /// disk budget.
    pub(crate) fn append_spooled(&mut self, data: &[u8]) -> io::Result<()> {
        match &mut self.body {
            PartBody::Spooled(file) => file.write_all(data)?,
            PartBody::Buffered(_) => unreachable!("append_spooled on a buffered part"),
        }
        self.size += data.len() as u64;
        Ok(())
    }

    pub(crate) fn buffered_len(&self) -> usize {
        match &self.body {
            PartBody::Buffered(cursor) => cursor.get_ref().len(),
            PartBody::Spooled(_) => 0,
        }
    }

    /// The form field name.
    pub fn name(&self) -> &str {
        self.segment.name()
    }

    /// The client-declared filename, reduced to its final path component.
    pub fn filename(&self) -> Option<&str> {
        self.segment.filename()
    }

    /// The part's content type, if declared.
    pub fn content_type(&self) -> Option<&str> {
        self.segment.content_type()
    }

    /// The `charset` parameter of the part's Content-Type, if declared.
    pub fn charset(&self) -> Option<&str> {
        self.segment.charset()
    }

    /// All headers of the underlying segment, in wire order.
    pub fn headers(&self) -> &[(String, String)] {
        self.segment.headers()
    }

    /// The underlying segment.
    pub fn segment(&self) -> &MultipartSegment {
        &self.segment
    }

    /// Returns true if this part is a file upload.
    pub fn is_file(&self) -> bool {
        self.segment.is_file()
    }

    /// Body size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns true while the body is still memory-resident.
    pub fn is_buffered(&self) -> bool {
        matches!(self.body, PartBody::Buffered(_))
    }

    /// Materializes the full content as text.
    ///
    /// Decodes using the part's declared charset, falling back to the
    /// configured default for missing or unknown labels. Decoding is
    /// strict: undecodable content is an error, never replaced. The read
    /// cursor is restored afterwards.
    pub fn value(&mut self) -> Result<String, MultipartError> {
        let position = self.stream_position()?;
        self.seek(SeekFrom::Start(0))?;
        let mut raw = Vec::with_capacity(usize::try_from(self.size).unwrap_or(0));
        let read_result = self.read_to_end(&mut raw);
        self.seek(SeekFrom::Start(position))?;
        read_result?;

        let encoding = self
            .charset()
            .and_then(|label| Encoding::for_label(label.as_bytes()))
            .unwrap_or(self.default_charset);
        let decoded = encoding.decode_without_bom_handling_and_without_replacement(&raw);
        match decoded {
            Some(text) => Ok(text.into_owned()),
            None => Err(MultipartError::ValueDecodeFailed),
        }
    }

    /// Streams the remaining unread content to `path` in
    /// `buffer_size`-sized chunks, restoring the read cursor afterwards.
    /// Returns the number of bytes written.
    pub fn save_as<P: AsRef<Path>>(&mut self, path: P) -> Result<u64, MultipartError> {
        let position = self.stream_position()?;
        let mut target = File::create(path)?;
        let mut chunk = vec![0u8; self.buffer_size.max(1)];
        let mut written = 0u64;
        let result = loop {
            match self.read(&mut chunk) {
                Ok(0) => break Ok(()),
                Ok(n) => {
                    if let Err(e) = target.write_all(&chunk[..n]) {
                        break Err(e);
                    }
                    written += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => break Err(e),
            }
        };
        self.seek(SeekFrom::Start(position))?;
        result?;
        Ok(written)
    }
}

impl Read for MultipartPart {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.body {
            PartBody::Buffered(cursor) => cursor.read(buf),
            PartBody::Spooled(file) => file.read(buf),
        }
    }
}

impl Seek for MultipartPart {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match &mut self.body {
            PartBody::Buffered(cursor) => cursor.seek(pos),
            PartBody::Spooled(file) => file.seek(pos),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::UTF_8;

    fn segment(extra: &[(&str, &str)]) -> MultipartSegment {
        let mut headers =
            vec![("Content-Disposition".to_string(), r#"form-data; name="field""#.to_string())];
        for (name, value) in extra {
            headers.push(((*name).to_string(), (*value).to_string()));
        }
        MultipartSegment::new(headers, true).unwrap()
    }

    fn buffered_part(content: &[u8]) -> MultipartPart {
        let mut part = MultipartPart::new(segment(&[]), 16, UTF_8);
        part.append_buffered(content);
        part
    }

    #[test]
    fn cursor_is_not_rewound_after_writes() {
        let mut part = buffered_part(b"hello");
        let mut rest = String::new();
        part.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "", "cursor sits at the end after materialization");

        part.seek(SeekFrom::Start(0)).unwrap();
        let mut all = String::new();
        part.read_to_string(&mut all).unwrap();
        assert_eq!(all, "hello");
    }

    #[test]
    fn value_decodes_and_restores_cursor() {
        let mut part = buffered_part(b"hello world");
        part.seek(SeekFrom::Start(6)).unwrap();
        assert_eq!(part.value().unwrap(), "hello world");
        // cursor preserved for subsequent reads
        let mut rest = String::new();
        part.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "world");
    }

    #[test]
    fn value_uses_declared_charset() {
        let mut part = MultipartPart::new(
            segment(&[("Content-Type", "text/plain; charset=ISO-8859-1")]),
            16,
            UTF_8,
        );
        part.append_buffered(b"caf\xe9");
        assert_eq!(part.value().unwrap(), "café");
    }

    #[test]
    fn value_falls_back_to_default_for_unknown_charset() {
        let mut part = MultipartPart::new(
            segment(&[("Content-Type", "text/plain; charset=no-such-charset")]),
            16,
            UTF_8,
        );
        part.append_buffered("grüße".as_bytes());
        assert_eq!(part.value().unwrap(), "grüße");
    }

    #[test]
    fn undecodable_value_is_an_error() {
        let mut part = buffered_part(b"\xff\xfe broken");
        let err = part.value().unwrap_err();
        assert_eq!(err.to_string(), "Segment value failed to decode");
    }

    #[test]
    fn save_as_streams_remaining_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.bin");

        let mut part = buffered_part(b"0123456789");
        part.seek(SeekFrom::Start(4)).unwrap();
        let written = part.save_as(&path).unwrap();
        assert_eq!(written, 6);
        assert_eq!(std::fs::read(&path).unwrap(), b"456789");

        // the read cursor is back where it was
        let mut rest = Vec::new();
        part.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"456789");
    }

    #[test]
    fn spill_moves_content_to_disk() {
        let mut part = buffered_part(b"buffered bytes");
        assert!(part.is_buffered());
        assert_eq!(part.buffered_len(), 14);

        let freed = part.spill().unwrap();
        assert_eq!(freed, 14);
        assert!(!part.is_buffered());
        assert_eq!(part.buffered_len(), 0);
        part.append_spooled(b" and more").unwrap();
        assert_eq!(part.size(), 23);

        part.seek(SeekFrom::Start(0)).unwrap();
        let mut all = String::new();
        part.read_to_string(&mut all).unwrap();
        assert_eq!(all, "buffered bytes and more");
    }

    #[test]
    fn accessors_delegate_to_segment() {
        let part = MultipartPart::new(
            segment(&[("Content-Type", "text/plain; charset=utf-8")]),
            16,
            UTF_8,
        );
        assert_eq!(part.name(), "field");
        assert_eq!(part.filename(), None);
        assert!(!part.is_file());
        assert_eq!(part.content_type(), Some("text/plain"));
        assert_eq!(part.charset(), Some("utf-8"));
        assert_eq!(part.size(), 0);
    }
}
