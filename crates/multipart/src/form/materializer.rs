use encoding_rs::{Encoding, UTF_8};
use tracing::{debug, trace};

use crate::form::MultipartPart;
use crate::protocol::{MultipartError, MultipartItem, SpoolPolicy};
use crate::ensure;

/// Turns framing events into resource-bounded [`MultipartPart`]s.
///
/// One materializer serves one parsing session and owns that session's
/// aggregate budgets: the total bytes buffered in memory and the total
/// bytes spilled to disk, across all parts. Both budgets are checked
/// before every write, so a single oversized part cannot exhaust memory or
/// disk before its limit triggers.
///
/// A part's body stays in memory while its own size is within
/// [`SpoolPolicy::spool_limit`]; the first write that would cross the
/// threshold copies the buffer to an anonymous temporary file exactly once,
/// and every later write for that part takes the direct file path with no
/// threshold checks.
#[derive(Debug)]
pub struct PartMaterializer {
    policy: SpoolPolicy,
    default_charset: &'static Encoding,
    memory_used: usize,
    disk_used: u64,
    current: Option<MultipartPart>,
}

impl PartMaterializer {
    pub fn new(policy: SpoolPolicy) -> Self {
        Self { policy, default_charset: UTF_8, memory_used: 0, disk_used: 0, current: None }
    }

    /// Sets the default encoding for part values whose Content-Type
    /// declares no usable charset. Defaults to UTF-8.
    pub fn with_charset(mut self, charset: &'static Encoding) -> Self {
        self.default_charset = charset;
        self
    }

    /// Total bytes currently buffered in memory across all parts.
    pub fn memory_used(&self) -> usize {
        self.memory_used
    }

    /// Total bytes spilled to disk across all parts.
    pub fn disk_used(&self) -> u64 {
        self.disk_used
    }

    /// Feeds one framing event; returns the completed part on
    /// [`MultipartItem::SegmentEnd`].
    pub fn materialize(
        &mut self,
        item: MultipartItem,
    ) -> Result<Option<MultipartPart>, MultipartError> {
        match item {
            MultipartItem::Segment(segment) => {
                debug_assert!(self.current.is_none(), "segment opened while one is in flight");
                self.current = Some(MultipartPart::new(
                    segment,
                    self.policy.buffer_size,
                    self.default_charset,
                ));
                Ok(None)
            }
            MultipartItem::Chunk(data) => {
                self.write(&data)?;
                Ok(None)
            }
            MultipartItem::SegmentEnd => {
                let part = self.current.take();
                debug_assert!(part.is_some(), "segment closed while none is in flight");
                if let Some(part) = &part {
                    debug!(
                        name = part.name(),
                        size = part.size(),
                        buffered = part.is_buffered(),
                        "part complete"
                    );
                }
                Ok(part)
            }
            MultipartItem::Eof => Ok(None),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<(), MultipartError> {
        let Some(part) = self.current.as_mut() else {
            debug_assert!(false, "body data while no segment is in flight");
            return Ok(());
        };

        if part.is_buffered() {
            let projected = part.size() + data.len() as u64;
            if projected <= self.policy.spool_limit as u64 {
                ensure!(
                    self.memory_used + data.len() <= self.policy.memory_limit,
                    MultipartError::MemoryLimitReached
                );
                part.append_buffered(data);
                self.memory_used += data.len();
                return Ok(());
            }

            // the write would cross the spool threshold: promote to disk
            let buffered = part.buffered_len();
            ensure!(
                self.disk_used + buffered as u64 <= self.policy.disk_limit,
                MultipartError::DiskLimitReached
            );
            let freed = part.spill()?;
            self.memory_used -= freed;
            self.disk_used += freed as u64;
            trace!(name = part.name(), buffered = freed, "part promoted to disk");
        }

        ensure!(
            self.disk_used + data.len() as u64 <= self.policy.disk_limit,
            MultipartError::DiskLimitReached
        );
        part.append_spooled(data)?;
        self.disk_used += data.len() as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MultipartSegment;
    use bytes::Bytes;

    fn policy() -> SpoolPolicy {
        SpoolPolicy { spool_limit: 8, memory_limit: 32, disk_limit: 64, buffer_size: 4 }
    }

    fn segment(name: &str) -> MultipartSegment {
        let headers = vec![(
            "Content-Disposition".to_string(),
            format!(r#"form-data; name="{name}""#),
        )];
        MultipartSegment::new(headers, true).unwrap()
    }

    fn feed(
        materializer: &mut PartMaterializer,
        name: &str,
        chunks: &[&[u8]],
    ) -> Result<MultipartPart, MultipartError> {
        materializer.materialize(MultipartItem::Segment(segment(name)))?;
        for chunk in chunks {
            materializer.materialize(MultipartItem::Chunk(Bytes::copy_from_slice(chunk)))?;
        }
        Ok(materializer.materialize(MultipartItem::SegmentEnd)?.expect("completed part"))
    }

    #[test]
    fn part_at_exactly_spool_limit_stays_in_memory() {
        let mut materializer = PartMaterializer::new(policy());
        let part = feed(&mut materializer, "a", &[b"12345678"]).unwrap();
        assert!(part.is_buffered());
        assert_eq!(part.size(), 8);
        assert_eq!(materializer.memory_used(), 8);
        assert_eq!(materializer.disk_used(), 0);
    }

    #[test]
    fn one_byte_over_spool_limit_spills() {
        let mut materializer = PartMaterializer::new(policy());
        let part = feed(&mut materializer, "a", &[b"12345678", b"9"]).unwrap();
        assert!(!part.is_buffered());
        assert_eq!(part.size(), 9);
        // the whole part moved to disk, freeing its memory
        assert_eq!(materializer.memory_used(), 0);
        assert_eq!(materializer.disk_used(), 9);
    }

    #[test]
    fn spilled_content_reads_back() {
        use std::io::{Read, Seek, SeekFrom};

        let mut materializer = PartMaterializer::new(policy());
        let mut part =
            feed(&mut materializer, "a", &[b"0123", b"4567", b"89ab", b"cdef"]).unwrap();
        assert!(!part.is_buffered());

        part.seek(SeekFrom::Start(0)).unwrap();
        let mut all = String::new();
        part.read_to_string(&mut all).unwrap();
        assert_eq!(all, "0123456789abcdef");
    }

    #[test]
    fn memory_budget_is_aggregate_across_parts() {
        let mut materializer = PartMaterializer::new(policy());
        // four buffered parts of 8 bytes each fill the 32-byte budget
        for name in ["a", "b", "c", "d"] {
            let part = feed(&mut materializer, name, &[b"12345678"]).unwrap();
            assert!(part.is_buffered());
        }
        assert_eq!(materializer.memory_used(), 32);

        materializer.materialize(MultipartItem::Segment(segment("e"))).unwrap();
        let err = materializer
            .materialize(MultipartItem::Chunk(Bytes::from_static(b"x")))
            .unwrap_err();
        assert_eq!(err.to_string(), "Memory limit reached");
    }

    #[test]
    fn disk_budget_is_enforced_incrementally() {
        let mut materializer = PartMaterializer::new(policy());
        // 64 bytes of disk budget; a 65-byte part must fail mid-stream
        materializer.materialize(MultipartItem::Segment(segment("big"))).unwrap();
        let mut failed = None;
        for _ in 0..13 {
            match materializer.materialize(MultipartItem::Chunk(Bytes::from_static(b"aaaaa"))) {
                Ok(_) => {}
                Err(e) => {
                    failed = Some(e);
                    break;
                }
            }
        }
        assert_eq!(failed.expect("disk limit must trigger").to_string(), "Disk limit reached");
        assert!(materializer.disk_used() <= 64);
    }

    #[test]
    fn eof_produces_nothing() {
        let mut materializer = PartMaterializer::new(policy());
        assert!(materializer.materialize(MultipartItem::Eof).unwrap().is_none());
    }
}
