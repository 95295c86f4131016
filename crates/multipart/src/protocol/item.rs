use bytes::Bytes;

use crate::protocol::MultipartSegment;

/// Represents one event in the multipart framing stream.
///
/// The framing parser yields, per segment and in this order: one
/// [`Segment`](MultipartItem::Segment), zero or more non-empty
/// [`Chunk`](MultipartItem::Chunk)s, then one
/// [`SegmentEnd`](MultipartItem::SegmentEnd). After the final segment a
/// single [`Eof`](MultipartItem::Eof) marks the end of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartItem {
    /// A segment's header block is complete; its body follows.
    Segment(MultipartSegment),
    /// A non-empty fragment of the current segment's body. Fragments may be
    /// re-chunked arbitrarily relative to the input chunking.
    Chunk(Bytes),
    /// The current segment's body is complete.
    SegmentEnd,
    /// The terminal delimiter was seen; the stream is complete.
    Eof,
}

impl MultipartItem {
    /// Returns true if this item opens a new segment.
    #[inline]
    pub fn is_segment(&self) -> bool {
        matches!(self, MultipartItem::Segment(_))
    }

    /// Returns true if this item carries body data.
    #[inline]
    pub fn is_chunk(&self) -> bool {
        matches!(self, MultipartItem::Chunk(_))
    }

    /// Returns true if this item closes the current segment.
    #[inline]
    pub fn is_segment_end(&self) -> bool {
        matches!(self, MultipartItem::SegmentEnd)
    }

    /// Returns true if this item marks the end of the whole stream.
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, MultipartItem::Eof)
    }

    /// Returns a reference to the contained bytes if this is a `Chunk`.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            MultipartItem::Chunk(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Consumes the item and returns the contained bytes if this is a `Chunk`.
    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            MultipartItem::Chunk(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Consumes the item and returns the segment if this is a `Segment`.
    pub fn into_segment(self) -> Option<MultipartSegment> {
        match self {
            MultipartItem::Segment(segment) => Some(segment),
            _ => None,
        }
    }
}
