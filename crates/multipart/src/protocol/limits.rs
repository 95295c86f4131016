/// Defensive ceilings for the framing layer.
///
/// Every field must be chosen by the caller; there is deliberately no
/// `Default` impl. Safe ceilings depend on the deployment (public upload
/// endpoint vs. trusted internal tooling), and silently generous defaults
/// are exactly how multipart decoders become denial-of-service vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserLimits {
    /// Maximum byte length of one logical header, cumulative across folded
    /// continuation lines.
    pub max_header_size: usize,
    /// Maximum number of headers in one segment's header block.
    pub max_header_count: usize,
    /// Maximum number of segments in the whole stream.
    pub max_segment_count: usize,
    /// Maximum body size of one segment in bytes.
    pub max_segment_size: u64,
}

/// Spooling thresholds and budgets for the materialization layer.
///
/// As with [`ParserLimits`], every field is required configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpoolPolicy {
    /// Bytes after which one part's content moves from memory to a
    /// temporary file. A part of exactly this size stays in memory.
    pub spool_limit: usize,
    /// Aggregate cap on bytes held in memory across all parts of one
    /// request.
    pub memory_limit: usize,
    /// Aggregate cap on bytes spilled to disk across all parts of one
    /// request.
    pub disk_limit: u64,
    /// Chunk size used when copying streamed content, and the read size
    /// used when driving a whole stream.
    pub buffer_size: usize,
}
