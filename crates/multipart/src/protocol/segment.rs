use crate::header::parse_options_header;
use crate::protocol::MultipartError;
use crate::ensure;

/// The header block of one `multipart/form-data` segment.
///
/// Headers are kept as an ordered list of `(name, value)` pairs in wire
/// order and addressed case-insensitively. The fields every consumer needs
/// (`name`, `filename`, `content_type`, `charset`, per-segment
/// `content_length`) are derived once at construction, after which the
/// segment is immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartSegment {
    headers: Vec<(String, String)>,
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
    charset: Option<String>,
    content_length: Option<u64>,
}

impl MultipartSegment {
    /// Builds a segment from decoded header lines.
    ///
    /// Validates the Content-Disposition header: it must be present, its
    /// type must be `form-data`, and in strict mode the `name` option is
    /// mandatory (lenient mode defaults it to the empty string). The
    /// `filename` option, when present, arrives already unquoted and
    /// stripped of any client-supplied directory components.
    pub(crate) fn new(headers: Vec<(String, String)>, strict: bool) -> Result<Self, MultipartError> {
        let disposition = lookup(&headers, "Content-Disposition").ok_or(MultipartError::MissingDisposition)?;
        let (kind, options) = parse_options_header(disposition);
        ensure!(kind == "form-data", MultipartError::WrongDispositionType);

        let name = match option_value(&options, "name") {
            Some(value) => value.to_string(),
            None if strict => return Err(MultipartError::MissingDispositionName),
            None => String::new(),
        };
        let filename = option_value(&options, "filename").map(str::to_string);

        let (content_type, charset) = match lookup(&headers, "Content-Type") {
            Some(value) => {
                let (primary, options) = parse_options_header(value);
                let charset = option_value(&options, "charset").map(str::to_string);
                (Some(primary), charset)
            }
            None => (None, None),
        };

        let content_length = match lookup(&headers, "Content-Length") {
            Some(value) => {
                Some(value.trim().parse::<u64>().map_err(|_| MultipartError::MalformedHeader)?)
            }
            None => None,
        };

        Ok(Self { headers, name, filename, content_type, charset, content_length })
    }

    /// The Content-Disposition `name` option (the form field name).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The Content-Disposition `filename` option, reduced to its final path
    /// component.
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// The primary token of the Content-Type header, lowercased.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// The `charset` option of the Content-Type header, if declared.
    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    /// The segment's own Content-Length header, if declared.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Returns true if this segment is a file upload (has a filename).
    pub fn is_file(&self) -> bool {
        self.filename.is_some()
    }

    /// First value of the given header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        lookup(&self.headers, name)
    }

    /// Every value of the given header, in wire order.
    pub fn header_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.headers.iter().filter(move |(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    /// All headers in wire order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}

fn lookup<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
}

fn option_value<'a>(options: &'a [(String, String)], key: &str) -> Option<&'a str> {
    options.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}
