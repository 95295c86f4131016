//! Header value grammar for `multipart/form-data`.
//!
//! Implements the quoted-string parameter grammar used by the
//! Content-Disposition and Content-Type headers (RFC 2388 / RFC 6266):
//! quoting and unquoting of parameter values, splitting a header value into
//! its primary token plus an ordered parameter list, and token validation
//! for header names.
//!
//! A client-declared `filename` is untrusted input: unquoting with
//! `is_filename` set reduces Windows drive paths (`C:\dir\file`), UNC paths
//! (`\\host\share\file`) and POSIX paths (`dir/file`) to their final
//! component, so a hostile client can neither leak nor dictate directory
//! structure.

use std::borrow::Cow;

/// Returns true for RFC 7230 token characters, the only bytes allowed in a
/// header name.
pub fn is_token_char(c: u8) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            b'!' | b'#'
                | b'$'
                | b'%'
                | b'&'
                | b'\''
                | b'*'
                | b'+'
                | b'-'
                | b'.'
                | b'^'
                | b'_'
                | b'`'
                | b'|'
                | b'~'
        )
}

/// Returns true if the string is a non-empty RFC 7230 token.
pub fn is_token(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(is_token_char)
}

fn is_tspecial(c: char) -> bool {
    matches!(
        c,
        '(' | ')' | '<' | '>' | '@' | ',' | ';' | ':' | '\\' | '"' | '/' | '[' | ']' | '?' | '='
            | '{'
            | '}'
            | ' '
            | '\t'
    )
}

/// Quotes a header parameter value if necessary.
///
/// Values containing tspecial characters are wrapped in double quotes with
/// backslashes and internal quotes escaped; plain token values are returned
/// unchanged (borrowed).
pub fn header_quote(value: &str) -> Cow<'_, str> {
    if !value.chars().any(is_tspecial) {
        return Cow::Borrowed(value);
    }
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    Cow::Owned(format!("\"{escaped}\""))
}

/// Unquotes a header parameter value, reversing [`header_quote`].
///
/// With `is_filename` set, any directory-path prefix the client embedded is
/// stripped and only the final path component is kept:
///
/// ```
/// use micro_multipart::header::header_unquote;
///
/// assert_eq!(header_unquote(r#""C:\test\bla.txt""#, true), "bla.txt");
/// assert_eq!(header_unquote(r#""\\test\bla.txt""#, true), "bla.txt");
/// assert_eq!(header_unquote(r#""bla.txt""#, true), "bla.txt");
/// ```
pub fn header_unquote(value: &str, is_filename: bool) -> String {
    let quoted = value.len() >= 2 && value.starts_with('"') && value.ends_with('"');
    let inner = if quoted { &value[1..value.len() - 1] } else { value };

    if is_filename && is_windows_path(inner) {
        // Full Windows or UNC path: backslashes are path separators here,
        // not escapes, and only the final component survives.
        return inner.rsplit('\\').next().unwrap_or_default().to_string();
    }

    let mut out =
        if quoted { inner.replace("\\\\", "\\").replace("\\\"", "\"") } else { inner.to_string() };
    if is_filename {
        if let Some(idx) = out.rfind('/') {
            out.drain(..=idx);
        }
    }
    out
}

fn is_windows_path(value: &str) -> bool {
    let bytes = value.as_bytes();
    value.starts_with("\\\\")
        || (bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'\\')
}

/// Splits a header value into its primary token and an ordered parameter
/// list.
///
/// The primary token is lowercased and trimmed. Parameter keys are
/// lowercased; values are unquoted via [`header_unquote`], with filename
/// sanitization applied to the `filename` key. Quoted values may contain
/// semicolons and escaped characters. Parameters without a `=` are skipped.
///
/// ```
/// use micro_multipart::header::parse_options_header;
///
/// let (primary, options) = parse_options_header(r#"form-data; name="upload"; filename="cat.png""#);
/// assert_eq!(primary, "form-data");
/// assert_eq!(options[0], ("name".to_string(), "upload".to_string()));
/// assert_eq!(options[1], ("filename".to_string(), "cat.png".to_string()));
/// ```
pub fn parse_options_header(header: &str) -> (String, Vec<(String, String)>) {
    let (primary, mut rest) = match header.find(';') {
        Some(idx) => (&header[..idx], &header[idx + 1..]),
        None => (header, ""),
    };
    let primary = primary.trim().to_ascii_lowercase();

    let mut options = Vec::new();
    loop {
        rest = rest.trim_start_matches([' ', '\t', ';']);
        if rest.is_empty() {
            break;
        }

        let key = match rest.find(['=', ';']) {
            None => break,
            Some(idx) if rest.as_bytes()[idx] == b';' => {
                // parameter without a value
                rest = &rest[idx + 1..];
                continue;
            }
            Some(idx) => {
                let key = rest[..idx].trim().to_ascii_lowercase();
                rest = rest[idx + 1..].trim_start();
                key
            }
        };

        let (raw, remainder) = if rest.starts_with('"') {
            match find_closing_quote(rest) {
                Some(end) => (&rest[..=end], &rest[end + 1..]),
                // unterminated quoted-string: take everything
                None => (rest, ""),
            }
        } else {
            match rest.find(';') {
                Some(idx) => (rest[..idx].trim_end(), &rest[idx..]),
                None => (rest.trim_end(), ""),
            }
        };

        if !key.is_empty() {
            let value = header_unquote(raw, key == "filename");
            options.push((key, value));
        }
        rest = remainder;
    }

    (primary, options)
}

/// Position of the quote closing a quoted-string starting at byte 0,
/// honoring backslash escapes.
fn find_closing_quote(value: &str) -> Option<usize> {
    let bytes = value.as_bytes();
    let mut idx = 1;
    while idx < bytes.len() {
        match bytes[idx] {
            b'\\' => idx += 2,
            b'"' => return Some(idx),
            _ => idx += 1,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_validation() {
        assert!(is_token("Content-Disposition"));
        assert!(is_token("x-custom_header.1~"));
        assert!(!is_token(""));
        assert!(!is_token("bad header"));
        assert!(!is_token("bad\x01header"));
        assert!(!is_token("naïve"));
    }

    #[test]
    fn quote_plain_values_unchanged() {
        assert!(matches!(header_quote("simple-token"), Cow::Borrowed("simple-token")));
    }

    #[test]
    fn quote_escapes_specials() {
        assert_eq!(header_quote("hello world"), "\"hello world\"");
        assert_eq!(header_quote(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(header_quote(r"back\slash"), r#""back\\slash""#);
    }

    #[test]
    fn quote_unquote_round_trip() {
        for value in ["plain", "with space", r#"with "quotes""#, r"with \ backslash", "semi;colon"] {
            let quoted = header_quote(value);
            assert_eq!(header_unquote(&quoted, false), value, "round trip of {value:?}");
        }
    }

    #[test]
    fn unquote_filename_strips_directories() {
        assert_eq!(header_unquote(r#""C:\test\bla.txt""#, true), "bla.txt");
        assert_eq!(header_unquote(r#""\\test\bla.txt""#, true), "bla.txt");
        assert_eq!(header_unquote(r#""bla.txt""#, true), "bla.txt");
        assert_eq!(header_unquote(r#""/etc/passwd""#, true), "passwd");
        assert_eq!(header_unquote("relative/path/name.tar.gz", true), "name.tar.gz");
    }

    #[test]
    fn unquote_without_filename_keeps_paths() {
        assert_eq!(header_unquote(r#""/etc/passwd""#, false), "/etc/passwd");
    }

    #[test]
    fn options_header_basic() {
        let (primary, options) = parse_options_header("text/plain");
        assert_eq!(primary, "text/plain");
        assert!(options.is_empty());

        let (primary, options) = parse_options_header("Text/Plain; charset=ISO-8859-1");
        assert_eq!(primary, "text/plain");
        assert_eq!(options, vec![("charset".to_string(), "ISO-8859-1".to_string())]);
    }

    #[test]
    fn options_header_quoted_semicolons() {
        let (primary, options) =
            parse_options_header(r#"form-data; name="a;b"; filename="weird;name.txt""#);
        assert_eq!(primary, "form-data");
        assert_eq!(options[0], ("name".to_string(), "a;b".to_string()));
        assert_eq!(options[1], ("filename".to_string(), "weird;name.txt".to_string()));
    }

    #[test]
    fn options_header_preserves_order_and_lowercases_keys() {
        let (_, options) = parse_options_header(r#"form-data; NAME="first"; Filename="second.bin""#);
        assert_eq!(options[0], ("name".to_string(), "first".to_string()));
        assert_eq!(options[1], ("filename".to_string(), "second.bin".to_string()));
    }

    #[test]
    fn options_header_skips_valueless_parameters() {
        let (_, options) = parse_options_header("form-data; secure; name=field");
        assert_eq!(options, vec![("name".to_string(), "field".to_string())]);
    }
}
