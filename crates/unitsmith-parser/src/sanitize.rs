//! Clean decompiler output before structural parsing.
//!
//! A single lexical pass over the text that knows about string, text-block and
//! character literals, so comment-like substrings inside literals are never
//! touched. The pass:
//!
//! - removes block comments (keeping their line breaks),
//! - removes line comments that do not start at column 0,
//! - replaces synthetic class references used as a type (`Outer$1 x`,
//!   `(Outer$1)`, `Outer$1,`) with [`SYNTHETIC_PLACEHOLDER`].

use regex::Regex;
use std::sync::OnceLock;

/// Replacement for synthetic class references; valid as a type and as a name.
pub const SYNTHETIC_PLACEHOLDER: &str = "Object";

/// Strip the decompiler banner, then scrub comments and synthetic references.
pub fn sanitize(source: &str) -> String {
    scrub(strip_decompiler_header(source))
}

/// Drop leading `Analysing ...` progress lines and the leading banner comment.
pub fn strip_decompiler_header(source: &str) -> &str {
    static HEADER_RE: OnceLock<Regex> = OnceLock::new();
    let header_re = HEADER_RE.get_or_init(|| {
        Regex::new(r"(?s)\A(?:Analysing[^\n]*\n)*\s*(?:/\*.*?\*/\s*)?").unwrap()
    });
    match header_re.find(source) {
        Some(m) => &source[m.end()..],
        None => source,
    }
}

fn scrub(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = String::with_capacity(source.len());
    // Start of the pending verbatim run not yet copied to `out`.
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' if bytes[i..].starts_with(b"\"\"\"") => i = skip_text_block(bytes, i),
            b'"' => i = skip_quoted(bytes, i, b'"'),
            b'\'' => i = skip_quoted(bytes, i, b'\''),
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = find(bytes, i + 2, b"*/").map_or(bytes.len(), |p| p + 2);
                out.push_str(&source[copied..i]);
                out.push(' ');
                let newlines = bytes[i..end].iter().filter(|&&b| b == b'\n').count();
                out.extend(std::iter::repeat_n('\n', newlines));
                copied = end;
                i = end;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                let end = find(bytes, i, b"\n").unwrap_or(bytes.len());
                let at_line_start = i == 0 || bytes[i - 1] == b'\n';
                if !at_line_start {
                    out.push_str(&source[copied..i]);
                    copied = end;
                }
                i = end;
            }
            b if is_ident_start(b) => {
                let end = scan_qualified(bytes, i);
                if is_synthetic_type(&source[i..end])
                    && type_position_before(bytes, i)
                    && type_position_after(bytes, end)
                {
                    out.push_str(&source[copied..i]);
                    out.push_str(SYNTHETIC_PLACEHOLDER);
                    copied = end;
                }
                i = end;
            }
            _ => i += 1,
        }
    }

    out.push_str(&source[copied..]);
    out
}

fn find(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Skip a `"..."` or `'...'` literal; unterminated literals end at the line break.
fn skip_quoted(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return i,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn skip_text_block(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 3;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
        } else if bytes[i..].starts_with(b"\"\"\"") {
            return i + 3;
        } else {
            i += 1;
        }
    }
    bytes.len()
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$' || b >= 0x80
}

fn is_ident_continue(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

/// End of an identifier, including `.`-joined segments.
fn scan_qualified(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    loop {
        while i < bytes.len() && is_ident_continue(bytes[i]) {
            i += 1;
        }
        if bytes.get(i) == Some(&b'.') && bytes.get(i + 1).copied().is_some_and(is_ident_start) {
            i += 1;
        } else {
            return i;
        }
    }
}

/// `Outer$1`, `pkg.Outer$Inner$2`: a type-cased segment ending in `$<digits>`.
fn is_synthetic_type(token: &str) -> bool {
    let segment = token.rsplit('.').next().unwrap_or(token);
    let Some((base, suffix)) = segment.rsplit_once('$') else {
        return false;
    };
    !suffix.is_empty()
        && suffix.bytes().all(|b| b.is_ascii_digit())
        && base.as_bytes().first().is_some_and(u8::is_ascii_uppercase)
}

fn type_position_before(bytes: &[u8], start: usize) -> bool {
    start == 0 || matches!(bytes[start - 1], b'(' | b',') || bytes[start - 1].is_ascii_whitespace()
}

fn type_position_after(bytes: &[u8], end: usize) -> bool {
    end == bytes.len()
        || matches!(bytes[end], b',' | b';' | b')')
        || bytes[end].is_ascii_whitespace()
}
