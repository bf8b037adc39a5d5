//! Character-level encoders for the N-Triples and Turtle grammars
//!
//! Every rule is implemented against the W3C productions:
//! <https://www.w3.org/TR/n-triples/#n-triples-grammar> and
//! <https://www.w3.org/TR/turtle/#sec-grammar-grammar>. This module is the
//! only place in the crate that knows about RDF syntax; the writer composes
//! these functions and everything above the writer works with plain strings.

use std::fmt::Write;
use std::str;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum GrammarError {
    #[error("character {ch:?} not allowed in {production}")]
    InvalidChar { production: &'static str, ch: char },
    #[error("malformed utf-8 input")]
    MalformedUtf8,
    #[error("empty input where a code point is required")]
    EmptyCodepoint,
}

/// Number of code points in a utf-8 byte sequence.
pub fn utf8_length(s: &[u8]) -> Result<usize, GrammarError> {
    let s = str::from_utf8(s).map_err(|_| GrammarError::MalformedUtf8)?;
    Ok(s.chars().count())
}

/// First code point of a utf-8 byte sequence.
pub fn utf8_codepoint(s: &[u8]) -> Result<u32, GrammarError> {
    let s = str::from_utf8(s).map_err(|_| GrammarError::MalformedUtf8)?;
    match s.chars().next() {
        Some(c) => Ok(c as u32),
        None => Err(GrammarError::EmptyCodepoint),
    }
}

/// UCHAR escape: `\uXXXX` for code points up to U+FFFF, `\UXXXXXXXX` above.
pub fn uchar(cp: u32) -> String {
    if cp <= 0xFFFF {
        format!("\\u{cp:04x}")
    } else {
        format!("\\U{cp:08x}")
    }
}

/// PERCENT escape: one `%HH` group per big-endian byte of the code point
/// value, minimal length. `0xFFF64` encodes as `%0f%ff%64`.
pub fn percent(cp: u32) -> String {
    let bytes = cp.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count().min(3);
    let mut out = String::with_capacity(3 * (4 - skip));
    for b in &bytes[skip..] {
        write!(out, "%{b:02x}").unwrap();
    }
    out
}

fn iriref_forbidden(c: char) -> bool {
    (c as u32) < 0x21 || matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\')
}

/// IRIREF interior: forbidden characters become UCHAR escapes, everything
/// else (including non-ASCII) passes through verbatim.
pub fn encode_iriref(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if iriref_forbidden(c) {
            out.push_str(&uchar(c as u32));
        } else {
            out.push(c);
        }
    }
    out
}

/// Full IRIREF: `<` + encoded prefix+suffix + `>`.
pub fn iriref(prefix: &str, suffix: &str) -> String {
    let mut joined = String::with_capacity(prefix.len() + suffix.len());
    joined.push_str(prefix);
    joined.push_str(suffix);
    format!("<{}>", encode_iriref(&joined))
}

/// STRING_LITERAL_QUOTE: `"` and `\` and LF and CR are escaped, tab passes
/// through literally.
pub fn string_literal_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// STRING_LITERAL_SINGLE_QUOTE (Turtle only): `'` and `\` and LF and CR are
/// escaped, `"` and tab pass through literally.
pub fn string_literal_single_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn pn_chars_base(c: char) -> bool {
    matches!(c,
        'A'..='Z'
        | 'a'..='z'
        | '\u{00C0}'..='\u{00D6}'
        | '\u{00D8}'..='\u{00F6}'
        | '\u{00F8}'..='\u{02FF}'
        | '\u{0370}'..='\u{037D}'
        | '\u{037F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}'
        | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}'
        | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
}

fn pn_chars_u(c: char) -> bool {
    pn_chars_base(c) || c == '_'
}

// PN_CHARS extensions beyond PN_CHARS_U: allowed anywhere except as the
// first character of a name.
fn pn_chars_extension(c: char) -> bool {
    matches!(c, '\u{00B7}' | '\u{0300}'..='\u{036F}' | '\u{203F}' | '\u{2040}')
}

fn pn_chars(c: char) -> bool {
    pn_chars_u(c) || c == '-' || c.is_ascii_digit() || pn_chars_extension(c)
}

/// PN_PREFIX validation. The input is returned verbatim on success; no
/// escaping exists for prefixes.
pub fn encode_pn_prefix(s: &str) -> Result<String, GrammarError> {
    let count = s.chars().count();
    for (i, c) in s.chars().enumerate() {
        let ok = if i == 0 {
            pn_chars_base(c)
        } else if i == count - 1 {
            pn_chars(c)
        } else {
            pn_chars(c) || c == '.'
        };
        if !ok {
            return Err(GrammarError::InvalidChar {
                production: "PN_PREFIX",
                ch: c,
            });
        }
    }
    Ok(s.to_string())
}

const PN_LOCAL_ESC: &str = "~.-!$&'()*+,;=/?#@%";

/// PN_LOCAL with local escapes. `_` and `:` and digits are always allowed,
/// `.` is unescaped unless first or last, `-` unless first; the remaining
/// PN_LOCAL_ESC characters always carry a backslash.
pub fn encode_pn_local(s: &str) -> Result<String, GrammarError> {
    let count = s.chars().count();
    let mut out = String::with_capacity(s.len());
    for (i, c) in s.chars().enumerate() {
        let first = i == 0;
        let last = i + 1 == count;
        if c == '.' && !first && !last {
            out.push(c);
        } else if c == '-' && !first {
            out.push(c);
        } else if PN_LOCAL_ESC.contains(c) {
            out.push('\\');
            out.push(c);
        } else if pn_chars_u(c) || c == ':' || c.is_ascii_digit() {
            out.push(c);
        } else if pn_chars_extension(c) {
            if first {
                return Err(GrammarError::InvalidChar {
                    production: "PN_LOCAL",
                    ch: c,
                });
            }
            out.push(c);
        } else {
            return Err(GrammarError::InvalidChar {
                production: "PN_LOCAL",
                ch: c,
            });
        }
    }
    Ok(out)
}

/// PrefixedName: validated prefix, escaped local part, joined by `:`.
pub fn prefixed_name(prefix: &str, local: &str) -> Result<String, GrammarError> {
    Ok(format!(
        "{}:{}",
        encode_pn_prefix(prefix)?,
        encode_pn_local(local)?
    ))
}
