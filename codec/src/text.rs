//! Text encoding and decoding of [`Value`]s

use crate::{CodecError, Value, ValueMap};

/// Encodes a value as text
pub fn serialize(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Encodes a map as text
pub fn serialize_map(map: &ValueMap) -> String {
    let mut out = String::new();
    write_map(&mut out, map);
    out
}

/// Decodes text into a value
///
/// Text that does not open with `{`, `[` or `"` is returned verbatim
/// (trimmed) as a scalar string.
pub fn deserialize(text: &str) -> Result<Value, CodecError> {
    let (start, end) = trim_bounds(text, 0, text.len());
    parse_value(text, start, end)
}

/// Decodes text that must hold a map
pub fn deserialize_map(text: &str) -> Result<ValueMap, CodecError> {
    deserialize(text)?.into_map().ok_or(CodecError::ExpectedMap)
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Str(s) => write_str(out, s),
        Value::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Map(map) => write_map(out, map),
    }
}

fn write_map(out: &mut String, map: &ValueMap) {
    out.push('{');
    for (i, (key, value)) in map.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_str(out, key);
        out.push(':');
        write_value(out, value);
    }
    out.push('}');
}

fn write_str(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            out.push(chars.next().unwrap_or('\\'));
        } else {
            out.push(c);
        }
    }
    out
}

// Every offset below sits next to an ASCII delimiter or ASCII whitespace,
// so slicing `src` at them always lands on a char boundary.

fn parse_value(src: &str, start: usize, end: usize) -> Result<Value, CodecError> {
    let bytes = src.as_bytes();
    if start >= end {
        return Ok(Value::Str(String::new()));
    }

    match bytes[start] {
        b'{' | b'[' => {
            let close = find_closing(src, start, end)?;
            if close + 1 != end {
                return Err(CodecError::TrailingInput { offset: close + 1 });
            }
            if bytes[start] == b'{' {
                parse_map_entries(src, start + 1, close).map(Value::Map)
            } else {
                parse_list_items(src, start + 1, close).map(Value::List)
            }
        }
        b'"' => {
            let close = find_string_end(src, start, end)?;
            if close + 1 != end {
                return Err(CodecError::TrailingInput { offset: close + 1 });
            }
            Ok(Value::Str(unescape(&src[start + 1..close])))
        }
        _ => Ok(Value::Str(src[start..end].to_string())),
    }
}

fn parse_map_entries(src: &str, start: usize, end: usize) -> Result<ValueMap, CodecError> {
    let bytes = src.as_bytes();
    let mut map = ValueMap::new();
    let mut i = skip_whitespace(bytes, start, end);

    while i < end {
        if bytes[i] != b'"' {
            return Err(unexpected(src, i));
        }
        let key_end = find_string_end(src, i, end)?;
        let key = unescape(&src[i + 1..key_end]);

        i = skip_whitespace(bytes, key_end + 1, end);
        if i >= end {
            return Err(CodecError::UnexpectedEnd { offset: i });
        }
        if bytes[i] != b':' {
            return Err(unexpected(src, i));
        }

        i = skip_whitespace(bytes, i + 1, end);
        let value_end = scan_value_end(src, i, end)?;
        let (value_start, trimmed_end) = trim_bounds(src, i, value_end);
        map.insert(key, parse_value(src, value_start, trimmed_end)?);

        i = skip_separator(src, value_end, end)?;
    }

    Ok(map)
}

fn parse_list_items(src: &str, start: usize, end: usize) -> Result<Vec<Value>, CodecError> {
    let bytes = src.as_bytes();
    let mut items = Vec::new();
    let mut i = skip_whitespace(bytes, start, end);

    while i < end {
        let value_end = scan_value_end(src, i, end)?;
        let (value_start, trimmed_end) = trim_bounds(src, i, value_end);
        items.push(parse_value(src, value_start, trimmed_end)?);

        i = skip_separator(src, value_end, end)?;
    }

    Ok(items)
}

/// Skips whitespace and at most one comma after a value
fn skip_separator(src: &str, from: usize, end: usize) -> Result<usize, CodecError> {
    let bytes = src.as_bytes();
    let i = skip_whitespace(bytes, from, end);
    if i >= end {
        return Ok(end);
    }
    if bytes[i] != b',' {
        return Err(unexpected(src, i));
    }
    Ok(skip_whitespace(bytes, i + 1, end))
}

/// Returns the exclusive end of the value starting at `start`
fn scan_value_end(src: &str, start: usize, end: usize) -> Result<usize, CodecError> {
    let bytes = src.as_bytes();
    if start >= end {
        return Ok(end);
    }
    match bytes[start] {
        b'{' | b'[' => Ok(find_closing(src, start, end)? + 1),
        b'"' => Ok(find_string_end(src, start, end)? + 1),
        _ => Ok(bytes[start..end]
            .iter()
            .position(|&b| b == b',')
            .map_or(end, |pos| start + pos)),
    }
}

/// Finds the bracket closing the one at `start` by depth counting
///
/// Quoted spans are skipped whole, so brackets inside strings never count.
fn find_closing(src: &str, start: usize, end: usize) -> Result<usize, CodecError> {
    let bytes = src.as_bytes();
    let open = bytes[start];
    let close = if open == b'{' { b'}' } else { b']' };
    let mut depth = 0usize;
    let mut i = start;

    while i < end {
        let b = bytes[i];
        if b == b'"' {
            i = find_string_end(src, i, end)?;
        } else if b == open {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return Ok(i);
            }
        }
        i += 1;
    }

    Err(CodecError::Unbalanced {
        open: open as char,
        close: close as char,
        offset: start,
    })
}

/// Finds the first unescaped quote after the opening quote at `start`
fn find_string_end(src: &str, start: usize, end: usize) -> Result<usize, CodecError> {
    let bytes = src.as_bytes();
    let mut i = start + 1;
    while i < end {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Ok(i),
            _ => i += 1,
        }
    }
    Err(CodecError::UnterminatedString { offset: start })
}

fn skip_whitespace(bytes: &[u8], mut i: usize, end: usize) -> usize {
    while i < end && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn trim_bounds(src: &str, mut start: usize, mut end: usize) -> (usize, usize) {
    let bytes = src.as_bytes();
    start = skip_whitespace(bytes, start, end);
    while end > start && bytes[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    (start, end)
}

fn unexpected(src: &str, offset: usize) -> CodecError {
    match src[offset..].chars().next() {
        Some(found) => CodecError::UnexpectedChar { found, offset },
        None => CodecError::UnexpectedEnd { offset },
    }
}
