//! Text decoding and escaping helpers shared by the parsers and writers.

use std::borrow::Cow;

/// Decode bytes to a string, handling various encodings.
///
/// This function:
/// 1. First tries UTF-8 (handles BOM automatically via encoding_rs)
/// 2. If malformed, tries the hint encoding (from `<?xml encoding="..."?>`)
/// 3. Falls back to Windows-1252 (common in old ebooks)
///
/// Uses `Cow<str>` to avoid allocation when the input is valid UTF-8.
pub fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    // Windows-1252 is a superset of ISO-8859-1
    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Extract encoding from XML declaration.
///
/// Parses `<?xml ... encoding="..." ?>` within the first 100 bytes.
pub fn extract_xml_encoding(bytes: &[u8]) -> Option<&str> {
    let check_len = bytes.len().min(100);
    let prefix = &bytes[..check_len];

    let xml_start = prefix.windows(5).position(|w| w == b"<?xml")?;
    let after_xml = &prefix[xml_start..];

    let enc_pos = after_xml
        .windows(9)
        .position(|w| w.eq_ignore_ascii_case(b"encoding="))?;
    let after_enc = &after_xml[enc_pos + 9..];

    if after_enc.is_empty() {
        return None;
    }

    let quote = after_enc[0];
    if quote != b'"' && quote != b'\'' {
        return None;
    }

    let value_end = after_enc[1..].iter().position(|&b| b == quote)? + 1;

    std::str::from_utf8(&after_enc[1..value_end]).ok()
}

/// Escape special XML/HTML characters.
pub fn escape_xml(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(c),
        }
    }
    result
}

/// Resolve XML entity references (the five predefined ones plus numeric).
pub fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        _ => {}
    }

    if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
        if let Ok(code) = u32::from_str_radix(hex, 16)
            && let Some(c) = char::from_u32(code)
        {
            return Some(c.to_string());
        }
    } else if let Some(dec) = entity.strip_prefix('#')
        && let Ok(code) = dec.parse::<u32>()
        && let Some(c) = char::from_u32(code)
    {
        return Some(c.to_string());
    }

    None
}

/// Remove every `<tag ...>...</tag>` block for the given tag names.
///
/// Matching is ASCII case-insensitive. An unterminated block is removed
/// through the end of the input.
pub fn strip_elements(content: &str, tags: &[&str]) -> String {
    let lower = content.to_ascii_lowercase();
    let mut out = String::with_capacity(content.len());
    let mut pos = 0;

    while pos < content.len() {
        let next = tags
            .iter()
            .filter_map(|tag| find_open_tag(&lower, pos, tag).map(|start| (start, *tag)))
            .min_by_key(|(start, _)| *start);

        let Some((start, tag)) = next else {
            break;
        };

        out.push_str(&content[pos..start]);
        let bytes = lower.as_bytes();
        if let Some(gt) = memchr::memchr(b'>', &bytes[start..])
            && gt > 0
            && bytes[start + gt - 1] == b'/'
        {
            pos = start + gt + 1;
            continue;
        }

        let close = format!("</{tag}");
        pos = match memchr::memmem::find(&bytes[start..], close.as_bytes()) {
            Some(rel) => {
                let close_start = start + rel;
                match memchr::memchr(b'>', &bytes[close_start..]) {
                    Some(gt) => close_start + gt + 1,
                    None => content.len(),
                }
            }
            None => content.len(),
        };
    }

    if pos < content.len() {
        out.push_str(&content[pos..]);
    }
    out
}

/// Find `<tag` at or after `from`, where the name is followed by a delimiter.
fn find_open_tag(lower: &str, from: usize, tag: &str) -> Option<usize> {
    let needle = format!("<{tag}");
    let bytes = lower.as_bytes();
    let mut search = from;
    while let Some(rel) = memchr::memmem::find(&bytes[search..], needle.as_bytes()) {
        let start = search + rel;
        let after = start + needle.len();
        match bytes.get(after) {
            Some(b'>' | b'/' | b' ' | b'\t' | b'\n' | b'\r') | None => return Some(start),
            _ => search = after,
        }
    }
    None
}
