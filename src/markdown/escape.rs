//! Markdown escaping for text content and code spans.

/// Escape characters in `text` that Markdown would read as syntax.
///
/// Inline syntax (`\`, `*`, `_`, `` ` ``, `[`, `]`, `<`, `>`, `|`) is
/// always escaped. Block syntax is escaped only where it would start a
/// block at the beginning of a line: `#` headings, `>` quotes, `-`/`+`
/// bullets and `1.` ordered items.
///
/// ```
/// use epubmark::markdown::escape_markdown;
///
/// assert_eq!(escape_markdown("*bold*"), "\\*bold\\*");
/// assert_eq!(escape_markdown("1984. A year"), "1984\\. A year");
/// assert_eq!(escape_markdown("a - b"), "a - b");
/// ```
pub fn escape_markdown(text: &str) -> String {
    escape(text, true)
}

/// Like [`escape_markdown`], for text that continues a line already
/// started by earlier output. Only lines after the first are checked for
/// block syntax.
///
/// ```
/// use epubmark::markdown::escape_markdown_inline;
///
/// assert_eq!(escape_markdown_inline(" # not a heading"), " # not a heading");
/// assert_eq!(escape_markdown_inline(" and *this*"), " and \\*this\\*");
/// ```
pub fn escape_markdown_inline(text: &str) -> String {
    escape(text, false)
}

fn escape(text: &str, line_start: bool) -> String {
    let mut result = String::with_capacity(text.len() + text.len() / 10);

    for (i, line) in text.split('\n').enumerate() {
        let rest = if i > 0 {
            result.push('\n');
            escape_line_start(line, &mut result)
        } else if line_start {
            escape_line_start(line, &mut result)
        } else {
            line
        };
        for c in rest.chars() {
            if matches!(c, '\\' | '*' | '_' | '`' | '[' | ']' | '<' | '>' | '|') {
                result.push('\\');
            }
            result.push(c);
        }
    }

    result
}

/// Escape block syntax at the start of `line`, returning the unhandled rest.
fn escape_line_start<'a>(line: &'a str, out: &mut String) -> &'a str {
    let indent = line.len() - line.trim_start_matches(' ').len();
    out.push_str(&line[..indent]);
    let body = &line[indent..];

    match body.as_bytes() {
        [b'#', ..] => {
            out.push_str("\\#");
            &body[1..]
        }
        [b'-' | b'+', b' ', ..] => {
            out.push('\\');
            out.push_str(&body[..1]);
            &body[1..]
        }
        [b'-' | b'+'] => {
            out.push('\\');
            out.push_str(body);
            ""
        }
        _ => {
            let digits = body.bytes().take_while(u8::is_ascii_digit).count();
            if digits > 0 && body[digits..].starts_with('.') {
                out.push_str(&body[..digits]);
                out.push_str("\\.");
                &body[digits + 1..]
            } else {
                body
            }
        }
    }
}

/// Longest run of `ch` in `content`.
fn longest_run(content: &str, ch: char) -> usize {
    let mut max_run = 0;
    let mut current_run = 0;

    for c in content.chars() {
        if c == ch {
            current_run += 1;
            max_run = max_run.max(current_run);
        } else {
            current_run = 0;
        }
    }
    max_run
}

/// Fence length for a code block: at least 3, longer than any run of
/// `fence_char` in the content.
///
/// ```
/// use epubmark::markdown::calculate_fence_length;
///
/// assert_eq!(calculate_fence_length("let x = 1;", '`'), 3);
/// assert_eq!(calculate_fence_length("```rust\ncode\n```", '`'), 4);
/// ```
pub fn calculate_fence_length(content: &str, fence_char: char) -> usize {
    longest_run(content, fence_char).max(2) + 1
}

/// Backtick count for an inline code span: one more than the longest run.
pub fn calculate_inline_code_ticks(content: &str) -> usize {
    longest_run(content, '`') + 1
}
