//! Fixed-width text reflow for the page text band.
//!
//! Author line breaks are kept exactly where they are. Every segment between
//! them is broken independently: at the last space before the column limit,
//! or mid-word when the segment has no usable space.

/// Wrap `text` so no reflowed line exceeds `max_line_length` characters.
///
/// Lengths are counted in `char`s. A limit of zero is treated as one so the
/// reflow always makes progress.
pub fn wrap(text: &str, max_line_length: usize) -> String {
    let limit = max_line_length.max(1);
    let mut wrapped = String::with_capacity(text.len() + text.len() / limit + 1);

    for segment in text.split('\n') {
        let mut line = segment;
        while line.chars().count() > limit {
            let limit_byte = byte_offset(line, limit);
            let break_at = line[..limit_byte].rfind(' ').unwrap_or(limit_byte);

            wrapped.push_str(line[..break_at].trim_end());
            wrapped.push('\n');
            line = line[break_at..].trim_start();
        }
        wrapped.push_str(line);
        wrapped.push('\n');
    }

    // Only the newline appended after the final segment goes away.
    wrapped.pop();
    wrapped
}

/// Byte index of the `chars`-th character of `line`.
fn byte_offset(line: &str, chars: usize) -> usize {
    line.char_indices()
        .nth(chars)
        .map_or(line.len(), |(idx, _)| idx)
}
