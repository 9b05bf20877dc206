//! Splitting an oversized markup message into transport-sized chunks.
//!
//! Split points are paragraph boundaries first and spaces second, both of
//! which the renderer guarantees never fall inside a tag. Lengths are
//! counted in characters and every cut lands on a char boundary.

/// Split `message` into chunks of at most `max_length` characters.
///
/// Paragraphs (double-newline separated) are accumulated greedily; a
/// paragraph that cannot fit even on its own is cut at the nearest space
/// before the limit, or hard-cut at the limit when it has no space, and
/// the remainder re-enters accumulation.
pub fn chunk_message(message: &str, max_length: usize) -> Vec<String> {
    if char_len(message) <= max_length {
        return vec![message.to_string()];
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for paragraph in message.split("\n\n") {
        let needed = if current.is_empty() {
            char_len(paragraph)
        } else {
            char_len(&current) + 2 + char_len(paragraph)
        };
        if needed <= max_length {
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(paragraph);
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        let mut rest = paragraph;
        while char_len(rest) > max_length {
            let cut = cut_index(rest, max_length);
            chunks.push(rest[..cut].to_string());
            rest = &rest[cut..];
        }
        current = rest.to_string();
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte index to cut an oversized paragraph at: after the nearest space
/// at or before the `max_length` character boundary, or exactly at the
/// boundary when the head contains no space at all.
fn cut_index(paragraph: &str, max_length: usize) -> usize {
    let offsets: Vec<usize> = paragraph.char_indices().map(|(i, _)| i).collect();
    let hard = offsets.get(max_length).copied().unwrap_or(paragraph.len());

    let mut safe = max_length.min(offsets.len());
    while safe > 0 {
        let at = offsets[safe - 1];
        if paragraph[at..].starts_with(' ') {
            return offsets.get(safe).copied().unwrap_or(paragraph.len());
        }
        safe -= 1;
    }
    hard
}
