//! Boundary-aware text chunking.
//!
//! Chunks are taken from a sliding character window. The end of each window
//! is pulled back to the last paragraph break (or, failing that, line break)
//! found in the second half of the window, so chunks tend to end on natural
//! boundaries. Consecutive chunks overlap by `overlap` characters.

/// Upper bound on the number of chunks produced for one text.
pub const DEFAULT_MAX_CHUNKS: usize = 500;

/// Split `text` into chunks using the default chunk cap.
pub fn split(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    split_with_cap(text, chunk_size, overlap, DEFAULT_MAX_CHUNKS)
}

/// Split `text` into at most `max_chunks` trimmed chunks.
///
/// Input shorter than `chunk_size` is returned as a single, untrimmed chunk.
/// The window always advances by at least one character and at most
/// `max_chunks` windows are examined, whitespace-only ones included.
pub fn split_with_cap(
    text: &str,
    chunk_size: usize,
    overlap: usize,
    max_chunks: usize,
) -> Vec<String> {
    if text.is_empty() || max_chunks == 0 {
        return Vec::new();
    }
    let chunk_size = chunk_size.max(1);
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    if len < chunk_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut windows = 0usize;
    while start < len && windows < max_chunks {
        windows += 1;
        let mut end = (start + chunk_size).min(len);
        if end < len {
            let floor = start + chunk_size / 2;
            end = find_break(&chars, floor, end).unwrap_or(end);
        }

        let window = &chars[start..end];
        if window.iter().any(|c| !c.is_whitespace()) {
            let piece: String = window.iter().collect();
            chunks.push(piece.trim().to_string());
        }

        if end >= len {
            break;
        }
        let step = (end - start).saturating_sub(overlap).max(1);
        start += step;
    }
    chunks
}

/// Last paragraph break in `[floor, end)`, else last line break, as an
/// exclusive end offset positioned just past the break.
fn find_break(chars: &[char], floor: usize, end: usize) -> Option<usize> {
    if floor >= end {
        return None;
    }
    let paragraph = (floor..end.saturating_sub(1))
        .rev()
        .find(|&idx| chars[idx] == '\n' && chars[idx + 1] == '\n');
    if let Some(idx) = paragraph {
        return Some(idx + 2);
    }
    (floor..end)
        .rev()
        .find(|&idx| chars[idx] == '\n')
        .map(|idx| idx + 1)
}
