/// Split text into overlapping chunks suitable for embedding.
///
/// Operates on character indices, never raw byte offsets, so multi-byte
/// UTF-8 content is never cut mid-codepoint. Window ends snap to the last
/// sentence-terminating period or newline when one falls in the second half
/// of the window; snapping further back than the window midpoint is refused
/// so chunks never degenerate to near-empty fragments.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let cleaned = text.trim();
    if cleaned.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = cleaned.chars().collect();
    let len = chars.len();

    // Text smaller than the window is a single chunk
    if len <= chunk_size {
        return vec![cleaned.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < len {
        let naive_end = start + chunk_size;
        let mut end = naive_end.min(len);

        // Try to break at a sentence boundary
        if naive_end < len {
            if let Some(break_point) = last_break(&chars, naive_end) {
                if break_point > start + chunk_size / 2 {
                    end = break_point + 1;
                }
            }
        }

        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        // Rewind by the overlap; when the rewind fails to advance (large
        // overlap plus a break near the window midpoint), continue from the
        // window end instead so the sweep always makes progress.
        let next = end.saturating_sub(chunk_overlap);
        start = if next > start { next } else { end };

        // Remaining tail fits inside the overlap of the chunk just emitted
        if start as i64 >= len as i64 - chunk_overlap as i64 {
            break;
        }
    }

    chunks
}

/// Index of the last `.` or `\n` at or before `from`.
fn last_break(chars: &[char], from: usize) -> Option<usize> {
    let from = from.min(chars.len() - 1);
    (0..=from).rev().find(|&i| chars[i] == '.' || chars[i] == '\n')
}
