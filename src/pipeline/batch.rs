//! Packing new entries into transport-sized messages.

use unicode_segmentation::UnicodeSegmentation;

use crate::models::Entry;

/// Characters kept free in every chunk for the " (part i/N)" suffix and the
/// blank line after the header.
pub const PART_SUFFIX_RESERVE: usize = 40;

const ELLIPSIS: &str = "…";

/// Render `entries` as messages of at most `max_chars` characters each.
pub fn batch(entries: &[Entry], header: &str, max_chars: usize) -> Vec<String> {
    let lines: Vec<String> = entries.iter().map(Entry::display_line).collect();
    batch_lines(&lines, header, max_chars)
}

/// Greedily pack `lines` under `header`, preserving order.
///
/// A line too long to fit even on its own is cut and ends with an ellipsis.
/// A header that leaves no room for lines is cut the same way.
pub fn batch_lines(lines: &[String], header: &str, max_chars: usize) -> Vec<String> {
    if lines.is_empty() {
        return Vec::new();
    }

    let header = truncate_line(header, max_chars.saturating_sub(PART_SUFFIX_RESERVE + 1).max(1));
    let header = header.as_str();
    let budget = max_chars
        .saturating_sub(char_len(header) + PART_SUFFIX_RESERVE)
        .max(1);

    let mut chunks: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_len = 0;

    for line in lines {
        let line = truncate_line(line, budget);
        let len = char_len(&line);

        if !current.is_empty() && current_len + 1 + len > budget {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        current_len += if current.is_empty() { len } else { len + 1 };
        current.push(line);
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    let total = chunks.len();
    chunks
        .iter()
        .enumerate()
        .map(|(i, lines)| render_chunk(header, i + 1, total, lines))
        .collect()
}

fn render_chunk(header: &str, part: usize, total: usize, lines: &[String]) -> String {
    let mut out = String::from(header);
    if total > 1 {
        out.push_str(&format!(" (part {part}/{total})"));
    }
    out.push_str("\n\n");
    out.push_str(&lines.join("\n"));
    out
}

/// Cut `line` to at most `limit` characters on a grapheme boundary.
fn truncate_line(line: &str, limit: usize) -> String {
    if char_len(line) <= limit {
        return line.to_string();
    }

    let keep = limit.saturating_sub(char_len(ELLIPSIS));
    let mut out = String::new();
    let mut used = 0;
    for grapheme in line.graphemes(true) {
        let n = char_len(grapheme);
        if used + n > keep {
            break;
        }
        out.push_str(grapheme);
        used += n;
    }
    out.push_str(ELLIPSIS);
    out
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(count: usize, width: usize) -> Vec<String> {
        (0..count)
            .map(|i| format!("{:0width$}", i, width = width))
            .collect()
    }

    #[test]
    fn test_chunks_fit_budget() {
        let header = "h".repeat(20);
        let input = lines(30, 10);

        let chunks = batch_lines(&input, &header, 100);

        let min_chunks = (30 * 11usize).div_ceil(100 - 20 - 40);
        assert!(chunks.len() >= min_chunks);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100, "chunk too long: {chunk:?}");
        }
    }

    #[test]
    fn test_order_preserved_and_nothing_dropped() {
        let header = "Header";
        let input = lines(50, 12);

        let chunks = batch_lines(&input, header, 120);

        let rejoined: Vec<String> = chunks
            .iter()
            .flat_map(|c| c.split("\n\n").nth(1).unwrap().lines().map(str::to_string).collect::<Vec<_>>())
            .collect();
        assert_eq!(rejoined, input);
    }

    #[test]
    fn test_part_suffix_only_when_split() {
        let single = batch_lines(&lines(2, 5), "cars: 2 new", 200);
        assert_eq!(single, vec!["cars: 2 new\n\n00000\n00001".to_string()]);

        let many = batch_lines(&lines(20, 10), "cars", 90);
        assert!(many.len() > 1);
        assert!(many[0].starts_with(&format!("cars (part 1/{})\n\n", many.len())));
    }

    #[test]
    fn test_oversized_line_is_truncated() {
        let long = "x".repeat(500);
        let chunks = batch_lines(&[long, "short".to_string()], "hdr", 100);

        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
        assert!(chunks[0].ends_with('…'));
        assert!(chunks.iter().any(|c| c.ends_with("short")));
    }

    #[test]
    fn test_long_header_is_cut_to_fit() {
        let header = "h".repeat(99);
        let chunks = batch_lines(&["https://example.com/item/A1".to_string()], &header, 100);

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].chars().count() <= 100, "chunk too long: {:?}", chunks[0]);
        let rendered_header = chunks[0].split("\n\n").next().unwrap();
        assert_eq!(rendered_header.chars().count(), 100 - PART_SUFFIX_RESERVE - 1);
        assert!(rendered_header.ends_with('…'));
    }

    #[test]
    fn test_truncate_respects_graphemes() {
        let line = "e\u{301}".repeat(10);
        let cut = truncate_line(&line, 6);

        assert!(cut.chars().count() <= 6);
        assert_eq!(cut, "e\u{301}e\u{301}…");
    }

    #[test]
    fn test_empty_input() {
        assert!(batch(&[], "hdr", 100).is_empty());
    }

    #[test]
    fn test_batch_uses_stripped_links() {
        let entries = vec![Entry::new("", "https://example.com/item/A1?utm=x")];
        let chunks = batch(&entries, "cars: 1 new", 3900);
        assert_eq!(chunks, vec!["cars: 1 new\n\nhttps://example.com/item/A1"]);
    }
}
