//! Passage segmentation strategies.
//!
//! Splits raw document text into ordered passages usable as independent
//! retrieval units. Three pure, deterministic strategies are provided:
//!
//! - [`chunk_by_characters`] — sliding window with boundary-preserving
//!   cuts and configurable overlap.
//! - [`chunk_by_paragraphs`] — blank-line boundaries, accumulated up to a
//!   size limit, with optional merging of short passages.
//! - [`chunk_by_markdown`] — heading-aware sectioning that keeps each
//!   heading attached to its body text.
//!
//! All sizes are measured in characters (not bytes), so limits hold for
//! multibyte text. Empty input produces an empty passage list, and a
//! whitespace-only passage is never returned; no other content is
//! dropped.
//!
//! # Window algorithm
//!
//! 1. If the text fits in one window, return it as the only passage.
//! 2. Otherwise, at each window end search backward for a sentence
//!    terminator (`.`, `!`, `?`) followed by whitespace; accept a cut
//!    there if it lies beyond 25% of the window.
//! 3. Failing that, cut at the nearest space beyond the same threshold.
//! 4. Failing that, cut at the hard window boundary.
//! 5. The next window starts `overlap` characters before the cut, unless
//!    that would fail to make forward progress, in which case it starts
//!    at the cut.

/// Split text into fixed-size windows with boundary-preserving cuts.
///
/// Returns `[text]` unchanged when it fits within `target_size`. Every
/// returned passage is trimmed and at most `target_size` characters
/// long. `overlap` characters are repeated between consecutive windows
/// to preserve context across cuts.
pub fn chunk_by_characters(text: &str, target_size: usize, overlap: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let target = target_size.max(1);
    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();

    if n <= target {
        return vec![text.to_string()];
    }

    let mut passages = Vec::new();
    let mut start = 0usize;

    while start < n {
        let window_end = (start + target).min(n);

        // Final window: take the remainder and stop.
        if window_end == n {
            push_trimmed(&mut passages, &chars[start..n]);
            break;
        }

        let cut_end = find_cut(&chars, start, window_end, target);
        push_trimmed(&mut passages, &chars[start..cut_end]);

        let next_start = cut_end.saturating_sub(overlap);
        start = if next_start > start { next_start } else { cut_end };
    }

    passages
}

/// Pick the cut position for a window, preferring a sentence end, then a
/// space, then the hard boundary. Cuts inside the first quarter of the
/// window are rejected so passages keep a useful minimum length.
fn find_cut(chars: &[char], start: usize, window_end: usize, target: usize) -> usize {
    let floor = start + target / 4;

    for j in (start..window_end).rev() {
        if matches!(chars[j], '.' | '!' | '?')
            && chars.get(j + 1).is_some_and(|c| c.is_whitespace())
            && j + 1 > floor
        {
            return j + 1;
        }
    }

    for j in (start..window_end).rev() {
        if chars[j].is_whitespace() && j > floor {
            return j;
        }
    }

    window_end
}

fn push_trimmed(passages: &mut Vec<String>, piece: &[char]) {
    let passage: String = piece.iter().collect();
    let passage = passage.trim();
    if !passage.is_empty() {
        passages.push(passage.to_string());
    }
}

/// Split text on blank-line boundaries, accumulating paragraphs into
/// passages of at most `max_size` characters.
///
/// When every paragraph already fits and no minimum size is requested,
/// paragraphs are returned verbatim, one passage each, preserving the
/// document's own semantic boundaries. A single paragraph larger than
/// `max_size` is split via [`chunk_by_characters`] (without overlap)
/// before being appended.
///
/// When `min_size > 0`, a second pass merges any passage shorter than
/// `min_size` into its neighbor, provided the merged passage stays
/// within `max_size`; otherwise the short passage stands alone.
pub fn chunk_by_paragraphs(text: &str, max_size: usize, min_size: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let max = max_size.max(1);
    let paragraphs: Vec<&str> = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    if min_size == 0 && paragraphs.iter().all(|p| p.chars().count() <= max) {
        return paragraphs.into_iter().map(str::to_string).collect();
    }

    let mut passages = Vec::new();
    let mut buf = String::new();

    for para in paragraphs {
        let para_len = para.chars().count();

        if para_len > max {
            flush(&mut passages, &mut buf);
            passages.extend(chunk_by_characters(para, max, 0));
            continue;
        }

        let buf_len = buf.chars().count();
        let would_be = if buf.is_empty() {
            para_len
        } else {
            buf_len + 2 + para_len
        };

        if would_be > max && !buf.is_empty() {
            flush(&mut passages, &mut buf);
        }
        if !buf.is_empty() {
            buf.push_str("\n\n");
        }
        buf.push_str(para);
    }

    flush(&mut passages, &mut buf);

    if min_size > 0 {
        passages = merge_short_passages(passages, max, min_size);
    }

    passages
}

fn flush(passages: &mut Vec<String>, buf: &mut String) {
    if !buf.is_empty() {
        passages.push(std::mem::take(buf));
    }
}

/// Merge adjacent passages when either side is shorter than `min_size`
/// and the combined passage stays within `max_size`.
fn merge_short_passages(passages: Vec<String>, max_size: usize, min_size: usize) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();

    for passage in passages {
        let len = passage.chars().count();
        if let Some(last) = merged.last_mut() {
            let last_len = last.chars().count();
            if (len < min_size || last_len < min_size) && last_len + 2 + len <= max_size {
                last.push_str("\n\n");
                last.push_str(&passage);
                continue;
            }
        }
        merged.push(passage);
    }

    merged
}

/// Heading-aware segmentation for markdown-like text.
///
/// Heading lines (1–6 leading `#` characters followed by whitespace)
/// delimit sections; each section becomes one passage when it fits in
/// `max_size`. An oversized section is re-chunked by paragraphs with a
/// budget of `max_size` minus the heading length, and every resulting
/// passage is prefixed with the heading line so retrieval never loses
/// the section context. Text before the first heading becomes its own
/// passage. Text without any headings falls back to
/// [`chunk_by_paragraphs`].
pub fn chunk_by_markdown(text: &str, max_size: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let max = max_size.max(1);
    let mut heading_offsets: Vec<usize> = Vec::new();
    let mut offset = 0usize;
    for line in text.split_inclusive('\n') {
        if is_heading_line(line) {
            heading_offsets.push(offset);
        }
        offset += line.len();
    }

    if heading_offsets.is_empty() {
        return chunk_by_paragraphs(text, max, 0);
    }

    let mut passages = Vec::new();

    let preamble = &text[..heading_offsets[0]];
    if !preamble.trim().is_empty() {
        if preamble.trim().chars().count() <= max {
            passages.push(preamble.trim().to_string());
        } else {
            passages.extend(chunk_by_paragraphs(preamble, max, 0));
        }
    }

    for (i, &section_start) in heading_offsets.iter().enumerate() {
        let section_end = heading_offsets
            .get(i + 1)
            .copied()
            .unwrap_or_else(|| text.len());
        let section = text[section_start..section_end].trim();
        if section.is_empty() {
            continue;
        }

        if section.chars().count() <= max {
            passages.push(section.to_string());
            continue;
        }

        let (heading, body) = match section.split_once('\n') {
            Some((heading, body)) => (heading.trim_end(), body),
            None => (section, ""),
        };
        let budget = max.saturating_sub(heading.chars().count()).max(1);
        let pieces = chunk_by_paragraphs(body, budget, 0);
        if pieces.is_empty() {
            passages.push(heading.to_string());
        } else {
            for piece in pieces {
                passages.push(format!("{heading}\n{piece}"));
            }
        }
    }

    passages
}

/// A markdown heading: 1–6 `#` characters at the start of the line,
/// followed by whitespace or nothing (so `#tag` is not a heading).
fn is_heading_line(line: &str) -> bool {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    (1..=6).contains(&hashes)
        && line[hashes..]
            .chars()
            .next()
            .is_none_or(|c| c.is_whitespace())
}
