//! Lyric segmentation.
//!
//! Lyrics are structured with bracketed section labels:
//!
//! ```text
//! [verse]
//! Staring at the sunset, colors paint the sky
//!
//! [chorus]
//! Don't let this moment fade
//! ```
//!
//! Each label plus the text up to the next label (or end of input) becomes
//! one [`LyricSegment`]. Text before the first label is discarded.

/// One labeled section of the lyrics, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricSegment {
    /// Section tag without brackets, e.g. `verse`.
    pub label: String,
    /// Trimmed section body.
    pub text: String,
}

impl LyricSegment {
    /// The segment as it appears in a prompt: label line, body, blank line.
    pub fn prompt_text(&self) -> String {
        format!("[{}]\n{}\n\n", self.label, self.text)
    }
}

/// Split raw lyrics into labeled segments.
///
/// A label is `[` followed by one or more word characters and `]`.
/// Bracketed text with spaces or punctuation, such as `[Verse 1]`, is kept
/// as ordinary body text.
pub fn split_lyrics(lyrics: &str) -> Vec<LyricSegment> {
    let labels = find_labels(lyrics);
    labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let body_end = labels.get(i + 1).map_or(lyrics.len(), |next| next.start);
            LyricSegment {
                label: label.name.to_string(),
                text: lyrics[label.end..body_end].trim().to_string(),
            }
        })
        .collect()
}

/// The lyrics as fed to the instruction prompt: all segments, newline-joined.
pub fn full_lyrics(segments: &[LyricSegment]) -> String {
    segments
        .iter()
        .map(LyricSegment::prompt_text)
        .collect::<Vec<_>>()
        .join("\n")
}

struct Label<'a> {
    name: &'a str,
    /// Byte offset of `[`.
    start: usize,
    /// Byte offset just past `]`.
    end: usize,
}

fn find_labels(text: &str) -> Vec<Label<'_>> {
    let mut labels = Vec::new();
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('[') {
        let start = search_from + offset;
        let name_start = start + 1;
        let name_len: usize = text[name_start..]
            .chars()
            .take_while(|&c| c.is_alphanumeric() || c == '_')
            .map(char::len_utf8)
            .sum();
        let close = name_start + name_len;
        if name_len > 0 && text[close..].starts_with(']') {
            labels.push(Label {
                name: &text[name_start..close],
                start,
                end: close + 1,
            });
            search_from = close + 1;
        } else {
            search_from = name_start;
        }
    }
    labels
}
