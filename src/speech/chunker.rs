//! Splits document text into narration-sized chunks.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\r\n]+").unwrap());
// A sentence is everything up to a run of terminators plus trailing
// whitespace; the second branch catches an unterminated tail.
static RE_SENTENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^。，？！.,:;?!]*[。，？！.,:;?!]+\s*|[^。，？！.,:;?!]+").unwrap()
});

/// Split `text` into ordered, non-empty chunks of at most `max_len` chars.
///
/// Paragraphs that fit become one chunk each. Longer paragraphs are packed
/// sentence by sentence, and a sentence that alone exceeds the limit is cut
/// into `max_len`-sized pieces after the pending chunk is flushed.
pub fn split_text_into_chunks(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut chunks = Vec::new();

    for paragraph in RE_PARAGRAPH_BREAK.split(text) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        if char_len(paragraph) <= max_len {
            chunks.push(paragraph.to_string());
            continue;
        }

        let mut current = String::new();
        let mut current_len = 0usize;
        for sentence in RE_SENTENCE.find_iter(paragraph).map(|m| m.as_str()) {
            let len = char_len(sentence);
            if len > max_len {
                flush(&mut chunks, &mut current);
                current_len = 0;
                hard_split(&mut chunks, sentence, max_len);
            } else if current_len + len > max_len {
                flush(&mut chunks, &mut current);
                current.push_str(sentence);
                current_len = len;
            } else {
                current.push_str(sentence);
                current_len += len;
            }
        }
        flush(&mut chunks, &mut current);
    }

    chunks
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
    current.clear();
}

fn hard_split(chunks: &mut Vec<String>, sentence: &str, max_len: usize) {
    let chars: Vec<char> = sentence.chars().collect();
    for piece in chars.chunks(max_len) {
        let piece: String = piece.iter().collect();
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn non_whitespace(text: &str) -> String {
        text.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(split_text_into_chunks("", 160).is_empty());
        assert!(split_text_into_chunks("\n\n  \n", 160).is_empty());
    }

    #[test]
    fn short_paragraphs_stay_whole() {
        let chunks = split_text_into_chunks("第一段。\n\n第二段！\r\nThird one.", 160);
        assert_eq!(chunks, vec!["第一段。", "第二段！", "Third one."]);
    }

    #[test]
    fn long_paragraph_packs_sentences() {
        let sentence = format!("{}。", "字".repeat(49));
        let paragraph = sentence.repeat(4);
        let chunks = split_text_into_chunks(&paragraph, 160);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], sentence.repeat(3));
        assert_eq!(chunks[1], sentence);
    }

    #[test]
    fn overlong_sentence_is_hard_split_in_order() {
        let lead = "开头一句。";
        let long = "长".repeat(25);
        let tail = "结尾。";
        let text = format!("{lead}{long}{tail}");
        let chunks = split_text_into_chunks(&text, 10);
        assert_eq!(chunks.first().map(String::as_str), Some(lead));
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 10));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn terminator_runs_stay_with_their_sentence() {
        let chunks = split_text_into_chunks("Wait?! Really... yes.", 10);
        assert_eq!(chunks, vec!["Wait?!", "Really...", "yes."]);
    }

    #[test]
    fn chunks_are_bounded_and_lossless() {
        let text = "The quick brown fox, jumping high: over the lazy dog; then back again! \
                    没有标点的一段很长很长的中文文字继续延伸下去直到超过限制为止再多写一点。\n\
                    Short line.\n\n\nAnother paragraph that rambles on, and on, and on?";
        for max_len in [5, 12, 40, 160] {
            let chunks = split_text_into_chunks(text, max_len);
            assert!(chunks.iter().all(|chunk| !chunk.trim().is_empty()));
            assert!(chunks.iter().all(|chunk| chunk.chars().count() <= max_len));
            assert_eq!(non_whitespace(&chunks.concat()), non_whitespace(text));
        }
    }
}
