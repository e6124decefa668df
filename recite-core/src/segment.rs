//! Sentence segmentation with language tags
//!
//! Messages are split into generation units before dispatch. The service
//! understands `<en>` and `<pl>` tags that switch the language of the text
//! following them; a tagged block is split further into sentences, and each
//! sentence becomes one unit. Unknown tags are not special and pass through
//! as literal text.

use serde::{Deserialize, Serialize};

/// One generation unit: a sentence plus the language it should be spoken in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub text: String,
    pub lang: String,
}

impl Unit {
    /// The text as sent to the service: padded the way the upstream
    /// pipeline expects its inputs.
    pub fn padded_text(&self) -> String {
        format!("  {}  ", self.text)
    }
}

const KNOWN_TAGS: [&str; 2] = ["en", "pl"];
const DEFAULT_LANG: &str = "en";

/// Split a message into generation units.
///
/// Blank segments are dropped; a message with no speakable content yields an
/// empty vector. An untagged block defaults to English.
pub fn split_units(text: &str) -> Vec<Unit> {
    let mut units = Vec::new();

    for (lang, block) in split_tagged_blocks(text) {
        for sentence in split_sentences(&block) {
            let trimmed = sentence.trim();
            if trimmed.is_empty() {
                continue;
            }
            units.push(Unit {
                text: trimmed.to_string(),
                lang: lang.clone(),
            });
        }
    }

    units
}

/// Split text into (language, block) pairs on `<en>`/`<pl>` tags.
fn split_tagged_blocks(text: &str) -> Vec<(String, String)> {
    let mut blocks = Vec::new();
    let mut lang = DEFAULT_LANG.to_string();
    let mut current = String::new();
    let mut rest = text;

    while let Some(pos) = rest.find('<') {
        let (before, at_tag) = rest.split_at(pos);
        current.push_str(before);

        let mut matched = None;
        for tag in KNOWN_TAGS {
            let candidate = format!("<{}>", tag);
            if at_tag.starts_with(candidate.as_str()) {
                matched = Some((tag, candidate.len()));
                break;
            }
        }

        match matched {
            Some((tag, len)) => {
                if !current.trim().is_empty() {
                    blocks.push((lang.clone(), std::mem::take(&mut current)));
                } else {
                    current.clear();
                }
                lang = tag.to_string();
                rest = &at_tag[len..];
            }
            None => {
                // Not a language tag; keep the '<' as text
                current.push('<');
                rest = &at_tag[1..];
            }
        }
    }

    current.push_str(rest);
    if !current.trim().is_empty() {
        blocks.push((lang, current));
    }

    blocks
}

/// Split a block into sentences on terminal punctuation.
///
/// A sentence ends at '.', '!', '?' or '…' when followed by whitespace or
/// the end of the block. Runs of terminators ("?!", "...") stay attached to
/// the sentence they end.
fn split_sentences(block: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = block.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if is_terminator(c) {
            // Absorb the rest of the terminator run
            while let Some(&next) = chars.peek() {
                if is_terminator(next) {
                    current.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            let boundary = match chars.peek() {
                Some(&next) => next.is_whitespace(),
                None => true,
            };
            if boundary {
                sentences.push(std::mem::take(&mut current));
            }
        }
    }

    if !current.trim().is_empty() {
        sentences.push(current);
    }

    sentences
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '…')
}
