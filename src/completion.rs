//! Filename completion of the last word on the input line.

use std::fs;
use std::io;
use std::path::Path;

/// Candidates of an ambiguous completion waiting for a numeric choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionState {
    pub candidates: Vec<String>,
    pub prefix: String,
    /// Byte offset of the whitespace before the completed word, if any.
    pub split: Option<usize>,
}

impl CompletionState {
    /// Buffer with the completed word replaced by candidate `choice`
    /// (1-based); `None` when the choice is out of range.
    pub fn select(&self, buffer: &str, choice: usize) -> Option<(String, &str)> {
        let picked = self.candidates.get(choice.checked_sub(1)?)?;
        Some((replace_word(buffer, self.split, picked), picked.as_str()))
    }
}

/// What a completion request did to the input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Nothing to complete.
    Unchanged,
    /// The line was rewritten; the cursor belongs at its end.
    Replaced(String),
    /// Several candidates share no longer prefix; a choice is needed.
    Ambiguous(CompletionState),
}

/// The word after the last whitespace, with the offset of that whitespace.
pub fn trailing_word(buffer: &str) -> (Option<usize>, &str) {
    match buffer.rfind(char::is_whitespace) {
        Some(at) => {
            let ws_len = buffer[at..].chars().next().map_or(1, char::len_utf8);
            (Some(at), &buffer[at + ws_len..])
        }
        None => (None, buffer),
    }
}

fn replace_word(buffer: &str, split: Option<usize>, word: &str) -> String {
    match split {
        Some(at) => {
            let ws_len = buffer[at..].chars().next().map_or(1, char::len_utf8);
            format!("{}{word}", &buffer[..at + ws_len])
        }
        None => word.to_string(),
    }
}

/// Entries of `dir` starting with `prefix`, sorted, without `.` and `..`.
pub fn matching_entries(dir: &Path, prefix: &str) -> io::Result<Vec<String>> {
    let mut matches = Vec::new();
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if name.starts_with(prefix) && name != "." && name != ".." {
            matches.push(name);
        }
    }
    matches.sort();
    Ok(matches)
}

/// Longest prefix shared by every string, cut on a character boundary.
pub fn longest_common_prefix(strs: &[String]) -> String {
    let Some(first) = strs.first() else {
        return String::new();
    };
    let mut len = first.len();
    for s in &strs[1..] {
        len = first
            .char_indices()
            .zip(s.chars())
            .take_while(|((_, a), b)| a == b)
            .last()
            .map_or(0, |((i, a), _)| i + a.len_utf8())
            .min(len);
    }
    first[..len].to_string()
}

/// Complete the trailing word of `buffer` against the entries of `dir`.
pub fn complete(buffer: &str, dir: &Path) -> io::Result<Completion> {
    let (split, word) = trailing_word(buffer);
    if word.is_empty() {
        return Ok(Completion::Unchanged);
    }

    let matches = matching_entries(dir, word)?;
    match matches.as_slice() {
        [] => Ok(Completion::Unchanged),
        [only] => Ok(Completion::Replaced(replace_word(buffer, split, only))),
        _ => {
            let common = longest_common_prefix(&matches);
            if common.len() > word.len() {
                Ok(Completion::Replaced(replace_word(buffer, split, &common)))
            } else {
                Ok(Completion::Ambiguous(CompletionState {
                    prefix: word.to_string(),
                    candidates: matches,
                    split,
                }))
            }
        }
    }
}
