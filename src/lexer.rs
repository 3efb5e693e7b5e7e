//! Lexical helpers for the command line: pipeline splitting, word splitting,
//! redirection markers and the `multiWatch` list literal.
//!
//! There is no quoting or expansion. The only escape understood is `\|`,
//! which keeps a literal pipe character inside a stage.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SplitState {
    Plain,
    Escaped,
}

/// Finite state machine that cuts a line into pipeline stages.
struct StageSplitter {
    input: Vec<char>,
    pos: usize,
    state: SplitState,
    buffer: String,
}

impl StageSplitter {
    fn new(line: &str) -> Self {
        StageSplitter {
            input: line.chars().collect(),
            pos: 0,
            state: SplitState::Plain,
            buffer: String::new(),
        }
    }

    /// Consume the input and return every stage, trimmed.
    ///
    /// A line without separators yields exactly one stage; `k` separators
    /// yield `k + 1` stages, some of which may be empty.
    fn split(mut self) -> Vec<String> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                SplitState::Plain => self.handle_plain(ch, &mut out),
                SplitState::Escaped => self.handle_escaped(ch),
            }
        }

        // A dangling backslash is kept as typed.
        if self.state == SplitState::Escaped {
            self.buffer.push('\\');
        }
        out.push(self.take_stage());
        out
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn handle_plain(&mut self, ch: char, out: &mut Vec<String>) {
        match ch {
            '\\' => self.state = SplitState::Escaped,
            '|' => out.push(self.take_stage()),
            c => self.buffer.push(c),
        }
    }

    fn handle_escaped(&mut self, ch: char) {
        match ch {
            '|' => self.buffer.push('|'),
            c => {
                self.buffer.push('\\');
                self.buffer.push(c);
            }
        }
        self.state = SplitState::Plain;
    }

    fn take_stage(&mut self) -> String {
        let stage = std::mem::take(&mut self.buffer);
        stage.trim().to_string()
    }
}

/// Split a command line on unescaped `|`.
pub fn split_stages(line: &str) -> Vec<String> {
    StageSplitter::new(line).split()
}

/// Whitespace tokenization used for every stage.
pub fn split_words(stage: &str) -> Vec<String> {
    stage.split_whitespace().map(str::to_string).collect()
}

/// A single command with its redirection targets cut out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redirects<'a> {
    pub command: &'a str,
    pub input: Option<&'a str>,
    pub output: Option<&'a str>,
}

/// Locate `<` and `>` in a single command.
///
/// The `<` target is everything after the first `<`, cut short at a later
/// `>`; the `>` target is everything after the first `>`, cut short at a
/// later `<`. The command is whatever precedes the first marker.
pub fn split_redirects(line: &str) -> Redirects<'_> {
    let lt = line.find('<');
    let gt = line.find('>');

    let target = |at: usize, other: Option<usize>| {
        let end = match other {
            Some(o) if o > at => o,
            _ => line.len(),
        };
        line[at + 1..end].trim()
    };

    let command_end = match (lt, gt) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) | (None, Some(a)) => a,
        (None, None) => line.len(),
    };

    Redirects {
        command: line[..command_end].trim(),
        input: lt.map(|at| target(at, gt)),
        output: gt.map(|at| target(at, lt)),
    }
}

fn quoted_pattern() -> &'static Regex {
    static QUOTED: OnceLock<Regex> = OnceLock::new();
    QUOTED.get_or_init(|| Regex::new(r#""([^"]*)""#).expect("static pattern compiles"))
}

/// Extract the command strings of a `multiWatch [ "a", "b" ]` literal.
///
/// Only double quotes delimit commands; commas and other text between the
/// brackets are ignored, as is an unterminated trailing quote. Returns `None`
/// when the brackets are missing.
pub fn watch_list(line: &str) -> Option<Vec<String>> {
    let start = line.find('[')?;
    let end = start + line[start..].find(']')?;
    let body = &line[start + 1..end];

    Some(
        quoted_pattern()
            .captures_iter(body)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|cmd| !cmd.is_empty())
            .collect(),
    )
}
