/// Append-only sequence of display lines owned by one session.
///
/// The scroll offset counts lines back from the newest one; `0` means the
/// view follows the tail of the log.
#[derive(Debug, Default, Clone)]
pub struct OutputLog {
    lines: Vec<String>,
    scroll: usize,
}

impl OutputLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Append captured text split on line boundaries.
    ///
    /// An unterminated final line is still appended; a trailing newline does
    /// not produce an extra empty line.
    pub fn push_text(&mut self, text: &str) {
        for line in text.lines() {
            self.lines.push(line.to_string());
        }
    }

    /// Overwrite the most recent line, or append when the log is empty.
    pub fn replace_last(&mut self, line: impl Into<String>) {
        match self.lines.last_mut() {
            Some(last) => *last = line.into(),
            None => self.lines.push(line.into()),
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.scroll = 0;
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn last(&self) -> Option<&str> {
        self.lines.last().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll
    }

    /// Move the view; positive values scroll towards older lines.
    pub fn scroll_by(&mut self, delta: isize) {
        let target = self.scroll.saturating_add_signed(delta);
        self.scroll = target.min(self.lines.len());
    }

    /// Snap the view back to the newest line.
    pub fn follow_tail(&mut self) {
        self.scroll = 0;
    }
}
