//! Raw-mode terminal front-end built on crossterm.

use crate::editor::Mode;
use crate::session::Event;
use crate::workspace::{Control, EventPump, Workspace};
use anyhow::{Context, Result};
use crossterm::cursor::{MoveTo, Show};
use crossterm::event::{
    self, DisableBracketedPaste, EnableBracketedPaste, Event as TermEvent, KeyCode, KeyEvent,
    KeyEventKind, KeyModifiers,
};
use crossterm::style::Print;
use crossterm::terminal::{
    self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode,
    enable_raw_mode,
};
use std::io::{Stdout, Write, stdout};
use std::time::Duration;
use tracing::debug;

/// How long the idle loop waits for a key before checking again.
const IDLE_POLL: Duration = Duration::from_millis(250);

/// Lines moved by PageUp / PageDown.
const SCROLL_STEP: isize = 10;

/// Translate a key press into an edit event.
pub fn map_key(key: KeyEvent) -> Option<Event> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('a') => Some(Event::CursorHome),
            KeyCode::Char('e') => Some(Event::CursorEnd),
            KeyCode::Char('r') => Some(Event::ReverseSearch),
            KeyCode::Char('c') => Some(Event::Interrupt),
            KeyCode::Char('z') => Some(Event::Stop),
            KeyCode::Char('t') => Some(Event::NewSession),
            KeyCode::Char('w') => Some(Event::CloseSession),
            KeyCode::Char('n') | KeyCode::Tab => Some(Event::NextSession),
            _ => None,
        };
    }
    if key.modifiers.contains(KeyModifiers::ALT) {
        return match key.code {
            KeyCode::Char(c @ '1'..='9') => Some(Event::SwitchSession(c as usize - '1' as usize)),
            _ => None,
        };
    }

    match key.code {
        KeyCode::Char(c) => Some(Event::Insert(c)),
        KeyCode::Enter => Some(Event::AcceptLine),
        KeyCode::Esc => Some(Event::Cancel),
        KeyCode::Tab => Some(Event::Complete),
        KeyCode::Backspace => Some(Event::Backspace),
        KeyCode::Left => Some(Event::CursorLeft),
        KeyCode::Right => Some(Event::CursorRight),
        KeyCode::Home => Some(Event::CursorHome),
        KeyCode::End => Some(Event::CursorEnd),
        KeyCode::Up => Some(Event::HistoryOlder),
        KeyCode::Down => Some(Event::HistoryNewer),
        KeyCode::PageUp => Some(Event::Scroll(SCROLL_STEP)),
        KeyCode::PageDown => Some(Event::Scroll(-SCROLL_STEP)),
        _ => None,
    }
}

/// The tab strip: every session id, the focused one in brackets.
fn tab_strip(workspace: &Workspace) -> String {
    workspace
        .sessions()
        .iter()
        .enumerate()
        .map(|(i, session)| {
            let mark = if session.is_watching() { "*" } else { "" };
            if i == workspace.focus_index() {
                format!("[{}{mark}]", session.id())
            } else {
                format!(" {}{mark} ", session.id())
            }
        })
        .collect::<Vec<_>>()
        .join("")
}

/// Prompt line for the focused session and the cursor column on it.
fn prompt_line(workspace: &Workspace) -> (String, usize) {
    let session = workspace.focused();
    let input = session.input();
    match session.mode() {
        Mode::Normal => {
            let prompt = session.prompt();
            let shown = input.as_str().replace('\n', "\\n");
            let before = input.as_str()[..input.cursor()].replace('\n', "\\n");
            let col = prompt.chars().count() + before.chars().count();
            (format!("{prompt}{shown}"), col)
        }
        Mode::Searching(term) => {
            let prompt = "(reverse-i-search): ";
            let col = prompt.chars().count() + term.as_str()[..term.cursor()].chars().count();
            (format!("{prompt}{}", term.as_str()), col)
        }
        Mode::Selecting(state) => {
            let line = format!("select 1-{}: ", state.candidates.len());
            let col = line.chars().count();
            (line, col)
        }
    }
}

fn clip(line: &str, width: usize) -> String {
    line.chars().take(width).collect()
}

/// Owns the terminal for the lifetime of the interactive front-end.
pub struct Terminal {
    out: Stdout,
    raw: bool,
}

impl Terminal {
    /// Switch to raw mode on the alternate screen.
    pub fn enter() -> Result<Self> {
        enable_raw_mode().context("enable raw mode")?;
        let mut out = stdout();
        crossterm::execute!(out, EnterAlternateScreen, EnableBracketedPaste)
            .context("enter alternate screen")?;
        Ok(Self { out, raw: true })
    }

    /// Read keys and dispatch them until the workspace asks to quit.
    pub fn run(&mut self, workspace: &mut Workspace) -> Result<()> {
        self.redraw(workspace)?;
        loop {
            if !event::poll(IDLE_POLL).context("event poll")? {
                continue;
            }
            for ev in self.pending()? {
                if workspace.dispatch(ev, self)? == Control::Quit {
                    return Ok(());
                }
            }
            self.redraw(workspace)?;
        }
    }

    fn set_raw(&mut self, raw: bool) -> Result<()> {
        if self.raw == raw {
            return Ok(());
        }
        if raw {
            enable_raw_mode().context("enable raw mode")?;
        } else {
            disable_raw_mode().context("disable raw mode")?;
        }
        self.raw = raw;
        Ok(())
    }
}

impl EventPump for Terminal {
    fn pending(&mut self) -> Result<Vec<Event>> {
        self.set_raw(true)?;
        let mut events = Vec::new();
        while event::poll(Duration::ZERO).context("event poll drain")? {
            match event::read().context("event read")? {
                TermEvent::Key(key) if key.kind != KeyEventKind::Release => {
                    events.extend(map_key(key));
                }
                TermEvent::Paste(text) => events.push(Event::Paste(text)),
                other => debug!(?other, "ignored terminal event"),
            }
        }
        Ok(events)
    }

    fn redraw(&mut self, workspace: &Workspace) -> Result<()> {
        self.set_raw(true)?;
        let (width, height) = terminal::size().context("terminal size")?;
        let width = usize::from(width.max(1));
        let rows = usize::from(height.max(3)) - 2;

        crossterm::queue!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
        crossterm::queue!(self.out, Print(clip(&tab_strip(workspace), width)))?;

        let log = workspace.focused().log();
        let end = log.len() - log.scroll_offset().min(log.len());
        let start = end.saturating_sub(rows);
        for (row, line) in log.lines()[start..end].iter().enumerate() {
            let y = u16::try_from(row + 1).unwrap_or(u16::MAX);
            crossterm::queue!(self.out, MoveTo(0, y), Print(clip(line, width)))?;
        }

        let (prompt, col) = prompt_line(workspace);
        let prompt_row = height.saturating_sub(1);
        let col = u16::try_from(col.min(width - 1)).unwrap_or(u16::MAX);
        crossterm::queue!(
            self.out,
            MoveTo(0, prompt_row),
            Print(clip(&prompt, width)),
            MoveTo(col, prompt_row),
            Show
        )?;
        self.out.flush().context("flush terminal")?;
        Ok(())
    }

    fn suspend(&mut self) -> Result<()> {
        self.set_raw(false)
    }

    fn resume(&mut self) -> Result<()> {
        self.set_raw(true)
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        crossterm::execute!(self.out, DisableBracketedPaste, LeaveAlternateScreen).ok();
        if self.raw {
            disable_raw_mode().ok();
        }
    }
}
