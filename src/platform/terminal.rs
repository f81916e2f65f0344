//! crossterm console backend
//!
//! ANSI terminals have no readable screen buffer, so every operation is
//! applied to a shadow [`MemoryConsole`] first and then rendered to stdout.
//! Bulk reads (`read_cells`) are answered from the shadow.
//!
//! The terminal decides its own size; window resizes are requested with
//! `SetSize` but terminals are free to ignore them.

use std::io::{self, Stdout, Write};
use std::time::Duration;

use crossterm::cursor::{Hide, MoveTo, SetCursorStyle, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Print, ResetColor, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{self, SetSize, SetTitle};
use crossterm::tty::IsTty;
use crossterm::{execute, queue};
use tracing::debug;

use super::{Attachment, Cell, ConsoleBackend, InputEvent, InputMode, KeyRecord, MemoryConsole, ScreenInfo};
use crate::color::Attribute;
use crate::geometry::{Coord, Size};
use crate::keys;

/// Console backend for ANSI terminals
pub struct TerminalConsole {
    shadow: MemoryConsole,
    out: Stdout,
    raw_mode: bool,
}

impl Default for TerminalConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalConsole {
    pub fn new() -> Self {
        Self {
            shadow: MemoryConsole::new(),
            out: io::stdout(),
            raw_mode: false,
        }
    }

    /// The shadow buffer mirroring what was drawn
    pub fn shadow(&self) -> &MemoryConsole {
        &self.shadow
    }

    /// First buffer row shown in the window
    fn viewport_top(&self) -> u16 {
        let window = self.shadow.window();
        self.shadow
            .cursor()
            .y
            .saturating_sub(window.height.saturating_sub(1))
    }

    fn queue_attribute(&mut self, attribute: Attribute) -> io::Result<()> {
        queue!(
            self.out,
            SetForegroundColor(attribute.foreground().to_crossterm()),
            SetBackgroundColor(attribute.background().to_crossterm())
        )
    }

    fn queue_cursor(&mut self) -> io::Result<()> {
        let cursor = self.shadow.cursor();
        let top = self.viewport_top();
        queue!(self.out, MoveTo(cursor.x, cursor.y - top))
    }

    /// Redraw the visible window from the shadow buffer
    fn repaint(&mut self) -> io::Result<()> {
        let window = self.shadow.window();
        let buffer = self.shadow.buffer();
        let top = self.viewport_top();
        let rows = window.height.min(buffer.height - top);

        let mut last: Option<Attribute> = None;
        for row in 0..rows {
            queue!(self.out, MoveTo(0, row))?;
            for x in 0..window.width.min(buffer.width) {
                let cell = self.shadow.cell(Coord::new(x, top + row));
                if last != Some(cell.attribute) {
                    self.queue_attribute(cell.attribute)?;
                    last = Some(cell.attribute);
                }
                queue!(self.out, Print(cell.ch))?;
            }
        }

        let current = self.shadow.attribute();
        self.queue_attribute(current)?;
        self.queue_cursor()?;
        self.out.flush()
    }

    /// Collect a line from key events; raw mode has no line discipline.
    /// Typed characters are shown only when the mode echoes.
    fn read_raw_line(&mut self) -> io::Result<String> {
        let echo = self.shadow.mode().contains(InputMode::ECHO_INPUT);
        let mut line = String::new();
        loop {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            let before = line.chars().count();
            if edit_line(&mut line, key) {
                break;
            }
            if echo {
                let after = line.chars().count();
                if after > before {
                    let typed = line.chars().last().unwrap_or(' ');
                    queue!(self.out, Print(typed))?;
                } else if after < before {
                    queue!(self.out, Print("\u{8} \u{8}"))?;
                }
                self.out.flush()?;
            }
        }
        if echo {
            execute!(self.out, Print("\r\n"))?;
        }
        Ok(line)
    }

    fn set_raw_mode(&mut self, raw: bool) -> io::Result<()> {
        if raw == self.raw_mode {
            return Ok(());
        }
        if raw {
            terminal::enable_raw_mode()?;
        } else {
            terminal::disable_raw_mode()?;
        }
        self.raw_mode = raw;
        Ok(())
    }
}

/// Whether `mode` needs raw mode; the terminal's own line discipline is
/// only used when it both buffers and echoes lines.
fn needs_raw_mode(mode: InputMode) -> bool {
    !mode.contains(InputMode::LINE_INPUT | InputMode::ECHO_INPUT)
}

/// Apply one key event to a line being typed in raw mode.
/// Returns true when the line is complete.
fn edit_line(line: &mut String, key: KeyEvent) -> bool {
    if key.kind == KeyEventKind::Release {
        return false;
    }
    let control = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Enter => return true,
        KeyCode::Char('j' | 'm') if control => return true,
        KeyCode::Backspace => {
            line.pop();
        }
        KeyCode::Tab => line.push('\t'),
        KeyCode::Char(ch) if !control => line.push(ch),
        _ => {}
    }
    false
}

/// Cursor shape closest to a size given as a percentage of the cell height
fn cursor_style(size: u8) -> SetCursorStyle {
    if size <= 50 {
        SetCursorStyle::SteadyUnderScore
    } else {
        SetCursorStyle::SteadyBlock
    }
}

fn key_record(code: KeyCode, kind: KeyEventKind) -> KeyRecord {
    let ch = match code {
        KeyCode::Char(ch) => Some(ch),
        KeyCode::Enter => Some('\r'),
        KeyCode::Tab => Some('\t'),
        _ => None,
    };
    KeyRecord {
        key_down: kind != KeyEventKind::Release,
        virtual_key: keys::virtual_key(code),
        ch,
    }
}

impl ConsoleBackend for TerminalConsole {
    fn attach(&mut self) -> io::Result<Attachment> {
        if !self.out.is_tty() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "stdout is not a terminal"));
        }
        let (cols, rows) = terminal::size()?;
        debug!("Terminal size: {}x{}", cols, rows);

        self.shadow = MemoryConsole::with_largest(Size::new(cols, rows));
        self.shadow.attach()?;
        self.repaint()?;
        Ok(Attachment::Inherited)
    }

    fn detach(&mut self, attachment: Attachment) -> io::Result<()> {
        self.set_raw_mode(false)?;
        execute!(self.out, ResetColor, Show)?;
        self.shadow.detach(attachment)
    }

    fn input_mode(&mut self) -> io::Result<InputMode> {
        self.shadow.input_mode()
    }

    fn set_input_mode(&mut self, mode: InputMode) -> io::Result<()> {
        self.shadow.set_input_mode(mode)?;
        self.set_raw_mode(needs_raw_mode(mode))
    }

    fn screen_info(&mut self) -> io::Result<ScreenInfo> {
        self.shadow.screen_info()
    }

    fn largest_window_size(&mut self) -> io::Result<Size> {
        let (cols, rows) = terminal::size()?;
        let largest = Size::new(cols, rows);
        self.shadow.set_largest(largest);
        Ok(largest)
    }

    fn set_window_size(&mut self, size: Size) -> io::Result<()> {
        self.shadow.set_window_size(size)?;
        execute!(self.out, SetSize(size.width, size.height))?;
        self.repaint()
    }

    fn set_buffer_size(&mut self, size: Size) -> io::Result<()> {
        self.shadow.set_buffer_size(size)
    }

    fn set_cursor_position(&mut self, position: Coord) -> io::Result<()> {
        self.shadow.set_cursor_position(position)?;
        self.queue_cursor()?;
        self.out.flush()
    }

    fn set_cursor_info(&mut self, size: u8, visible: bool) -> io::Result<()> {
        self.shadow.set_cursor_info(size, visible)?;
        queue!(self.out, cursor_style(size))?;
        if visible {
            queue!(self.out, Show)?;
        } else {
            queue!(self.out, Hide)?;
        }
        self.out.flush()
    }

    fn set_title(&mut self, title: &str) -> io::Result<()> {
        self.shadow.set_title(title)?;
        execute!(self.out, SetTitle(title))
    }

    fn set_window_visible(&mut self, _visible: bool) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "terminal window visibility is controlled by the terminal emulator",
        ))
    }

    fn set_text_attribute(&mut self, attribute: Attribute) -> io::Result<()> {
        self.shadow.set_text_attribute(attribute)?;
        self.queue_attribute(attribute)
    }

    fn write_text(&mut self, text: &str) -> io::Result<usize> {
        let top = self.viewport_top();
        let wraps = self.shadow.wrap_count();
        let written = self.shadow.write_text(text)?;
        if self.viewport_top() != top || self.shadow.wrap_count() != wraps {
            // The shadow scrolled or wrapped at its own width, which the
            // terminal may not share; draw it as it is now
            return self.repaint().map(|_| written);
        }
        queue!(self.out, Print(text))?;
        self.out.flush()?;
        Ok(written)
    }

    fn fill_characters(&mut self, ch: char, count: usize, start: Coord) -> io::Result<usize> {
        let filled = self.shadow.fill_characters(ch, count, start)?;
        self.repaint()?;
        Ok(filled)
    }

    fn fill_attribute(
        &mut self,
        attribute: Attribute,
        count: usize,
        start: Coord,
    ) -> io::Result<usize> {
        let filled = self.shadow.fill_attribute(attribute, count, start)?;
        self.repaint()?;
        Ok(filled)
    }

    fn read_cells(&mut self, start: Coord, count: usize) -> io::Result<Vec<Cell>> {
        self.shadow.read_cells(start, count)
    }

    fn write_cells(&mut self, start: Coord, cells: &[Cell]) -> io::Result<usize> {
        let written = self.shadow.write_cells(start, cells)?;
        self.repaint()?;
        Ok(written)
    }

    fn read_line(&mut self, buf: &mut String, capacity: usize) -> io::Result<usize> {
        self.out.flush()?;
        let line = if self.raw_mode {
            self.read_raw_line()?
        } else {
            let mut line = String::new();
            if io::stdin().read_line(&mut line)? == 0 {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"));
            }
            line
        };

        // Replay the line into the shadow so the cursor and buffer stay in
        // step with what the terminal shows.
        self.shadow.push_line(line.trim_end_matches(['\r', '\n']));
        self.shadow.read_line(buf, capacity)
    }

    fn pending_events(&mut self) -> io::Result<usize> {
        Ok(usize::from(event::poll(Duration::ZERO)?))
    }

    fn read_event(&mut self) -> io::Result<InputEvent> {
        Ok(match event::read()? {
            Event::Key(key) => InputEvent::Key(key_record(key.code, key.kind)),
            Event::Resize(cols, rows) => InputEvent::Resize(Size::new(cols, rows)),
            _ => InputEvent::Other,
        })
    }
}
