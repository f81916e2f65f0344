//! In-memory console
//!
//! A cell grid that enforces the same geometry rules as the Win32 console:
//! the window must fit both the buffer and the largest displayable size,
//! and the buffer may never shrink below the window. Used by the tests and
//! as the shadow buffer of [`TerminalConsole`](super::TerminalConsole).

use std::collections::VecDeque;
use std::io;

use unicode_width::UnicodeWidthChar;

use super::{Attachment, Cell, ConsoleBackend, InputEvent, InputMode, KeyRecord, ScreenInfo};
use crate::color::Attribute;
use crate::geometry::{Coord, Size};

/// Largest size the Win32 console accepts for either dimension
const MAX_DIMENSION: u16 = i16::MAX as u16;
const TAB_WIDTH: u16 = 8;

/// Console held entirely in memory
#[derive(Debug, Clone)]
pub struct MemoryConsole {
    attached: bool,
    /// Whether the process owns a console before `attach`
    has_console: bool,
    largest: Size,
    window: Size,
    buffer: Size,
    cells: Vec<Cell>,
    cursor: Coord,
    attribute: Attribute,
    cursor_size: u8,
    cursor_visible: bool,
    title: String,
    window_visible: bool,
    mode: InputMode,
    lines: VecDeque<String>,
    events: VecDeque<InputEvent>,
    terminator: &'static str,
    reject_titles: bool,
    /// Operation name and the number of calls that still succeed
    failures: Vec<(&'static str, usize)>,
    /// Lines started by running off the right edge
    wraps: u64,
}

impl Default for MemoryConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConsole {
    /// An 80x25 console whose screen can grow to 120x50
    pub fn new() -> Self {
        Self::with_largest(Size::new(120, 50))
    }

    pub fn with_largest(largest: Size) -> Self {
        let window = Size::new(80, 25).min(largest);
        Self {
            attached: false,
            has_console: true,
            largest,
            window,
            buffer: window,
            cells: vec![Cell::default(); window.area()],
            cursor: Coord::ORIGIN,
            attribute: Attribute::default(),
            cursor_size: 25,
            cursor_visible: true,
            title: String::new(),
            window_visible: true,
            mode: InputMode::default(),
            lines: VecDeque::new(),
            events: VecDeque::new(),
            terminator: "\r\n",
            reject_titles: false,
            failures: Vec::new(),
            wraps: 0,
        }
    }

    /// Start without a console, so `attach` has to allocate one
    pub fn detached_process(mut self) -> Self {
        self.has_console = false;
        self
    }

    /// Line terminator appended to every line read
    pub fn with_terminator(mut self, terminator: &'static str) -> Self {
        self.terminator = terminator;
        self
    }

    pub fn with_input_mode(mut self, mode: InputMode) -> Self {
        self.mode = mode;
        self
    }

    /// Refuse title changes, like a console the process does not own
    pub fn rejecting_titles(mut self) -> Self {
        self.reject_titles = true;
        self
    }

    /// Make every call of the backend operation `op` (a `ConsoleBackend`
    /// method name such as `"set_window_size"`) fail
    pub fn failing(mut self, op: &'static str) -> Self {
        self.fail_after(op, 0);
        self
    }

    /// Let `successes` calls of `op` through, then fail every later one
    pub fn fail_after(&mut self, op: &'static str, successes: usize) {
        self.failures.retain(|(name, _)| *name != op);
        self.failures.push((op, successes));
    }

    /// Number of times text wrapped at the buffer's right edge
    pub fn wrap_count(&self) -> u64 {
        self.wraps
    }

    /// Change the largest displayable size (a font or monitor change)
    pub fn set_largest(&mut self, largest: Size) {
        self.largest = largest;
    }

    /// Queue a line of typed input (without terminator)
    pub fn push_line(&mut self, line: &str) {
        self.lines.push_back(line.to_string());
    }

    pub fn push_event(&mut self, event: InputEvent) {
        self.events.push_back(event);
    }

    /// Queue a key press followed by its release
    pub fn push_keystroke(&mut self, virtual_key: u16, ch: Option<char>) {
        self.push_event(InputEvent::Key(KeyRecord::pressed(virtual_key, ch)));
        self.push_event(InputEvent::Key(KeyRecord::released(virtual_key, ch)));
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn has_console(&self) -> bool {
        self.has_console
    }

    pub fn window(&self) -> Size {
        self.window
    }

    pub fn buffer(&self) -> Size {
        self.buffer
    }

    pub fn cursor(&self) -> Coord {
        self.cursor
    }

    pub fn attribute(&self) -> Attribute {
        self.attribute
    }

    pub fn cursor_info(&self) -> (u8, bool) {
        (self.cursor_size, self.cursor_visible)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_window_visible(&self) -> bool {
        self.window_visible
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn cell(&self, at: Coord) -> Cell {
        self.cells[at.index(self.buffer.width)]
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Characters of row `y`, trailing blanks removed
    pub fn row_text(&self, y: u16) -> String {
        let start = Coord::new(0, y).index(self.buffer.width);
        let row = &self.cells[start..start + self.buffer.width as usize];
        let text: String = row.iter().map(|cell| cell.ch).collect();
        text.trim_end().to_string()
    }

    fn ensure_attached(&self) -> io::Result<()> {
        if self.attached {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::NotConnected, "console is not attached"))
        }
    }

    fn check_failure(&mut self, op: &'static str) -> io::Result<()> {
        match self.failures.iter_mut().find(|(name, _)| *name == op) {
            Some((_, 0)) => Err(io::Error::new(io::ErrorKind::Other, format!("{} failed", op))),
            Some((_, successes)) => {
                *successes -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Linear index of `at`, rejecting positions outside the buffer
    fn index_of(&self, at: Coord) -> io::Result<usize> {
        if at.x >= self.buffer.width || at.y >= self.buffer.height {
            return Err(invalid(format!("{:?} is outside the {} buffer", at, self.buffer)));
        }
        Ok(at.index(self.buffer.width))
    }

    fn line_feed(&mut self) {
        self.cursor.x = 0;
        if self.cursor.y + 1 < self.buffer.height {
            self.cursor.y += 1;
            return;
        }

        // Bottom of the buffer: scroll everything up one row
        let width = self.buffer.width as usize;
        self.cells.drain(..width);
        self.cells
            .extend(std::iter::repeat(Cell::blank(self.attribute)).take(width));
    }

    fn put_char(&mut self, ch: char) {
        let width = ch.width().unwrap_or(0) as u16;
        if width == 0 {
            return;
        }
        if self.cursor.x + width > self.buffer.width {
            self.wraps += 1;
            self.line_feed();
        }

        let index = self.cursor.index(self.buffer.width);
        self.cells[index] = Cell::new(ch, self.attribute);
        if width == 2 {
            self.cells[index + 1] = Cell::blank(self.attribute);
        }

        self.cursor.x += width;
        if self.cursor.x >= self.buffer.width {
            self.wraps += 1;
            self.line_feed();
        }
    }
}

impl ConsoleBackend for MemoryConsole {
    fn attach(&mut self) -> io::Result<Attachment> {
        if self.attached {
            return Err(io::Error::new(io::ErrorKind::AlreadyExists, "console already attached"));
        }
        self.attached = true;
        if self.has_console {
            Ok(Attachment::Inherited)
        } else {
            self.has_console = true;
            Ok(Attachment::Allocated)
        }
    }

    fn detach(&mut self, attachment: Attachment) -> io::Result<()> {
        self.ensure_attached()?;
        self.attached = false;
        if attachment == Attachment::Allocated {
            self.has_console = false;
        }
        Ok(())
    }

    fn input_mode(&mut self) -> io::Result<InputMode> {
        self.ensure_attached()?;
        self.check_failure("input_mode")?;
        Ok(self.mode)
    }

    fn set_input_mode(&mut self, mode: InputMode) -> io::Result<()> {
        self.ensure_attached()?;
        self.check_failure("set_input_mode")?;
        self.mode = mode;
        Ok(())
    }

    fn screen_info(&mut self) -> io::Result<ScreenInfo> {
        self.ensure_attached()?;
        self.check_failure("screen_info")?;
        Ok(ScreenInfo {
            buffer: self.buffer,
            window: self.window,
            cursor: self.cursor,
            attribute: self.attribute,
        })
    }

    fn largest_window_size(&mut self) -> io::Result<Size> {
        self.ensure_attached()?;
        Ok(self.largest)
    }

    fn set_window_size(&mut self, size: Size) -> io::Result<()> {
        self.ensure_attached()?;
        self.check_failure("set_window_size")?;
        if size.width == 0 || size.height == 0 {
            return Err(invalid(format!("window {} is empty", size)));
        }
        if !self.largest.contains(size) {
            return Err(invalid(format!("window {} exceeds largest {}", size, self.largest)));
        }
        if !self.buffer.contains(size) {
            return Err(invalid(format!("window {} exceeds buffer {}", size, self.buffer)));
        }
        self.window = size;
        Ok(())
    }

    fn set_buffer_size(&mut self, size: Size) -> io::Result<()> {
        self.ensure_attached()?;
        self.check_failure("set_buffer_size")?;
        if size.width == 0 || size.height == 0 {
            return Err(invalid(format!("buffer {} is empty", size)));
        }
        if size.width > MAX_DIMENSION || size.height > MAX_DIMENSION {
            return Err(invalid(format!("buffer {} is too large", size)));
        }
        if !size.contains(self.window) {
            return Err(invalid(format!("buffer {} is smaller than window {}", size, self.window)));
        }

        let mut cells = vec![Cell::default(); size.area()];
        let keep = size.min(self.buffer);
        for y in 0..keep.height {
            let from = Coord::new(0, y).index(self.buffer.width);
            let to = Coord::new(0, y).index(size.width);
            let width = keep.width as usize;
            cells[to..to + width].copy_from_slice(&self.cells[from..from + width]);
        }

        self.cells = cells;
        self.buffer = size;
        self.cursor.x = self.cursor.x.min(size.width - 1);
        self.cursor.y = self.cursor.y.min(size.height - 1);
        Ok(())
    }

    fn set_cursor_position(&mut self, position: Coord) -> io::Result<()> {
        self.ensure_attached()?;
        self.index_of(position)?;
        self.cursor = position;
        Ok(())
    }

    fn set_cursor_info(&mut self, size: u8, visible: bool) -> io::Result<()> {
        self.ensure_attached()?;
        if !(1..=100).contains(&size) {
            return Err(invalid(format!("cursor size {} is not in 1..=100", size)));
        }
        self.cursor_size = size;
        self.cursor_visible = visible;
        Ok(())
    }

    fn set_title(&mut self, title: &str) -> io::Result<()> {
        self.ensure_attached()?;
        if self.reject_titles {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "title change refused"));
        }
        self.title = title.to_string();
        Ok(())
    }

    fn set_window_visible(&mut self, visible: bool) -> io::Result<()> {
        self.ensure_attached()?;
        self.window_visible = visible;
        Ok(())
    }

    fn set_text_attribute(&mut self, attribute: Attribute) -> io::Result<()> {
        self.ensure_attached()?;
        self.attribute = attribute;
        Ok(())
    }

    fn write_text(&mut self, text: &str) -> io::Result<usize> {
        self.ensure_attached()?;
        let mut written = 0;
        for ch in text.chars() {
            match ch {
                '\r' => self.cursor.x = 0,
                '\n' => self.line_feed(),
                '\u{8}' => self.cursor.x = self.cursor.x.saturating_sub(1),
                '\t' => {
                    let stop = ((self.cursor.x / TAB_WIDTH + 1) * TAB_WIDTH).min(self.buffer.width);
                    for _ in self.cursor.x..stop {
                        self.put_char(' ');
                    }
                }
                _ => self.put_char(ch),
            }
            written += 1;
        }
        Ok(written)
    }

    fn fill_characters(&mut self, ch: char, count: usize, start: Coord) -> io::Result<usize> {
        self.ensure_attached()?;
        let start = self.index_of(start)?;
        let end = (start + count).min(self.cells.len());
        for cell in &mut self.cells[start..end] {
            *cell = Cell::new(ch, cell.attribute);
        }
        Ok(end - start)
    }

    fn fill_attribute(
        &mut self,
        attribute: Attribute,
        count: usize,
        start: Coord,
    ) -> io::Result<usize> {
        self.ensure_attached()?;
        let start = self.index_of(start)?;
        let end = (start + count).min(self.cells.len());
        for cell in &mut self.cells[start..end] {
            cell.attribute = attribute;
        }
        Ok(end - start)
    }

    fn read_cells(&mut self, start: Coord, count: usize) -> io::Result<Vec<Cell>> {
        self.ensure_attached()?;
        let start = self.index_of(start)?;
        let end = (start + count).min(self.cells.len());
        Ok(self.cells[start..end].to_vec())
    }

    fn write_cells(&mut self, start: Coord, cells: &[Cell]) -> io::Result<usize> {
        self.ensure_attached()?;
        let start = self.index_of(start)?;
        let end = (start + cells.len()).min(self.cells.len());
        self.cells[start..end].copy_from_slice(&cells[..end - start]);
        Ok(end - start)
    }

    fn read_line(&mut self, buf: &mut String, capacity: usize) -> io::Result<usize> {
        self.ensure_attached()?;
        let line = self
            .lines
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no pending input line"))?;

        let typed = format!("{}{}", line, self.terminator);
        if self.mode.contains(InputMode::ECHO_INPUT) {
            self.write_text(&typed)?;
        }

        let mut read = 0;
        for ch in typed.chars().take(capacity) {
            buf.push(ch);
            read += 1;
        }
        Ok(read)
    }

    fn pending_events(&mut self) -> io::Result<usize> {
        self.ensure_attached()?;
        Ok(self.events.len())
    }

    fn read_event(&mut self) -> io::Result<InputEvent> {
        self.ensure_attached()?;
        self.events
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::WouldBlock, "input queue is empty"))
    }
}

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, message)
}
