//! Platform console services.
//!
//! The session never talks to the operating system directly; it drives a
//! [`ConsoleBackend`]. Three backends are provided:
//!
//! - **win32**: Win32 console API (`cfg(windows)`)
//! - **terminal**: crossterm on any ANSI terminal, with a shadow buffer
//! - **memory**: an in-memory console that follows the Win32 rules
//!
//! # Coordinates
//!
//! All positions are buffer coordinates. The window is assumed to sit at
//! the top-left corner of the buffer.

use std::io;

use bitflags::bitflags;

use crate::color::Attribute;
use crate::geometry::{Coord, Size};

pub mod memory;
pub mod terminal;
#[cfg(windows)]
pub mod win32;

pub use memory::MemoryConsole;
pub use terminal::TerminalConsole;
#[cfg(windows)]
pub use win32::WinConsole;

bitflags! {
    /// Console input mode flags (Win32 numbering)
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct InputMode: u32 {
        const PROCESSED_INPUT = 0x0001;
        const LINE_INPUT      = 0x0002;
        const ECHO_INPUT      = 0x0004;
        const WINDOW_INPUT    = 0x0008;
        const MOUSE_INPUT     = 0x0010;
        const INSERT_MODE     = 0x0020;
        const QUICK_EDIT_MODE = 0x0040;
        const EXTENDED_FLAGS  = 0x0080;
        const VIRTUAL_TERMINAL_INPUT = 0x0200;
    }
}

impl Default for InputMode {
    /// Mode of a freshly allocated console
    fn default() -> Self {
        InputMode::PROCESSED_INPUT
            | InputMode::LINE_INPUT
            | InputMode::ECHO_INPUT
            | InputMode::MOUSE_INPUT
            | InputMode::INSERT_MODE
            | InputMode::QUICK_EDIT_MODE
            | InputMode::EXTENDED_FLAGS
    }
}

/// How the backend came by its console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    /// The process already had a console; it must be left attached.
    Inherited,
    /// The backend allocated a console and must free it on detach.
    Allocated,
}

/// One character cell of the screen buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub attribute: Attribute,
    /// UTF-16 code unit with no `char` of its own (half of a surrogate
    /// pair); `ch` is U+FFFD then. Kept so a read/write round trip is lossless.
    pub unit: Option<u16>,
}

impl Cell {
    pub const fn new(ch: char, attribute: Attribute) -> Self {
        Self { ch, attribute, unit: None }
    }

    pub const fn blank(attribute: Attribute) -> Self {
        Self::new(' ', attribute)
    }

    /// Cell from a raw UTF-16 code unit as stored by the console
    pub fn from_utf16(unit: u16, attribute: Attribute) -> Self {
        match char::from_u32(u32::from(unit)) {
            Some(ch) => Self::new(ch, attribute),
            None => Self {
                ch: char::REPLACEMENT_CHARACTER,
                attribute,
                unit: Some(unit),
            },
        }
    }

    /// The code unit to store back into the console
    pub fn utf16_unit(&self) -> u16 {
        self.unit.unwrap_or_else(|| utf16_unit(self.ch))
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::blank(Attribute::default())
    }
}

/// Single UTF-16 code unit for `ch`; characters needing a surrogate pair
/// become '?'
pub(crate) fn utf16_unit(ch: char) -> u16 {
    let mut units = [0u16; 2];
    match ch.encode_utf16(&mut units) {
        [unit] => *unit,
        _ => u16::from(b'?'),
    }
}

/// Snapshot of the output buffer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenInfo {
    pub buffer: Size,
    pub window: Size,
    pub cursor: Coord,
    pub attribute: Attribute,
}

/// Keyboard input record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRecord {
    pub key_down: bool,
    pub virtual_key: u16,
    pub ch: Option<char>,
}

impl KeyRecord {
    pub const fn pressed(virtual_key: u16, ch: Option<char>) -> Self {
        Self { key_down: true, virtual_key, ch }
    }

    pub const fn released(virtual_key: u16, ch: Option<char>) -> Self {
        Self { key_down: false, virtual_key, ch }
    }
}

/// One record from the console input queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Key(KeyRecord),
    Resize(Size),
    /// Mouse, focus and menu records; the session ignores them
    Other,
}

/// The platform's text-console service.
///
/// Every method is a single blocking call. Methods other than `attach`
/// may only be called between a successful `attach` and `detach`.
pub trait ConsoleBackend {
    /// Acquire the standard input/output handles, allocating a console
    /// when the process has none.
    fn attach(&mut self) -> io::Result<Attachment>;

    /// Release the handles; frees the console only if it was allocated.
    fn detach(&mut self, attachment: Attachment) -> io::Result<()>;

    fn input_mode(&mut self) -> io::Result<InputMode>;
    fn set_input_mode(&mut self, mode: InputMode) -> io::Result<()>;

    fn screen_info(&mut self) -> io::Result<ScreenInfo>;
    fn largest_window_size(&mut self) -> io::Result<Size>;
    /// Resize the window, anchored at the buffer origin
    fn set_window_size(&mut self, size: Size) -> io::Result<()>;
    fn set_buffer_size(&mut self, size: Size) -> io::Result<()>;

    fn set_cursor_position(&mut self, position: Coord) -> io::Result<()>;
    /// `size` is a percentage of the cell height (1..=100)
    fn set_cursor_info(&mut self, size: u8, visible: bool) -> io::Result<()>;

    fn set_title(&mut self, title: &str) -> io::Result<()>;
    fn set_window_visible(&mut self, visible: bool) -> io::Result<()>;

    /// Attribute for text written by `write_text` and echoed input
    fn set_text_attribute(&mut self, attribute: Attribute) -> io::Result<()>;
    /// Write at the cursor, advancing it; returns characters written
    fn write_text(&mut self, text: &str) -> io::Result<usize>;

    /// Fill `count` cells from `start` with `ch`, leaving attributes alone
    fn fill_characters(&mut self, ch: char, count: usize, start: Coord) -> io::Result<usize>;
    /// Fill `count` cells from `start` with `attribute`, leaving characters alone
    fn fill_attribute(
        &mut self,
        attribute: Attribute,
        count: usize,
        start: Coord,
    ) -> io::Result<usize>;
    /// Read `count` cells from `start`, wrapping at the buffer width
    fn read_cells(&mut self, start: Coord, count: usize) -> io::Result<Vec<Cell>>;
    /// Write cells from `start`, wrapping at the buffer width
    fn write_cells(&mut self, start: Coord, cells: &[Cell]) -> io::Result<usize>;

    /// Read one line into `buf`, at most `capacity` characters including
    /// the line terminator, which is left in place.
    fn read_line(&mut self, buf: &mut String, capacity: usize) -> io::Result<usize>;
    /// Number of unread input records
    fn pending_events(&mut self) -> io::Result<usize>;
    /// Remove and return the oldest input record
    fn read_event(&mut self) -> io::Result<InputEvent>;
}

impl<B: ConsoleBackend + ?Sized> ConsoleBackend for Box<B> {
    fn attach(&mut self) -> io::Result<Attachment> {
        (**self).attach()
    }

    fn detach(&mut self, attachment: Attachment) -> io::Result<()> {
        (**self).detach(attachment)
    }

    fn input_mode(&mut self) -> io::Result<InputMode> {
        (**self).input_mode()
    }

    fn set_input_mode(&mut self, mode: InputMode) -> io::Result<()> {
        (**self).set_input_mode(mode)
    }

    fn screen_info(&mut self) -> io::Result<ScreenInfo> {
        (**self).screen_info()
    }

    fn largest_window_size(&mut self) -> io::Result<Size> {
        (**self).largest_window_size()
    }

    fn set_window_size(&mut self, size: Size) -> io::Result<()> {
        (**self).set_window_size(size)
    }

    fn set_buffer_size(&mut self, size: Size) -> io::Result<()> {
        (**self).set_buffer_size(size)
    }

    fn set_cursor_position(&mut self, position: Coord) -> io::Result<()> {
        (**self).set_cursor_position(position)
    }

    fn set_cursor_info(&mut self, size: u8, visible: bool) -> io::Result<()> {
        (**self).set_cursor_info(size, visible)
    }

    fn set_title(&mut self, title: &str) -> io::Result<()> {
        (**self).set_title(title)
    }

    fn set_window_visible(&mut self, visible: bool) -> io::Result<()> {
        (**self).set_window_visible(visible)
    }

    fn set_text_attribute(&mut self, attribute: Attribute) -> io::Result<()> {
        (**self).set_text_attribute(attribute)
    }

    fn write_text(&mut self, text: &str) -> io::Result<usize> {
        (**self).write_text(text)
    }

    fn fill_characters(&mut self, ch: char, count: usize, start: Coord) -> io::Result<usize> {
        (**self).fill_characters(ch, count, start)
    }

    fn fill_attribute(
        &mut self,
        attribute: Attribute,
        count: usize,
        start: Coord,
    ) -> io::Result<usize> {
        (**self).fill_attribute(attribute, count, start)
    }

    fn read_cells(&mut self, start: Coord, count: usize) -> io::Result<Vec<Cell>> {
        (**self).read_cells(start, count)
    }

    fn write_cells(&mut self, start: Coord, cells: &[Cell]) -> io::Result<usize> {
        (**self).write_cells(start, cells)
    }

    fn read_line(&mut self, buf: &mut String, capacity: usize) -> io::Result<usize> {
        (**self).read_line(buf, capacity)
    }

    fn pending_events(&mut self) -> io::Result<usize> {
        (**self).pending_events()
    }

    fn read_event(&mut self) -> io::Result<InputEvent> {
        (**self).read_event()
    }
}

/// Backend for the current host: Win32 on Windows, crossterm elsewhere.
#[cfg(windows)]
pub fn native() -> Box<dyn ConsoleBackend> {
    Box::new(WinConsole::new())
}

/// Backend for the current host: Win32 on Windows, crossterm elsewhere.
#[cfg(not(windows))]
pub fn native() -> Box<dyn ConsoleBackend> {
    Box::new(TerminalConsole::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_keeps_surrogate_halves() {
        let attribute = Attribute::default();
        // U+1F600 is stored as 0xD83D 0xDE00
        for unit in [0xD83D, 0xDE00] {
            let cell = Cell::from_utf16(unit, attribute);
            assert_eq!(cell.ch, char::REPLACEMENT_CHARACTER);
            assert_eq!(cell.utf16_unit(), unit);

            let repainted = Cell {
                attribute: attribute.with_background(crate::color::ConsoleColor::DarkBlue),
                ..cell
            };
            assert_eq!(repainted.utf16_unit(), unit);
        }
    }

    #[test]
    fn test_cell_from_plain_unit() {
        let cell = Cell::from_utf16(0x41, Attribute::default());
        assert_eq!(cell, Cell::new('A', Attribute::default()));
        assert_eq!(cell.utf16_unit(), 0x41);
    }

    #[test]
    fn test_utf16_unit() {
        assert_eq!(utf16_unit('A'), 0x41);
        assert_eq!(utf16_unit('\u{1F600}'), u16::from(b'?'));
    }
}
