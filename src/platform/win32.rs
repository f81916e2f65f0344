//! Win32 console backend
//!
//! Thin wrapper over the Win32 console API. The standard handles belong to
//! the process and are never closed; only a console allocated by `attach`
//! is released again.

use std::ffi::c_void;
use std::io;

use tracing::debug;
use windows::core::{HSTRING, PCWSTR};
use windows::Win32::Foundation::{BOOL, HANDLE};
use windows::Win32::System::Console::{
    AllocConsole, FillConsoleOutputAttribute, FillConsoleOutputCharacterW, FreeConsole,
    GetConsoleMode, GetConsoleScreenBufferInfo, GetConsoleWindow, GetLargestConsoleWindowSize,
    GetNumberOfConsoleInputEvents, GetStdHandle, ReadConsoleInputW, ReadConsoleOutputAttribute,
    ReadConsoleOutputCharacterW, ReadConsoleW, SetConsoleCursorInfo, SetConsoleCursorPosition,
    SetConsoleMode, SetConsoleScreenBufferSize, SetConsoleTextAttribute, SetConsoleTitleW,
    SetConsoleWindowInfo, WriteConsoleOutputAttribute, WriteConsoleOutputCharacterW,
    WriteConsoleW, CONSOLE_CHARACTER_ATTRIBUTES, CONSOLE_CURSOR_INFO, CONSOLE_MODE,
    CONSOLE_SCREEN_BUFFER_INFO, COORD, INPUT_RECORD, KEY_EVENT, SMALL_RECT, STD_INPUT_HANDLE,
    STD_OUTPUT_HANDLE, WINDOW_BUFFER_SIZE_EVENT,
};
use windows::Win32::UI::WindowsAndMessaging::{ShowWindow, SW_HIDE, SW_SHOW};

use super::{
    utf16_unit, Attachment, Cell, ConsoleBackend, InputEvent, InputMode, KeyRecord, ScreenInfo,
};
use crate::color::Attribute;
use crate::geometry::{Coord, Size};

/// Win32 console handle pair
pub struct WinConsole {
    input: HANDLE,
    output: HANDLE,
    attached: bool,
}

impl Default for WinConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl WinConsole {
    pub fn new() -> Self {
        Self {
            input: HANDLE::default(),
            output: HANDLE::default(),
            attached: false,
        }
    }

    fn ensure_attached(&self) -> io::Result<()> {
        if self.attached {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::NotConnected, "console is not attached"))
        }
    }

    fn buffer_info(&self) -> io::Result<CONSOLE_SCREEN_BUFFER_INFO> {
        self.ensure_attached()?;
        let mut info = CONSOLE_SCREEN_BUFFER_INFO::default();
        unsafe {
            GetConsoleScreenBufferInfo(self.output, &mut info).map_err(win_error)?;
        }
        Ok(info)
    }
}

// Safety: the handles are process-wide console handles, usable from any thread
unsafe impl Send for WinConsole {}

fn win_error(e: windows::core::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

fn to_coord(x: u16, y: u16) -> io::Result<COORD> {
    let convert = |v: u16| {
        i16::try_from(v).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("{} exceeds console limits", v))
        })
    };
    Ok(COORD { X: convert(x)?, Y: convert(y)? })
}

fn from_coord(coord: COORD) -> (u16, u16) {
    (coord.X.max(0) as u16, coord.Y.max(0) as u16)
}

impl ConsoleBackend for WinConsole {
    fn attach(&mut self) -> io::Result<Attachment> {
        if self.attached {
            return Err(io::Error::new(io::ErrorKind::AlreadyExists, "console already attached"));
        }

        // AllocConsole fails when the process already has a console
        let attachment = unsafe {
            if AllocConsole().is_ok() {
                Attachment::Allocated
            } else {
                Attachment::Inherited
            }
        };
        debug!("Console attachment: {:?}", attachment);

        let handles = unsafe {
            GetStdHandle(STD_INPUT_HANDLE).and_then(|input| {
                GetStdHandle(STD_OUTPUT_HANDLE).map(|output| (input, output))
            })
        };
        match handles {
            Ok((input, output)) => {
                self.input = input;
                self.output = output;
                self.attached = true;
                Ok(attachment)
            }
            Err(e) => {
                if attachment == Attachment::Allocated {
                    unsafe {
                        let _ = FreeConsole();
                    }
                }
                Err(win_error(e))
            }
        }
    }

    fn detach(&mut self, attachment: Attachment) -> io::Result<()> {
        self.ensure_attached()?;
        self.attached = false;
        self.input = HANDLE::default();
        self.output = HANDLE::default();
        if attachment == Attachment::Allocated {
            unsafe {
                FreeConsole().map_err(win_error)?;
            }
        }
        Ok(())
    }

    fn input_mode(&mut self) -> io::Result<InputMode> {
        self.ensure_attached()?;
        let mut mode = CONSOLE_MODE(0);
        unsafe {
            GetConsoleMode(self.input, &mut mode).map_err(win_error)?;
        }
        Ok(InputMode::from_bits_retain(mode.0))
    }

    fn set_input_mode(&mut self, mode: InputMode) -> io::Result<()> {
        self.ensure_attached()?;
        unsafe { SetConsoleMode(self.input, CONSOLE_MODE(mode.bits())).map_err(win_error) }
    }

    fn screen_info(&mut self) -> io::Result<ScreenInfo> {
        let info = self.buffer_info()?;
        let (width, height) = from_coord(info.dwSize);
        let (x, y) = from_coord(info.dwCursorPosition);
        let window = &info.srWindow;
        Ok(ScreenInfo {
            buffer: Size::new(width, height),
            window: Size::new(
                (window.Right - window.Left + 1).max(0) as u16,
                (window.Bottom - window.Top + 1).max(0) as u16,
            ),
            cursor: Coord::new(x, y),
            attribute: Attribute::from_bits(info.wAttributes.0 as u8),
        })
    }

    fn largest_window_size(&mut self) -> io::Result<Size> {
        self.ensure_attached()?;
        let largest = unsafe { GetLargestConsoleWindowSize(self.output) };
        if largest.X == 0 && largest.Y == 0 {
            return Err(io::Error::last_os_error());
        }
        let (width, height) = from_coord(largest);
        Ok(Size::new(width, height))
    }

    fn set_window_size(&mut self, size: Size) -> io::Result<()> {
        self.ensure_attached()?;
        if size.width == 0 || size.height == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "window size is empty"));
        }
        let corner = to_coord(size.width - 1, size.height - 1)?;
        let rect = SMALL_RECT { Left: 0, Top: 0, Right: corner.X, Bottom: corner.Y };
        unsafe { SetConsoleWindowInfo(self.output, BOOL::from(true), &rect).map_err(win_error) }
    }

    fn set_buffer_size(&mut self, size: Size) -> io::Result<()> {
        self.ensure_attached()?;
        let size = to_coord(size.width, size.height)?;
        unsafe { SetConsoleScreenBufferSize(self.output, size).map_err(win_error) }
    }

    fn set_cursor_position(&mut self, position: Coord) -> io::Result<()> {
        self.ensure_attached()?;
        let position = to_coord(position.x, position.y)?;
        unsafe { SetConsoleCursorPosition(self.output, position).map_err(win_error) }
    }

    fn set_cursor_info(&mut self, size: u8, visible: bool) -> io::Result<()> {
        self.ensure_attached()?;
        let info = CONSOLE_CURSOR_INFO {
            dwSize: u32::from(size),
            bVisible: visible.into(),
        };
        unsafe { SetConsoleCursorInfo(self.output, &info).map_err(win_error) }
    }

    fn set_title(&mut self, title: &str) -> io::Result<()> {
        self.ensure_attached()?;
        let title = HSTRING::from(title);
        unsafe { SetConsoleTitleW(PCWSTR(title.as_ptr())).map_err(win_error) }
    }

    fn set_window_visible(&mut self, visible: bool) -> io::Result<()> {
        self.ensure_attached()?;
        let hwnd = unsafe { GetConsoleWindow() };
        if hwnd.0.is_null() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "console has no window"));
        }
        let command = if visible { SW_SHOW } else { SW_HIDE };
        // ShowWindow reports the previous visibility, not success
        unsafe {
            let _ = ShowWindow(hwnd, command);
        }
        Ok(())
    }

    fn set_text_attribute(&mut self, attribute: Attribute) -> io::Result<()> {
        self.ensure_attached()?;
        let attribute = CONSOLE_CHARACTER_ATTRIBUTES(u16::from(attribute.bits()));
        unsafe { SetConsoleTextAttribute(self.output, attribute).map_err(win_error) }
    }

    fn write_text(&mut self, text: &str) -> io::Result<usize> {
        self.ensure_attached()?;
        let wide: Vec<u16> = text.encode_utf16().collect();
        let mut written: u32 = 0;
        unsafe {
            WriteConsoleW(self.output, &wide, Some(&mut written as *mut u32), None).map_err(win_error)?;
        }
        Ok(written as usize)
    }

    fn fill_characters(&mut self, ch: char, count: usize, start: Coord) -> io::Result<usize> {
        self.ensure_attached()?;
        let start = to_coord(start.x, start.y)?;
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        let mut filled: u32 = 0;
        unsafe {
            FillConsoleOutputCharacterW(self.output, utf16_unit(ch), count, start, &mut filled)
                .map_err(win_error)?;
        }
        Ok(filled as usize)
    }

    fn fill_attribute(
        &mut self,
        attribute: Attribute,
        count: usize,
        start: Coord,
    ) -> io::Result<usize> {
        self.ensure_attached()?;
        let start = to_coord(start.x, start.y)?;
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        let mut filled: u32 = 0;
        unsafe {
            FillConsoleOutputAttribute(
                self.output,
                u16::from(attribute.bits()),
                count,
                start,
                &mut filled,
            )
            .map_err(win_error)?;
        }
        Ok(filled as usize)
    }

    fn read_cells(&mut self, start: Coord, count: usize) -> io::Result<Vec<Cell>> {
        self.ensure_attached()?;
        let start = to_coord(start.x, start.y)?;
        let mut chars = vec![0u16; count];
        let mut attributes = vec![0u16; count];
        let mut chars_read: u32 = 0;
        let mut attributes_read: u32 = 0;
        unsafe {
            ReadConsoleOutputCharacterW(self.output, &mut chars, start, &mut chars_read)
                .map_err(win_error)?;
            ReadConsoleOutputAttribute(self.output, &mut attributes, start, &mut attributes_read)
                .map_err(win_error)?;
        }

        let read = chars_read.min(attributes_read) as usize;
        Ok(chars[..read]
            .iter()
            .zip(&attributes[..read])
            .map(|(&unit, &attribute)| {
                Cell::from_utf16(unit, Attribute::from_bits(attribute as u8))
            })
            .collect())
    }

    fn write_cells(&mut self, start: Coord, cells: &[Cell]) -> io::Result<usize> {
        self.ensure_attached()?;
        let start = to_coord(start.x, start.y)?;
        let chars: Vec<u16> = cells.iter().map(Cell::utf16_unit).collect();
        let attributes: Vec<u16> = cells
            .iter()
            .map(|cell| u16::from(cell.attribute.bits()))
            .collect();
        let mut chars_written: u32 = 0;
        let mut attributes_written: u32 = 0;
        unsafe {
            WriteConsoleOutputAttribute(self.output, &attributes, start, &mut attributes_written)
                .map_err(win_error)?;
            WriteConsoleOutputCharacterW(self.output, &chars, start, &mut chars_written)
                .map_err(win_error)?;
        }
        Ok(chars_written.min(attributes_written) as usize)
    }

    fn read_line(&mut self, buf: &mut String, capacity: usize) -> io::Result<usize> {
        self.ensure_attached()?;
        let mut wide = vec![0u16; capacity];
        let mut read: u32 = 0;
        unsafe {
            ReadConsoleW(
                self.input,
                wide.as_mut_ptr() as *mut c_void,
                wide.len() as u32,
                &mut read,
                None,
            )
            .map_err(win_error)?;
        }
        let read = read as usize;
        buf.push_str(&String::from_utf16_lossy(&wide[..read]));
        Ok(read)
    }

    fn pending_events(&mut self) -> io::Result<usize> {
        self.ensure_attached()?;
        let mut count: u32 = 0;
        unsafe {
            GetNumberOfConsoleInputEvents(self.input, &mut count).map_err(win_error)?;
        }
        Ok(count as usize)
    }

    fn read_event(&mut self) -> io::Result<InputEvent> {
        self.ensure_attached()?;
        let mut records = [INPUT_RECORD::default()];
        let mut read: u32 = 0;
        unsafe {
            ReadConsoleInputW(self.input, &mut records, &mut read).map_err(win_error)?;
        }
        if read == 0 {
            return Err(io::Error::new(io::ErrorKind::WouldBlock, "no input record read"));
        }

        let record = &records[0];
        let event = match u32::from(record.EventType) {
            KEY_EVENT => {
                let key = unsafe { record.Event.KeyEvent };
                let unit = unsafe { key.uChar.UnicodeChar };
                InputEvent::Key(KeyRecord {
                    key_down: key.bKeyDown.as_bool(),
                    virtual_key: key.wVirtualKeyCode,
                    ch: char::from_u32(u32::from(unit)).filter(|&ch| ch != '\0'),
                })
            }
            WINDOW_BUFFER_SIZE_EVENT => {
                let (width, height) = from_coord(unsafe { record.Event.WindowBufferSizeEvent.dwSize });
                InputEvent::Resize(Size::new(width, height))
            }
            _ => InputEvent::Other,
        };
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coord_conversion() {
        let coord = to_coord(80, 300).unwrap();
        assert_eq!((coord.X, coord.Y), (80, 300));
        assert!(to_coord(40_000, 1).is_err());
        assert_eq!(from_coord(COORD { X: -1, Y: 5 }), (0, 5));
    }

    #[test]
    fn test_console_attach() {
        let mut console = WinConsole::new();
        let attachment = console.attach().unwrap();
        assert!(console.screen_info().is_ok());
        console.detach(attachment).unwrap();
    }
}
