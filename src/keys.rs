//! Virtual key codes
//!
//! `read_key` reports keys as Win32 virtual key codes on every backend, so
//! terminal key events are translated into the same numbering.

use crossterm::event::KeyCode;

pub const VK_BACK: u16 = 0x08;
pub const VK_TAB: u16 = 0x09;
pub const VK_RETURN: u16 = 0x0D;
pub const VK_ESCAPE: u16 = 0x1B;
pub const VK_SPACE: u16 = 0x20;
pub const VK_PRIOR: u16 = 0x21;
pub const VK_NEXT: u16 = 0x22;
pub const VK_END: u16 = 0x23;
pub const VK_HOME: u16 = 0x24;
pub const VK_LEFT: u16 = 0x25;
pub const VK_UP: u16 = 0x26;
pub const VK_RIGHT: u16 = 0x27;
pub const VK_DOWN: u16 = 0x28;
pub const VK_INSERT: u16 = 0x2D;
pub const VK_DELETE: u16 = 0x2E;
/// `0`..`9` are 0x30..0x39, `A`..`Z` are 0x41..0x5A
pub const VK_0: u16 = 0x30;
pub const VK_A: u16 = 0x41;
/// F1..F24 are 0x70..0x87
pub const VK_F1: u16 = 0x70;

/// Map a crossterm key code to a virtual key code (0 = no equivalent)
pub fn virtual_key(code: KeyCode) -> u16 {
    match code {
        KeyCode::Backspace => VK_BACK,
        KeyCode::Tab | KeyCode::BackTab => VK_TAB,
        KeyCode::Enter => VK_RETURN,
        KeyCode::Esc => VK_ESCAPE,
        KeyCode::PageUp => VK_PRIOR,
        KeyCode::PageDown => VK_NEXT,
        KeyCode::End => VK_END,
        KeyCode::Home => VK_HOME,
        KeyCode::Left => VK_LEFT,
        KeyCode::Up => VK_UP,
        KeyCode::Right => VK_RIGHT,
        KeyCode::Down => VK_DOWN,
        KeyCode::Insert => VK_INSERT,
        KeyCode::Delete => VK_DELETE,
        KeyCode::F(n @ 1..=24) => VK_F1 + u16::from(n) - 1,
        KeyCode::Char(ch) => char_key(ch),
        _ => 0,
    }
}

fn char_key(ch: char) -> u16 {
    match ch {
        ' ' => VK_SPACE,
        '0'..='9' => VK_0 + (ch as u16 - '0' as u16),
        'a'..='z' => VK_A + (ch as u16 - 'a' as u16),
        'A'..='Z' => VK_A + (ch as u16 - 'A' as u16),
        _ => 0,
    }
}
