//! Console colors and character attributes.
//!
//! A cell attribute packs two 4-bit colors into one byte:
//!
//! ```text
//!  7   6   5   4   3   2   1   0
//! +---+---+---+---+---+---+---+---+
//! | I | R | G | B | I | R | G | B |
//! +---+---+---+---+---+---+---+---+
//!   background      foreground
//! ```

use serde::{Deserialize, Serialize};

const BLUE: u8 = 0x1;
const GREEN: u8 = 0x2;
const RED: u8 = 0x4;
const INTENSITY: u8 = 0x8;

/// One of the 16 console colors.
///
/// The discriminant is the color's nibble value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum ConsoleColor {
    Black = 0,
    DarkBlue = BLUE,
    DarkGreen = GREEN,
    DarkAqua = GREEN | BLUE,
    DarkRed = RED,
    DarkPurple = RED | BLUE,
    DarkYellow = RED | GREEN,
    DarkWhite = RED | GREEN | BLUE,
    Grey = INTENSITY,
    Blue = INTENSITY | BLUE,
    Green = INTENSITY | GREEN,
    Aqua = INTENSITY | GREEN | BLUE,
    Red = INTENSITY | RED,
    Purple = INTENSITY | RED | BLUE,
    Yellow = INTENSITY | RED | GREEN,
    White = INTENSITY | RED | GREEN | BLUE,
}

impl ConsoleColor {
    /// All colors in nibble order.
    pub const ALL: [ConsoleColor; 16] = [
        ConsoleColor::Black,
        ConsoleColor::DarkBlue,
        ConsoleColor::DarkGreen,
        ConsoleColor::DarkAqua,
        ConsoleColor::DarkRed,
        ConsoleColor::DarkPurple,
        ConsoleColor::DarkYellow,
        ConsoleColor::DarkWhite,
        ConsoleColor::Grey,
        ConsoleColor::Blue,
        ConsoleColor::Green,
        ConsoleColor::Aqua,
        ConsoleColor::Red,
        ConsoleColor::Purple,
        ConsoleColor::Yellow,
        ConsoleColor::White,
    ];

    /// Color for the low nibble of `value`.
    pub const fn from_nibble(value: u8) -> Self {
        Self::ALL[(value & 0x0F) as usize]
    }

    pub const fn nibble(self) -> u8 {
        self as u8
    }

    /// Whether the intensity bit is set
    pub const fn is_bright(self) -> bool {
        self.nibble() & INTENSITY != 0
    }

    /// Name as used in configuration files
    pub fn name(self) -> &'static str {
        match self {
            ConsoleColor::Black => "black",
            ConsoleColor::DarkBlue => "dark-blue",
            ConsoleColor::DarkGreen => "dark-green",
            ConsoleColor::DarkAqua => "dark-aqua",
            ConsoleColor::DarkRed => "dark-red",
            ConsoleColor::DarkPurple => "dark-purple",
            ConsoleColor::DarkYellow => "dark-yellow",
            ConsoleColor::DarkWhite => "dark-white",
            ConsoleColor::Grey => "grey",
            ConsoleColor::Blue => "blue",
            ConsoleColor::Green => "green",
            ConsoleColor::Aqua => "aqua",
            ConsoleColor::Red => "red",
            ConsoleColor::Purple => "purple",
            ConsoleColor::Yellow => "yellow",
            ConsoleColor::White => "white",
        }
    }

    /// Look up a color by its configuration name (case-insensitive, `_` or `-`).
    pub fn by_name(name: &str) -> Option<Self> {
        let wanted = name.trim().to_lowercase().replace('_', "-");
        Self::ALL.into_iter().find(|color| color.name() == wanted)
    }

    /// Convert to crossterm Color
    pub fn to_crossterm(self) -> crossterm::style::Color {
        use crossterm::style::Color;

        match self {
            ConsoleColor::Black => Color::Black,
            ConsoleColor::DarkBlue => Color::DarkBlue,
            ConsoleColor::DarkGreen => Color::DarkGreen,
            ConsoleColor::DarkAqua => Color::DarkCyan,
            ConsoleColor::DarkRed => Color::DarkRed,
            ConsoleColor::DarkPurple => Color::DarkMagenta,
            ConsoleColor::DarkYellow => Color::DarkYellow,
            ConsoleColor::DarkWhite => Color::Grey,
            ConsoleColor::Grey => Color::DarkGrey,
            ConsoleColor::Blue => Color::Blue,
            ConsoleColor::Green => Color::Green,
            ConsoleColor::Aqua => Color::Cyan,
            ConsoleColor::Red => Color::Red,
            ConsoleColor::Purple => Color::Magenta,
            ConsoleColor::Yellow => Color::Yellow,
            ConsoleColor::White => Color::White,
        }
    }
}

/// Packed foreground/background pair for one character cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Attribute(u8);

impl Default for Attribute {
    /// Dark white on black, the console's power-on attribute.
    fn default() -> Self {
        Self::new(ConsoleColor::DarkWhite, ConsoleColor::Black)
    }
}

impl Attribute {
    pub const fn new(foreground: ConsoleColor, background: ConsoleColor) -> Self {
        Self((background.nibble() << 4) | foreground.nibble())
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn foreground(self) -> ConsoleColor {
        ConsoleColor::from_nibble(self.0)
    }

    pub const fn background(self) -> ConsoleColor {
        ConsoleColor::from_nibble(self.0 >> 4)
    }

    /// Same foreground, new background
    pub const fn with_background(self, background: ConsoleColor) -> Self {
        Self::new(self.foreground(), background)
    }
}
