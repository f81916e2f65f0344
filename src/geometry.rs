//! Window and buffer geometry.
//!
//! A console window can never be larger than its screen buffer, and the
//! buffer can never be smaller than the window. Resizing therefore has to
//! happen in an order that keeps both rules true at every step; which
//! order depends on the requested size (see [`WindowRegime`]).

use std::fmt;

/// Size in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub width: u16,
    pub height: u16,
}

impl Size {
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    /// Number of cells
    pub const fn area(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether `other` fits inside `self` in both dimensions
    pub const fn contains(self, other: Size) -> bool {
        other.width <= self.width && other.height <= self.height
    }

    pub fn min(self, other: Size) -> Size {
        Size::new(self.width.min(other.width), self.height.min(other.height))
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Zero-based cell position; (0, 0) is the upper-left corner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Coord {
    pub x: u16,
    pub y: u16,
}

impl Coord {
    pub const ORIGIN: Coord = Coord { x: 0, y: 0 };

    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// Linear cell index in a buffer of the given width
    pub const fn index(self, width: u16) -> usize {
        self.y as usize * width as usize + self.x as usize
    }
}

/// Narrowest window the console accepts
pub const MIN_WINDOW_WIDTH: u16 = 14;
/// Widest window that still fits the default buffer width
pub const NARROW_MAX_WIDTH: u16 = 80;
/// Shortest window that counts as "tall" for wide windows
pub const TALL_MIN_HEIGHT: u16 = 25;

/// Order in which window and buffer are resized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowRegime {
    /// 14..=80 wide: shrink the window, then fit the buffer to it.
    Small,
    /// Over 80 wide and at least 25 tall: grow the buffer, then the window.
    Large,
    /// Over 80 wide and under 25 tall: grow the buffer tall, resize the
    /// window, then shrink the buffer to the window height.
    WideShort,
}

impl WindowRegime {
    /// Pick the regime for `requested`, given the largest window the
    /// platform can display. `None` means the size is not supported.
    pub fn classify(requested: Size, largest: Size) -> Option<Self> {
        let Size { width, height } = requested;

        if height == 0 || height > largest.height {
            return None;
        }

        if (MIN_WINDOW_WIDTH..=NARROW_MAX_WIDTH).contains(&width) {
            Some(WindowRegime::Small)
        } else if width > NARROW_MAX_WIDTH && width <= largest.width {
            if height >= TALL_MIN_HEIGHT {
                Some(WindowRegime::Large)
            } else {
                Some(WindowRegime::WideShort)
            }
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LARGEST: Size = Size::new(120, 50);

    #[test]
    fn test_classify_small() {
        assert_eq!(WindowRegime::classify(Size::new(14, 1), LARGEST), Some(WindowRegime::Small));
        assert_eq!(WindowRegime::classify(Size::new(80, 50), LARGEST), Some(WindowRegime::Small));
    }

    #[test]
    fn test_classify_large_and_wide_short() {
        assert_eq!(WindowRegime::classify(Size::new(100, 30), LARGEST), Some(WindowRegime::Large));
        assert_eq!(WindowRegime::classify(Size::new(81, 25), LARGEST), Some(WindowRegime::Large));
        assert_eq!(WindowRegime::classify(Size::new(81, 24), LARGEST), Some(WindowRegime::WideShort));
        assert_eq!(WindowRegime::classify(Size::new(120, 1), LARGEST), Some(WindowRegime::WideShort));
    }

    #[test]
    fn test_classify_rejects_out_of_range() {
        assert_eq!(WindowRegime::classify(Size::new(13, 10), LARGEST), None);
        assert_eq!(WindowRegime::classify(Size::new(40, 0), LARGEST), None);
        assert_eq!(WindowRegime::classify(Size::new(40, 51), LARGEST), None);
        assert_eq!(WindowRegime::classify(Size::new(121, 30), LARGEST), None);
    }

    #[test]
    fn test_size_helpers() {
        let buffer = Size::new(80, 300);
        assert_eq!(buffer.area(), 24_000);
        assert!(buffer.contains(Size::new(80, 25)));
        assert!(!buffer.contains(Size::new(81, 25)));
        assert_eq!(Coord::new(3, 2).index(80), 163);
        assert_eq!(Size::new(100, 30).to_string(), "100x30");
    }
}
