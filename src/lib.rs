//! winconsole - a text console session for Windows
//!
//! Wraps the Win32 console behind a small session object: caption, cursor,
//! window and buffer geometry, 16-color attributes, colored output, line
//! input, non-blocking key polling and echo control.
//!
//! # Backends
//!
//! | Backend | Host | Notes |
//! |---------|------|-------|
//! | [`WinConsole`](platform::WinConsole) | Windows | Win32 console API |
//! | [`TerminalConsole`](platform::TerminalConsole) | any ANSI terminal | crossterm over a shadow buffer |
//! | [`MemoryConsole`](platform::MemoryConsole) | anywhere | in-memory cell grid |
//!
//! [`platform::native`] picks the right one for the host.
//!
//! # Quick Start
//!
//! ```no_run
//! use winconsole::{platform, ConsoleColor, ConsoleSession};
//!
//! let mut session = ConsoleSession::new(platform::native());
//! session.create()?;
//! session.set_caption("Demo")?;
//! session.clear(None)?;
//! session.writeln("hello", Some(ConsoleColor::Yellow), None)?;
//! let name = session.read(None, None)?;
//! session.writeln(&name, Some(ConsoleColor::Aqua), None)?;
//! session.destroy()?;
//! # Ok::<(), winconsole::ConsoleError>(())
//! ```

pub mod color;
pub mod config;
pub mod error;
pub mod geometry;
pub mod keys;
pub mod platform;
pub mod session;

pub use color::{Attribute, ConsoleColor};
pub use config::{ConfigError, SessionConfig};
pub use error::{ConsoleError, Result};
pub use geometry::{Coord, Size, WindowRegime};
pub use platform::ConsoleBackend;
pub use session::ConsoleSession;
