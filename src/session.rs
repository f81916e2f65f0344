//! Console session
//!
//! A [`ConsoleSession`] owns one console backend and mirrors the state the
//! console cannot report cheaply: colors, caption, cursor shape, echo mode
//! and the tracked window/buffer geometry.
//!
//! # Lifecycle
//!
//! ```text
//! new() ──create()──> live ──destroy()──> new
//!                       │
//!                       └── drop() destroys a live session
//! ```
//!
//! Operations that touch the console fail with
//! [`ConsoleError::NotInitialized`] unless the session is live. Color and
//! input-buffer setters only change session state and work at any time.

use tracing::{debug, info, warn};

use crate::color::{Attribute, ConsoleColor};
use crate::config::SessionConfig;
use crate::error::{ConsoleError, Result};
use crate::geometry::{Coord, Size, WindowRegime};
use crate::platform::{Attachment, ConsoleBackend, InputEvent, InputMode};

/// State that only exists between `create` and `destroy`
struct Live {
    attachment: Attachment,
    /// Input mode found at `create`, restored at `destroy`
    baseline_mode: InputMode,
    /// Line input buffer
    line_buffer: String,
}

/// A console session
pub struct ConsoleSession<B: ConsoleBackend> {
    backend: B,
    live: Option<Live>,
    window: Size,
    buffer: Size,
    caption: String,
    cursor_visible: bool,
    /// Percentage of the cell height, 0..=100
    cursor_size: u8,
    window_visible: bool,
    background_color: ConsoleColor,
    input_color: ConsoleColor,
    output_color: ConsoleColor,
    echo_enabled: bool,
    input_buffer_size: usize,
    /// Window size to apply at `create`
    configured_window: Option<Size>,
}

impl<B: ConsoleBackend> ConsoleSession<B> {
    /// Create a session with the default settings: 80x25 window, 80x300
    /// buffer, 1024-character line input, dark white on black.
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, &SessionConfig::default())
    }

    pub fn with_config(backend: B, config: &SessionConfig) -> Self {
        Self {
            backend,
            live: None,
            window: config.window.map(Size::from).unwrap_or(Size::new(80, 25)),
            buffer: config.buffer.into(),
            caption: config.caption.clone(),
            cursor_visible: config.cursor.visible,
            cursor_size: config.cursor.size.min(100),
            window_visible: true,
            background_color: config.colors.background,
            input_color: config.colors.input,
            output_color: config.colors.output,
            echo_enabled: true,
            input_buffer_size: config.input.buffer_size.max(1),
            configured_window: config.window.map(Size::from),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Whether `create` has succeeded and `destroy` has not been called
    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    fn ensure_live(&self) -> Result<()> {
        if self.live.is_some() {
            Ok(())
        } else {
            Err(ConsoleError::NotInitialized)
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Take control of the console, allocating one if the process has none.
    ///
    /// Applies the configured buffer size, cursor, caption and window size,
    /// allocates the line buffer and records the input mode for `destroy`.
    pub fn create(&mut self) -> Result<()> {
        if self.live.is_some() {
            return Err(ConsoleError::AlreadyInitialized);
        }

        let attachment = self
            .backend
            .attach()
            .map_err(ConsoleError::platform("attach console"))?;

        let baseline_mode = match self.initialize() {
            Ok(mode) => mode,
            Err(e) => {
                if let Err(detach_err) = self.backend.detach(attachment) {
                    warn!("Failed to detach console after setup error: {}", detach_err);
                }
                return Err(e);
            }
        };

        self.echo_enabled = baseline_mode.contains(InputMode::ECHO_INPUT);
        self.live = Some(Live {
            attachment,
            baseline_mode,
            line_buffer: String::with_capacity(self.input_buffer_size),
        });

        if let Some(size) = self.configured_window.filter(|&size| size != self.window) {
            if let Err(e) = self.set_window_size(size.width, size.height) {
                warn!("Configured window size {} not applied: {}", size, e);
            }
        }

        info!(
            "Console session created ({:?}): window {}, buffer {}",
            attachment, self.window, self.buffer
        );
        Ok(())
    }

    fn initialize(&mut self) -> Result<InputMode> {
        if let Err(e) = self.backend.set_buffer_size(self.buffer) {
            warn!("Buffer size {} rejected: {}", self.buffer, e);
        }

        let screen = self
            .backend
            .screen_info()
            .map_err(ConsoleError::platform("query screen buffer"))?;
        self.buffer = screen.buffer;
        self.window = screen.window;

        if let Err(e) = self.backend.set_cursor_info(self.cursor_size, self.cursor_visible) {
            warn!("Cursor size {} rejected: {}", self.cursor_size, e);
        }
        if !self.caption.is_empty() {
            if let Err(e) = self.backend.set_title(&self.caption) {
                warn!("Caption rejected: {}", e);
            }
        }

        self.backend
            .input_mode()
            .map_err(ConsoleError::platform("query input mode"))
    }

    /// Restore the input mode, release the line buffer and detach the
    /// console if this session allocated it.
    ///
    /// Both the restore and the detach are attempted; the first failure is
    /// returned.
    pub fn destroy(&mut self) -> Result<()> {
        let live = self.live.take().ok_or(ConsoleError::NotInitialized)?;

        let restored = self
            .backend
            .set_input_mode(live.baseline_mode)
            .map_err(ConsoleError::platform("restore input mode"));
        self.echo_enabled = live.baseline_mode.contains(InputMode::ECHO_INPUT);
        drop(live.line_buffer);

        let detached = self
            .backend
            .detach(live.attachment)
            .map_err(ConsoleError::platform("detach console"));

        info!("Console session destroyed ({:?})", live.attachment);
        restored.and(detached)
    }

    // ------------------------------------------------------------------
    // Caption, cursor and window visibility
    // ------------------------------------------------------------------

    /// Set the title shown in the console window's title bar
    pub fn set_caption(&mut self, caption: &str) -> Result<()> {
        self.ensure_live()?;
        self.backend
            .set_title(caption)
            .map_err(ConsoleError::platform("set caption"))?;
        self.caption = caption.to_string();
        Ok(())
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    /// Move the cursor; (0, 0) is the upper-left corner of the buffer
    pub fn goto_xy(&mut self, x: u16, y: u16) -> Result<()> {
        self.ensure_live()?;
        self.backend
            .set_cursor_position(Coord::new(x, y))
            .map_err(ConsoleError::platform("move cursor"))
    }

    pub fn show_cursor(&mut self) -> Result<()> {
        self.set_cursor_visible(true)
    }

    pub fn hide_cursor(&mut self) -> Result<()> {
        self.set_cursor_visible(false)
    }

    fn set_cursor_visible(&mut self, visible: bool) -> Result<()> {
        self.ensure_live()?;
        self.backend
            .set_cursor_info(self.cursor_size, visible)
            .map_err(ConsoleError::platform("set cursor visibility"))?;
        self.cursor_visible = visible;
        Ok(())
    }

    pub fn is_cursor_visible(&self) -> bool {
        self.cursor_visible
    }

    /// Set the cursor height as a percentage of the cell; values above 100
    /// are clamped to 100. Visibility is left as it is.
    pub fn set_cursor_size(&mut self, size: u8) -> Result<()> {
        self.ensure_live()?;
        let size = size.min(100);
        self.backend
            .set_cursor_info(size, self.cursor_visible)
            .map_err(ConsoleError::platform("set cursor size"))?;
        self.cursor_size = size;
        Ok(())
    }

    pub fn cursor_size(&self) -> u8 {
        self.cursor_size
    }

    pub fn show_window(&mut self) -> Result<()> {
        self.set_window_visible(true)
    }

    pub fn hide_window(&mut self) -> Result<()> {
        self.set_window_visible(false)
    }

    fn set_window_visible(&mut self, visible: bool) -> Result<()> {
        self.ensure_live()?;
        self.backend
            .set_window_visible(visible)
            .map_err(ConsoleError::platform("set window visibility"))?;
        self.window_visible = visible;
        Ok(())
    }

    pub fn is_window_visible(&self) -> bool {
        self.window_visible
    }

    // ------------------------------------------------------------------
    // Geometry
    // ------------------------------------------------------------------

    /// Resize the window, resizing the buffer to the same size.
    ///
    /// The request is checked against [`largest_window_size`] and mapped to
    /// a [`WindowRegime`] that decides the resize order. Sizes outside every
    /// regime fail with `UnsupportedGeometry` and change nothing.
    ///
    /// [`largest_window_size`]: Self::largest_window_size
    pub fn set_window_size(&mut self, width: u16, height: u16) -> Result<()> {
        self.ensure_live()?;
        let requested = Size::new(width, height);
        let largest = self.largest_window_size()?;
        let regime = WindowRegime::classify(requested, largest)
            .ok_or(ConsoleError::UnsupportedGeometry { width, height })?;

        debug!(
            "Resize window {} -> {} ({:?}, largest {})",
            self.window, requested, regime, largest
        );

        match regime {
            WindowRegime::Small => {
                self.apply_window_size(requested)?;
                self.set_buffer_size(width, height)?;
            }
            WindowRegime::Large => {
                let previous = self.buffer;
                self.set_buffer_size(width, height)?;
                if let Err(e) = self.apply_window_size(requested) {
                    self.restore_buffer_size(previous);
                    return Err(e);
                }
            }
            WindowRegime::WideShort => {
                let previous = self.buffer;
                let tall = self.buffer.height.max(self.window.height).max(height);
                self.set_buffer_size(width, tall)?;
                if let Err(e) = self.apply_window_size(requested) {
                    self.restore_buffer_size(previous);
                    return Err(e);
                }
                if let Err(e) = self.set_buffer_size(width, height) {
                    warn!("Buffer kept at {}x{}: {}", width, tall, e);
                }
            }
        }
        Ok(())
    }

    fn apply_window_size(&mut self, size: Size) -> Result<()> {
        self.backend
            .set_window_size(size)
            .map_err(ConsoleError::platform("resize window"))?;
        self.window = size;
        Ok(())
    }

    fn restore_buffer_size(&mut self, size: Size) {
        match self.backend.set_buffer_size(size) {
            Ok(()) => self.buffer = size,
            Err(e) => warn!("Failed to restore buffer size {}: {}", size, e),
        }
    }

    /// Tracked window size in character cells
    pub fn window_size(&self) -> Size {
        self.window
    }

    /// Largest window the console can display with the current font and
    /// screen, queried live.
    pub fn largest_window_size(&mut self) -> Result<Size> {
        self.ensure_live()?;
        self.backend
            .largest_window_size()
            .map_err(ConsoleError::platform("query largest window size"))
    }

    /// Resize the screen buffer. Fails without side effects when the
    /// console refuses, e.g. when the buffer would be smaller than the window.
    pub fn set_buffer_size(&mut self, width: u16, height: u16) -> Result<()> {
        self.ensure_live()?;
        if width == 0 || height == 0 {
            return Err(ConsoleError::UnsupportedGeometry { width, height });
        }
        let size = Size::new(width, height);
        self.backend
            .set_buffer_size(size)
            .map_err(ConsoleError::platform("resize buffer"))?;
        self.buffer = size;
        Ok(())
    }

    /// Tracked buffer size in character cells
    pub fn buffer_size(&self) -> Size {
        self.buffer
    }

    // ------------------------------------------------------------------
    // Colors
    // ------------------------------------------------------------------

    /// Change the background color and **repaint the whole buffer** with it.
    ///
    /// Every cell keeps its character and foreground; only the background
    /// nibble changes. Cost is one read and one write of all
    /// `buffer_width * buffer_height` cells.
    pub fn set_background_color(&mut self, color: ConsoleColor) -> Result<()> {
        self.ensure_live()?;
        let mut cells = self
            .backend
            .read_cells(Coord::ORIGIN, self.buffer.area())
            .map_err(ConsoleError::platform("read screen buffer"))?;

        for cell in &mut cells {
            cell.attribute = cell.attribute.with_background(color);
        }

        self.backend
            .write_cells(Coord::ORIGIN, &cells)
            .map_err(ConsoleError::platform("write screen buffer"))?;
        self.background_color = color;
        Ok(())
    }

    /// Color of text read from the console; affects later reads only
    pub fn set_input_color(&mut self, color: ConsoleColor) {
        self.input_color = color;
    }

    /// Color of text written to the console; affects later writes only
    pub fn set_output_color(&mut self, color: ConsoleColor) {
        self.output_color = color;
    }

    pub fn background_color(&self) -> ConsoleColor {
        self.background_color
    }

    pub fn input_color(&self) -> ConsoleColor {
        self.input_color
    }

    pub fn output_color(&self) -> ConsoleColor {
        self.output_color
    }

    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------

    /// Write `text` at the cursor. Colors left as `None` use the session's
    /// output and background colors.
    pub fn write(
        &mut self,
        text: &str,
        output_color: Option<ConsoleColor>,
        background_color: Option<ConsoleColor>,
    ) -> Result<()> {
        self.ensure_live()?;
        let attribute = Attribute::new(
            output_color.unwrap_or(self.output_color),
            background_color.unwrap_or(self.background_color),
        );
        self.backend
            .set_text_attribute(attribute)
            .map_err(ConsoleError::platform("set text attribute"))?;
        self.backend
            .write_text(text)
            .map_err(ConsoleError::platform("write"))?;
        Ok(())
    }

    /// [`write`](Self::write) followed by a carriage return and line feed
    pub fn writeln(
        &mut self,
        text: &str,
        output_color: Option<ConsoleColor>,
        background_color: Option<ConsoleColor>,
    ) -> Result<()> {
        self.write(&format!("{}\r\n", text), output_color, background_color)
    }

    /// Blank the entire buffer (not just the window) and move the cursor
    /// to the origin. The background defaults to the session's.
    pub fn clear(&mut self, background_color: Option<ConsoleColor>) -> Result<()> {
        self.ensure_live()?;
        let background = background_color.unwrap_or(self.background_color);
        let attribute = Attribute::new(self.output_color, background);

        self.backend
            .set_text_attribute(attribute)
            .map_err(ConsoleError::platform("set text attribute"))?;
        let screen = self
            .backend
            .screen_info()
            .map_err(ConsoleError::platform("query screen buffer"))?;
        self.fill(attribute, screen.buffer.area(), Coord::ORIGIN)
    }

    /// Blank the buffer row holding the cursor and move the cursor to its start
    pub fn clearln(&mut self) -> Result<()> {
        self.ensure_live()?;
        let attribute = Attribute::new(self.output_color, self.background_color);

        self.backend
            .set_text_attribute(attribute)
            .map_err(ConsoleError::platform("set text attribute"))?;
        let screen = self
            .backend
            .screen_info()
            .map_err(ConsoleError::platform("query screen buffer"))?;
        let row = Coord::new(0, screen.cursor.y);
        self.fill(attribute, self.buffer.width as usize, row)
    }

    /// Fill `count` cells from `start` with blanks, then put the cursor at `start`
    fn fill(&mut self, attribute: Attribute, count: usize, start: Coord) -> Result<()> {
        self.backend
            .fill_characters(' ', count, start)
            .map_err(ConsoleError::platform("fill characters"))?;
        self.backend
            .fill_attribute(attribute, count, start)
            .map_err(ConsoleError::platform("fill attributes"))?;
        self.backend
            .set_cursor_position(start)
            .map_err(ConsoleError::platform("move cursor"))
    }

    // ------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------

    /// Block until a line is entered and return it without its terminator.
    ///
    /// At most [`input_buffer_size`](Self::input_buffer_size) characters
    /// are read; longer input is handled by the console.
    pub fn read(
        &mut self,
        input_color: Option<ConsoleColor>,
        background_color: Option<ConsoleColor>,
    ) -> Result<String> {
        let attribute = Attribute::new(
            input_color.unwrap_or(self.input_color),
            background_color.unwrap_or(self.background_color),
        );
        let capacity = self.input_buffer_size;
        let live = self.live.as_mut().ok_or(ConsoleError::NotInitialized)?;

        self.backend
            .set_text_attribute(attribute)
            .map_err(ConsoleError::platform("set text attribute"))?;

        live.line_buffer.clear();
        self.backend
            .read_line(&mut live.line_buffer, capacity)
            .map_err(ConsoleError::platform("read line"))?;

        Ok(strip_line_terminator(&live.line_buffer).to_string())
    }

    /// Set the maximum number of characters a single `read` returns
    pub fn set_input_buffer_size(&mut self, size: usize) -> Result<()> {
        if size == 0 {
            return Err(ConsoleError::InvalidInputBufferSize);
        }
        self.input_buffer_size = size;
        if let Some(live) = self.live.as_mut() {
            live.line_buffer = String::with_capacity(size);
        }
        Ok(())
    }

    pub fn input_buffer_size(&self) -> usize {
        self.input_buffer_size
    }

    /// Poll for a key press without blocking.
    ///
    /// Consumes the oldest pending input record, if any, and returns its
    /// virtual key code when it is a key-down event. Not synchronized with
    /// [`read`](Self::read).
    pub fn read_key(&mut self) -> Result<Option<u16>> {
        self.ensure_live()?;
        let pending = self
            .backend
            .pending_events()
            .map_err(ConsoleError::platform("count input events"))?;
        if pending == 0 {
            return Ok(None);
        }

        let event = self
            .backend
            .read_event()
            .map_err(ConsoleError::platform("read input event"))?;
        match event {
            InputEvent::Key(key) if key.key_down => Ok(Some(key.virtual_key)),
            _ => Ok(None),
        }
    }

    /// Echo typed characters, with line-buffered input
    pub fn enable_echo(&mut self) -> Result<()> {
        let baseline = self.baseline_mode()?;
        self.apply_input_mode(baseline | InputMode::ECHO_INPUT | InputMode::LINE_INPUT)?;
        self.echo_enabled = true;
        Ok(())
    }

    /// Stop echoing typed characters
    pub fn disable_echo(&mut self) -> Result<()> {
        let baseline = self.baseline_mode()?;
        self.apply_input_mode(baseline.difference(InputMode::ECHO_INPUT))?;
        self.echo_enabled = false;
        Ok(())
    }

    pub fn is_echo_enabled(&self) -> bool {
        self.echo_enabled
    }

    fn baseline_mode(&self) -> Result<InputMode> {
        self.live
            .as_ref()
            .map(|live| live.baseline_mode)
            .ok_or(ConsoleError::NotInitialized)
    }

    fn apply_input_mode(&mut self, mode: InputMode) -> Result<()> {
        debug!("Input mode -> {:?}", mode);
        self.backend
            .set_input_mode(mode)
            .map_err(ConsoleError::platform("set input mode"))
    }
}

impl<B: ConsoleBackend> Drop for ConsoleSession<B> {
    fn drop(&mut self) {
        if self.live.is_some() {
            if let Err(e) = self.destroy() {
                warn!("Failed to destroy console session: {}", e);
            }
        }
    }
}

/// Strip one trailing line terminator (`\r\n`, `\n` or `\r`)
fn strip_line_terminator(line: &str) -> &str {
    line.strip_suffix("\r\n")
        .or_else(|| line.strip_suffix('\n'))
        .or_else(|| line.strip_suffix('\r'))
        .unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{VK_A, VK_RETURN};
    use crate::platform::{Cell, KeyRecord, MemoryConsole};

    fn live_session(console: MemoryConsole) -> ConsoleSession<MemoryConsole> {
        let mut session = ConsoleSession::new(console);
        session.create().unwrap();
        session
    }

    fn session() -> ConsoleSession<MemoryConsole> {
        live_session(MemoryConsole::new())
    }

    fn geometry(session: &ConsoleSession<MemoryConsole>) -> (Size, Size, Size, Size) {
        (
            session.window_size(),
            session.buffer_size(),
            session.backend().window(),
            session.backend().buffer(),
        )
    }

    #[test]
    fn test_create_applies_defaults() {
        let session = session();
        assert!(session.is_live());
        assert_eq!(session.buffer_size(), Size::new(80, 300));
        assert_eq!(session.backend().buffer(), Size::new(80, 300));
        assert_eq!(session.window_size(), Size::new(80, 25));
        assert_eq!(session.input_buffer_size(), 1024);
        assert_eq!(session.cursor_size(), 25);
        assert!(session.is_echo_enabled());
        assert_eq!(session.background_color(), ConsoleColor::Black);
        assert_eq!(session.output_color(), ConsoleColor::DarkWhite);
    }

    #[test]
    fn test_operations_require_create() {
        let mut session = ConsoleSession::new(MemoryConsole::new());
        assert!(matches!(session.write("x", None, None), Err(ConsoleError::NotInitialized)));
        assert!(matches!(session.set_window_size(60, 20), Err(ConsoleError::NotInitialized)));
        assert!(matches!(session.read_key(), Err(ConsoleError::NotInitialized)));
        assert!(matches!(session.enable_echo(), Err(ConsoleError::NotInitialized)));
        assert!(matches!(session.destroy(), Err(ConsoleError::NotInitialized)));

        // Pure state setters work before create
        session.set_output_color(ConsoleColor::Green);
        assert_eq!(session.output_color(), ConsoleColor::Green);
    }

    #[test]
    fn test_create_twice_fails() {
        let mut session = session();
        assert!(matches!(session.create(), Err(ConsoleError::AlreadyInitialized)));
        assert!(session.is_live());
    }

    #[test]
    fn test_destroy_frees_allocated_console() {
        let mut session = live_session(MemoryConsole::new().detached_process());
        assert!(session.backend().has_console());
        session.disable_echo().unwrap();

        session.destroy().unwrap();
        assert!(!session.is_live());
        assert!(!session.backend().is_attached());
        assert!(!session.backend().has_console());
        assert_eq!(session.backend().mode(), InputMode::default());
        assert!(matches!(session.write("x", None, None), Err(ConsoleError::NotInitialized)));
    }

    #[test]
    fn test_destroy_keeps_inherited_console() {
        let mut session = session();
        session.destroy().unwrap();
        assert!(session.backend().has_console());
        assert!(!session.backend().is_attached());

        // A destroyed session can be created again
        session.create().unwrap();
        assert!(session.is_live());
    }

    #[test]
    fn test_create_adopts_platform_buffer_when_rejected() {
        let mut config = SessionConfig::default();
        config.buffer.width = 40;
        config.buffer.height = 10;
        let mut session = ConsoleSession::with_config(MemoryConsole::new(), &config);
        session.create().unwrap();
        assert_eq!(session.buffer_size(), Size::new(80, 25));
    }

    #[test]
    fn test_with_config() {
        let config = SessionConfig::from_toml_str(
            r#"
            caption = "configured"
            [window]
            width = 100
            height = 30
            [buffer]
            width = 100
            height = 200
            [cursor]
            visible = false
            size = 60
            [colors]
            output = "yellow"
            background = "dark-blue"
            "#,
        )
        .unwrap();
        let mut session = ConsoleSession::with_config(MemoryConsole::new(), &config);
        session.create().unwrap();

        assert_eq!(session.backend().title(), "configured");
        assert_eq!(session.backend().window(), Size::new(100, 30));
        assert_eq!(session.window_size(), Size::new(100, 30));
        assert_eq!(session.backend().buffer(), Size::new(100, 30));
        assert_eq!(session.backend().cursor_info(), (60, false));

        session.write("y", None, None).unwrap();
        let cell = session.backend().cell(Coord::ORIGIN);
        assert_eq!(cell.attribute, Attribute::new(ConsoleColor::Yellow, ConsoleColor::DarkBlue));
    }

    #[test]
    fn test_scenario_large_window_clear_write_destroy() {
        let mut session = live_session(MemoryConsole::with_largest(Size::new(120, 50)));
        let baseline = session.backend().mode();

        session.set_window_size(100, 30).unwrap();
        assert_eq!(session.window_size(), Size::new(100, 30));
        assert!(session.buffer_size().contains(Size::new(100, 30)));

        session.clear(None).unwrap();
        assert_eq!(session.backend().cells().len(), session.buffer_size().area());
        assert!(session.backend().cells().iter().all(|cell| cell.ch == ' '));
        assert_eq!(session.backend().cursor(), Coord::ORIGIN);

        session
            .write("hello", Some(ConsoleColor::DarkRed), Some(ConsoleColor::Black))
            .unwrap();
        for (x, ch) in "hello".chars().enumerate() {
            let cell = session.backend().cell(Coord::new(x as u16, 0));
            assert_eq!(cell.ch, ch);
            assert_eq!(cell.attribute.bits(), 0x04);
        }

        session.disable_echo().unwrap();
        session.destroy().unwrap();
        assert_eq!(session.backend().mode(), baseline);
        assert!(!session.is_live());
    }

    #[test]
    fn test_small_regime_fits_buffer_to_window() {
        let mut session = session();
        session.set_window_size(60, 20).unwrap();
        let fitted = Size::new(60, 20);
        assert_eq!(geometry(&session), (fitted, fitted, fitted, fitted));
    }

    #[test]
    fn test_wide_short_regime() {
        let mut session = session();
        session.set_window_size(100, 10).unwrap();
        assert_eq!(session.window_size(), Size::new(100, 10));
        assert_eq!(session.buffer_size(), Size::new(100, 10));
        assert_eq!(session.backend().window(), Size::new(100, 10));
    }

    #[test]
    fn test_set_window_size_is_idempotent() {
        for (width, height) in [(60, 20), (100, 30), (100, 10), (14, 1), (120, 50)] {
            let mut session = session();
            session.set_window_size(width, height).unwrap();
            let once = geometry(&session);
            session.set_window_size(width, height).unwrap();
            assert_eq!(geometry(&session), once, "{}x{}", width, height);
        }
    }

    #[test]
    fn test_buffer_covers_window_after_resize() {
        for width in [14, 40, 80, 81, 100, 120] {
            for height in [1, 10, 24, 25, 40, 50] {
                let mut session = session();
                session.set_window_size(width, height).unwrap();
                let buffer = session.buffer_size();
                assert!(buffer.width >= width && buffer.height >= height);
                assert!(session.backend().buffer().contains(session.backend().window()));
            }
        }
    }

    #[test]
    fn test_unsupported_window_sizes_change_nothing() {
        let mut session = session();
        let before = geometry(&session);
        for (width, height) in [(13, 10), (121, 30), (60, 0), (60, 51)] {
            let result = session.set_window_size(width, height);
            assert!(
                matches!(result, Err(ConsoleError::UnsupportedGeometry { .. })),
                "{}x{}",
                width,
                height
            );
            assert_eq!(geometry(&session), before);
        }
    }

    #[test]
    fn test_large_regime_rejection_is_reported() {
        let mut session = session();
        session.set_window_size(120, 40).unwrap();
        let before = geometry(&session);

        // Buffer first: 100x30 would be smaller than the 120x40 window
        let result = session.set_window_size(100, 30);
        assert!(matches!(result, Err(ConsoleError::Platform { operation: "resize buffer", .. })));
        assert_eq!(geometry(&session), before);
    }

    #[test]
    fn test_failed_create_releases_allocated_console() {
        for op in ["screen_info", "input_mode"] {
            let console = MemoryConsole::new().detached_process().failing(op);
            let mut session = ConsoleSession::new(console);
            assert!(matches!(session.create(), Err(ConsoleError::Platform { .. })), "{}", op);
            assert!(!session.is_live());
            assert!(!session.backend().is_attached());
            assert!(!session.backend().has_console());
        }
    }

    #[test]
    fn test_failed_window_step_restores_buffer() {
        // Large and wide-short regimes both grow the buffer first
        for (width, height) in [(100, 30), (100, 10)] {
            let mut session = session();
            let before = geometry(&session);
            session.backend_mut().fail_after("set_window_size", 0);

            let result = session.set_window_size(width, height);
            assert!(
                matches!(result, Err(ConsoleError::Platform { operation: "resize window", .. })),
                "{}x{}",
                width,
                height
            );
            assert_eq!(geometry(&session), before);
        }
    }

    #[test]
    fn test_failed_final_shrink_keeps_tall_buffer() {
        let mut session = session();
        session.backend_mut().fail_after("set_buffer_size", 1);

        session.set_window_size(100, 10).unwrap();
        assert_eq!(session.window_size(), Size::new(100, 10));
        assert_eq!(session.buffer_size(), Size::new(100, 300));
        assert_eq!(session.backend().buffer(), Size::new(100, 300));
    }

    #[test]
    fn test_set_buffer_size() {
        let mut session = session();
        session.set_buffer_size(200, 1000).unwrap();
        assert_eq!(session.buffer_size(), Size::new(200, 1000));

        assert!(matches!(session.set_buffer_size(40, 10), Err(ConsoleError::Platform { .. })));
        assert!(matches!(
            session.set_buffer_size(0, 10),
            Err(ConsoleError::UnsupportedGeometry { .. })
        ));
        assert_eq!(session.buffer_size(), Size::new(200, 1000));
        assert_eq!(session.backend().buffer(), Size::new(200, 1000));
    }

    #[test]
    fn test_cursor_size_is_clamped() {
        let mut session = session();
        session.set_cursor_size(150).unwrap();
        assert_eq!(session.cursor_size(), 100);
        assert_eq!(session.backend().cursor_info(), (100, true));

        session.hide_cursor().unwrap();
        session.set_cursor_size(50).unwrap();
        assert_eq!(session.backend().cursor_info(), (50, false));
        assert!(!session.is_cursor_visible());

        session.show_cursor().unwrap();
        assert_eq!(session.backend().cursor_info(), (50, true));
    }

    #[test]
    fn test_caption() {
        let mut session = session();
        session.set_caption("Demo").unwrap();
        assert_eq!(session.caption(), "Demo");
        assert_eq!(session.backend().title(), "Demo");

        let mut session = live_session(MemoryConsole::new().rejecting_titles());
        let result = session.set_caption("Nope");
        assert!(matches!(result, Err(ConsoleError::Platform { operation: "set caption", .. })));
        assert_eq!(session.caption(), "");
    }

    #[test]
    fn test_window_visibility() {
        let mut session = session();
        session.hide_window().unwrap();
        assert!(!session.is_window_visible());
        assert!(!session.backend().is_window_visible());
        session.show_window().unwrap();
        assert!(session.backend().is_window_visible());
    }

    #[test]
    fn test_goto_xy() {
        let mut session = session();
        session.goto_xy(5, 3).unwrap();
        assert_eq!(session.backend().cursor(), Coord::new(5, 3));
        assert!(session.goto_xy(80, 0).is_err());
    }

    #[test]
    fn test_clear_then_write_leaves_one_cell() {
        let mut session = session();
        session.writeln("some earlier output", None, None).unwrap();
        session.clear(None).unwrap();
        session.write("x", None, None).unwrap();

        let written: Vec<usize> = session
            .backend()
            .cells()
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.ch != ' ')
            .map(|(i, _)| i)
            .collect();
        assert_eq!(written, vec![0]);
        assert_eq!(session.backend().cell(Coord::ORIGIN).ch, 'x');
    }

    #[test]
    fn test_clear_with_background_keeps_session_background() {
        let mut session = session();
        session.clear(Some(ConsoleColor::DarkBlue)).unwrap();
        let expected = Attribute::new(ConsoleColor::DarkWhite, ConsoleColor::DarkBlue);
        assert!(session.backend().cells().iter().all(|cell| cell.attribute == expected));
        assert_eq!(session.background_color(), ConsoleColor::Black);
    }

    #[test]
    fn test_clearln() {
        let mut session = session();
        session.write("first\r\nsecond", None, None).unwrap();
        session.clearln().unwrap();
        assert_eq!(session.backend().row_text(0), "first");
        assert_eq!(session.backend().row_text(1), "");
        assert_eq!(session.backend().cursor(), Coord::new(0, 1));
    }

    #[test]
    fn test_writeln() {
        let mut session = session();
        session.writeln("a", None, None).unwrap();
        session.write("b", None, None).unwrap();
        assert_eq!(session.backend().row_text(0), "a");
        assert_eq!(session.backend().row_text(1), "b");
    }

    #[test]
    fn test_background_change_repaints_buffer() {
        let mut session = session();
        session.write("abc", Some(ConsoleColor::Yellow), None).unwrap();
        session.set_background_color(ConsoleColor::DarkGreen).unwrap();

        let cell = session.backend().cell(Coord::ORIGIN);
        assert_eq!(cell.ch, 'a');
        assert_eq!(cell.attribute, Attribute::new(ConsoleColor::Yellow, ConsoleColor::DarkGreen));

        let blank = session.backend().cell(Coord::new(10, 299));
        assert_eq!(blank.ch, ' ');
        assert_eq!(blank.attribute, Attribute::new(ConsoleColor::DarkWhite, ConsoleColor::DarkGreen));
        assert_eq!(session.background_color(), ConsoleColor::DarkGreen);
    }

    #[test]
    fn test_background_change_keeps_raw_code_units() {
        let mut session = session();
        let half = Cell::from_utf16(0xD83D, Attribute::default());
        session.backend_mut().write_cells(Coord::ORIGIN, &[half]).unwrap();

        session.set_background_color(ConsoleColor::DarkBlue).unwrap();
        let cell = session.backend().cell(Coord::ORIGIN);
        assert_eq!(cell.utf16_unit(), 0xD83D);
        assert_eq!(cell.attribute.background(), ConsoleColor::DarkBlue);
    }

    #[test]
    fn test_foreground_colors_apply_to_later_output_only() {
        let mut session = session();
        session.write("o", None, None).unwrap();
        session.set_output_color(ConsoleColor::Green);
        assert_eq!(session.backend().cell(Coord::ORIGIN).attribute, Attribute::default());

        session.write("g", None, None).unwrap();
        let cell = session.backend().cell(Coord::new(1, 0));
        assert_eq!(cell.attribute, Attribute::new(ConsoleColor::Green, ConsoleColor::Black));
    }

    #[test]
    fn test_read_strips_line_terminator() {
        let mut session = session();
        session.backend_mut().push_line("hello");
        assert_eq!(session.read(Some(ConsoleColor::Aqua), None).unwrap(), "hello");
        assert_eq!(
            session.backend().attribute(),
            Attribute::new(ConsoleColor::Aqua, ConsoleColor::Black)
        );

        let mut session = live_session(MemoryConsole::new().with_terminator("\n"));
        session.backend_mut().push_line("hi");
        assert_eq!(session.read(None, None).unwrap(), "hi");

        session.backend_mut().push_line("");
        assert_eq!(session.read(None, None).unwrap(), "");
    }

    #[test]
    fn test_read_respects_input_buffer_size() {
        let mut session = session();
        session.set_input_buffer_size(3).unwrap();
        session.backend_mut().push_line("abcdef");
        assert_eq!(session.read(None, None).unwrap(), "abc");

        assert!(matches!(
            session.set_input_buffer_size(0),
            Err(ConsoleError::InvalidInputBufferSize)
        ));
        assert_eq!(session.input_buffer_size(), 3);
    }

    #[test]
    fn test_read_without_input_is_platform_error() {
        let mut session = session();
        assert!(matches!(
            session.read(None, None),
            Err(ConsoleError::Platform { operation: "read line", .. })
        ));
    }

    #[test]
    fn test_read_key_is_fifo() {
        let mut session = session();
        session.backend_mut().push_keystroke(VK_A, Some('a'));
        session.backend_mut().push_keystroke(VK_RETURN, Some('\r'));

        assert_eq!(session.read_key().unwrap(), Some(VK_A));
        assert_eq!(session.read_key().unwrap(), None); // release
        assert_eq!(session.read_key().unwrap(), Some(VK_RETURN));
        assert_eq!(session.read_key().unwrap(), None);
        assert_eq!(session.read_key().unwrap(), None); // queue empty
    }

    #[test]
    fn test_read_key_ignores_other_records() {
        let mut session = session();
        session.backend_mut().push_event(InputEvent::Resize(Size::new(90, 30)));
        session.backend_mut().push_event(InputEvent::Other);
        session
            .backend_mut()
            .push_event(InputEvent::Key(KeyRecord::pressed(0x42, Some('b'))));

        assert_eq!(session.read_key().unwrap(), None);
        assert_eq!(session.read_key().unwrap(), None);
        assert_eq!(session.read_key().unwrap(), Some(0x42));
    }

    #[test]
    fn test_echo_modes_are_relative_to_baseline() {
        let mut session = session();
        let baseline = session.backend().mode();

        session.disable_echo().unwrap();
        let disabled = session.backend().mode();
        assert_eq!(disabled, baseline.difference(InputMode::ECHO_INPUT));
        assert!(!session.is_echo_enabled());

        session.enable_echo().unwrap();
        session.enable_echo().unwrap();
        assert_eq!(session.backend().mode(), baseline | InputMode::ECHO_INPUT | InputMode::LINE_INPUT);
        assert!(session.is_echo_enabled());

        session.disable_echo().unwrap();
        assert_eq!(session.backend().mode(), disabled);
    }

    #[test]
    fn test_echo_round_trip_restores_echoless_baseline() {
        let baseline = InputMode::PROCESSED_INPUT | InputMode::LINE_INPUT;
        let mut session = live_session(MemoryConsole::new().with_input_mode(baseline));
        assert!(!session.is_echo_enabled());

        session.enable_echo().unwrap();
        assert!(session.backend().mode().contains(InputMode::ECHO_INPUT));
        session.disable_echo().unwrap();
        assert_eq!(session.backend().mode(), baseline);
    }

    #[test]
    fn test_disabled_echo_keeps_input_off_screen() {
        let mut session = session();
        session.disable_echo().unwrap();
        session.backend_mut().push_line("secret");
        assert_eq!(session.read(None, None).unwrap(), "secret");
        assert_eq!(session.backend().row_text(0), "");
    }

    #[test]
    fn test_strip_line_terminator() {
        assert_eq!(strip_line_terminator("a\r\n"), "a");
        assert_eq!(strip_line_terminator("a\n"), "a");
        assert_eq!(strip_line_terminator("a\r"), "a");
        assert_eq!(strip_line_terminator("a"), "a");
        assert_eq!(strip_line_terminator("a\n\n"), "a\n");
    }
}
