//! winconsole - console session demo
//!
//! Drives the native console through a [`ConsoleSession`]: sets the caption,
//! optionally resizes the window, prints the 16-color palette, reads a line
//! and echoes key presses until Esc.
//!
//! # Quick Start
//!
//! ```text
//! winconsole                 # Demo with ~/.winconsole/config.toml
//! winconsole --size 100x30   # Resize the window first
//! winconsole --no-input      # Output only
//! ```

use std::env;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use winconsole::config::home_dir;
use winconsole::keys::VK_ESCAPE;
use winconsole::{platform, ConsoleBackend, ConsoleColor, ConsoleSession, SessionConfig, Size};

/// Command line options
#[derive(Debug, Default, PartialEq)]
struct Options {
    /// Config file overriding ~/.winconsole/config.toml
    config_path: Option<PathBuf>,
    /// Window size to apply after create
    size: Option<Size>,
    /// Skip the line read and key poll
    no_input: bool,
    verbose: bool,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Key poll interval
const POLL_INTERVAL: Duration = Duration::from_millis(10);

fn print_version() {
    eprintln!("winconsole {}", VERSION);
}

fn print_help() {
    eprintln!("winconsole {} - Windows console session demo", VERSION);
    eprintln!();
    eprintln!("Usage: winconsole [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <PATH>       Load session settings from PATH");
    eprintln!("  --size <WxH>          Resize the window, e.g. 100x30");
    eprintln!("  --no-input            Do not read a line or poll keys");
    eprintln!("  --verbose             Log at debug level");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Configuration: ~/.winconsole/config.toml");
    eprintln!("Log file:      ~/.winconsole/winconsole.log (RUST_LOG overrides the level)");
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut options = Options::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "--config" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing config path".to_string());
                }
                options.config_path = Some(PathBuf::from(&args[i]));
            }
            "--size" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing window size".to_string());
                }
                let size = parse_size(&args[i])
                    .ok_or_else(|| format!("Invalid window size: {} (expected WxH)", args[i]))?;
                options.size = Some(size);
            }
            "--no-input" => {
                options.no_input = true;
            }
            "--verbose" => {
                options.verbose = true;
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(options)
}

/// Parse `WxH`, e.g. `100x30`
fn parse_size(text: &str) -> Option<Size> {
    let (width, height) = text.split_once(['x', 'X'])?;
    Some(Size::new(width.trim().parse().ok()?, height.trim().parse().ok()?))
}

/// Log to ~/.winconsole/winconsole.log; stdout belongs to the console
fn init_logging(verbose: bool) {
    let log_path = home_dir()
        .map(|h| h.join(".winconsole").join("winconsole.log"))
        .unwrap_or_else(|| PathBuf::from("winconsole.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let level = if verbose { "debug" } else { "info" };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let options = match parse_args(&args) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging(options.verbose);
    info!("winconsole {} starting...", VERSION);

    let config = match &options.config_path {
        Some(path) => SessionConfig::load_from(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => SessionConfig::load(),
    };

    let mut session = ConsoleSession::with_config(platform::native(), &config);
    session.create().context("Failed to create console session")?;

    let result = run_demo(&mut session, &options);
    session.destroy().context("Failed to destroy console session")?;
    info!("winconsole exiting");
    result
}

fn run_demo<B: ConsoleBackend>(session: &mut ConsoleSession<B>, options: &Options) -> anyhow::Result<()> {
    if session.caption().is_empty() {
        session.set_caption(&format!("winconsole {}", VERSION))?;
    }
    if let Some(size) = options.size {
        session
            .set_window_size(size.width, size.height)
            .with_context(|| format!("Failed to resize window to {}", size))?;
    }

    let largest = session.largest_window_size()?;
    let banner = format!(
        "winconsole {} - window {}, buffer {}, largest {}",
        VERSION,
        session.window_size(),
        session.buffer_size(),
        largest
    );
    session.clear(None)?;
    session.writeln(&banner, Some(ConsoleColor::White), None)?;
    session.writeln("", None, None)?;
    write_palette(session)?;

    if options.no_input {
        return Ok(());
    }

    session.write("Your name: ", Some(ConsoleColor::Yellow), None)?;
    let name = session.read(Some(ConsoleColor::Aqua), None)?;
    session.writeln(&format!("Hello, {}!", name), Some(ConsoleColor::Green), None)?;

    session.disable_echo()?;
    session.hide_cursor()?;
    session.writeln("Press keys (Esc to quit)...", None, None)?;
    loop {
        match session.read_key()? {
            Some(VK_ESCAPE) => break,
            Some(vk) => {
                session.clearln()?;
                session.write(&format!("key 0x{:02X}", vk), Some(ConsoleColor::Grey), None)?;
            }
            None => thread::sleep(POLL_INTERVAL),
        }
    }
    session.writeln("", None, None)?;
    session.show_cursor()?;
    session.enable_echo()?;
    Ok(())
}

/// Print every color as a swatch followed by its name, four per row
fn write_palette<B: ConsoleBackend>(session: &mut ConsoleSession<B>) -> anyhow::Result<()> {
    for (i, color) in ConsoleColor::ALL.iter().enumerate() {
        session.write("  ", None, Some(*color))?;
        session.write(&format!(" {:<13}", color.name()), None, None)?;
        if i % 4 == 3 {
            session.writeln("", None, None)?;
        }
    }
    session.writeln("", None, None)?;
    Ok(())
}
