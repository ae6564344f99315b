//! Application entry point

use clap::{Parser, Subcommand};
use log::{error, info};
use std::io;
use std::path::PathBuf;

mod api;
mod chat;
mod config;
mod error;
mod find;
mod launcher;
mod store;
mod theme;
mod transform;
mod ui;

use api::ApiClient;
use config::{resolve_api_url, Settings, API_URL_ENV};
use store::LocalStore;

const LOG_FILE: &str = "lifetrace-tui.log";

#[derive(Parser)]
#[command(name = "lifetrace-tui", version, about = "Search and chat with your LifeTrace activity")]
struct Cli {
    /// Backend base URL (overrides the stored setting)
    #[arg(long, global = true, env = API_URL_ENV)]
    api_url: Option<String>,

    /// Directory holding chat history, settings and the log file
    #[arg(long, global = true, env = "LIFETRACE_TUI_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Search and time machine launcher (default)
    Search,
    /// Chat with your activity history
    Chat,
    /// Check that the backend is reachable
    Health,
    /// Search without the TUI and print the matches
    Find {
        /// Text to search for; recent records are listed when omitted
        query: Option<String>,
        /// Search individual screenshots instead of events
        #[arg(long)]
        screenshots: bool,
        /// Use semantic screenshot search
        #[arg(long, requires = "screenshots")]
        semantic: bool,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Read or change stored chat settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print one setting, or all of them
    Get { key: Option<String> },
    /// Change one setting
    Set { key: String, value: String },
    /// Reset one setting to its default
    Unset { key: String },
}

/// Log to a file in the data directory; the terminal belongs to the TUI.
fn init_logging(data_dir: &std::path::Path) {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(data_dir.join(LOG_FILE));
    let Ok(file) = file else {
        return;
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init();
}

/// Restore terminal to normal mode.
fn cleanup_terminal() {
    use std::io::Write;
    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        crossterm::event::DisableMouseCapture,
        crossterm::event::DisableBracketedPaste,
        crossterm::terminal::LeaveAlternateScreen,
        crossterm::cursor::Show
    );
    let _ = crossterm::terminal::disable_raw_mode();
    let _ = stdout.flush();
}

/// Force immediate terminal cleanup
fn force_cleanup_terminal() {
    use std::io::Write;
    let mut stdout = std::io::stdout();

    let _ = crossterm::execute!(
        stdout,
        crossterm::terminal::Clear(crossterm::terminal::ClearType::All),
        crossterm::cursor::MoveTo(0, 0)
    );

    let _ = crossterm::execute!(
        stdout,
        crossterm::terminal::LeaveAlternateScreen,
        crossterm::cursor::Show
    );

    let _ = crossterm::terminal::disable_raw_mode();
    let _ = stdout.flush();
}

/// Install panic hook to restore terminal before printing error.
fn setup_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        cleanup_terminal();
        eprintln!("Application panicked!");
        if let Some(location) = panic_info.location() {
            eprintln!("Location: {}", location);
        }
        if let Some(payload) = panic_info.payload().downcast_ref::<&str>() {
            eprintln!("Message: {}", payload);
        } else if let Some(payload) = panic_info.payload().downcast_ref::<String>() {
            eprintln!("Message: {}", payload);
        } else {
            eprintln!("No panic message available");
        }
        original_hook(panic_info);
    }));
}

/// Drain all pending input events until silence.
fn drain_input_events_until_silence(silence_duration: std::time::Duration) {
    use crossterm::event::{poll, read};

    for _ in 0..3 {
        let mut events_drained = 0;
        while poll(silence_duration).unwrap_or(false) {
            let _ = read();
            events_drained += 1;
        }
        if events_drained == 0 {
            break;
        }
    }
}

/// Disable mouse tracking modes and bracketed paste.
fn disable_all_modes() {
    use std::io::Write;
    let mut stdout = std::io::stdout();

    let _ = stdout.flush();
    let _ = crossterm::execute!(
        stdout,
        crossterm::event::DisableMouseCapture,
        crossterm::event::DisableBracketedPaste
    );
    let _ = stdout.flush();

    // Kill all potential mouse tracking modes
    let combined = "\x1b[?1000l\x1b[?1002l\x1b[?1003l\x1b[?1006l\x1b[?1015l\x1b[?1005l\x1b[?2004l";
    let _ = stdout.write_all(combined.as_bytes());
    let _ = stdout.flush();

    std::thread::sleep(std::time::Duration::from_millis(30));
}

/// Flush OS-level terminal input buffer.
#[cfg(unix)]
fn flush_stdin_buffer() {
    use std::os::unix::io::AsRawFd;
    unsafe {
        libc::tcflush(std::io::stdin().as_raw_fd(), libc::TCIFLUSH);
    }
}

#[cfg(not(unix))]
fn flush_stdin_buffer() {}

fn run_config(store: &LocalStore, action: ConfigAction) -> io::Result<()> {
    let mut settings = Settings::load(store);
    match action {
        ConfigAction::Get { key: None } => {
            let doc = serde_json::to_string_pretty(&settings).map_err(io::Error::other)?;
            println!("{}", doc);
        }
        ConfigAction::Get { key: Some(key) } => match settings.get_field(&key) {
            Some(value) => println!("{}", value),
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("unknown settings key: {} (expected one of {})", key, Settings::keys().join(", ")),
                ))
            }
        },
        ConfigAction::Set { key, value } => {
            settings
                .set_field(&key, &value)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
            settings.save(store);
            info!("Setting {} updated from the command line", key);
        }
        ConfigAction::Unset { key } => {
            settings
                .unset_field(&key)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
            settings.save(store);
        }
    }
    Ok(())
}

fn run_health(client: &ApiClient) -> io::Result<()> {
    match client.health() {
        Ok(health) => {
            println!("{}: {}", client.base_url(), health.status);
            Ok(())
        }
        Err(e) => {
            error!("Health check failed: {}", e);
            Err(io::Error::other(format!("{}: {}", client.base_url(), e)))
        }
    }
}

fn run_find(client: &ApiClient, opts: &find::FindOptions) -> io::Result<()> {
    let rows = find::find(client, opts).map_err(|e| {
        error!("Find failed: {}", e);
        io::Error::other(format!("{}: {}", client.base_url(), e))
    })?;
    if rows.is_empty() {
        println!("No results");
    }
    for row in &rows {
        println!("{}", find::format_row(row));
    }
    Ok(())
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();

    let data_dir = store::resolve_data_dir(cli.data_dir);
    let store = LocalStore::open(&data_dir).map_err(io::Error::other)?;
    init_logging(store.root());

    let command = cli.command.unwrap_or(Command::Search);
    let api_flag = cli.api_url;

    match command {
        Command::Config { action } => return run_config(&store, action),
        Command::Health => {
            let url = resolve_api_url(api_flag.as_deref(), &Settings::load(&store));
            return run_health(&ApiClient::new(url));
        }
        Command::Find {
            query,
            screenshots,
            semantic,
            limit,
        } => {
            let url = resolve_api_url(api_flag.as_deref(), &Settings::load(&store));
            let opts = find::FindOptions {
                query,
                screenshots,
                semantic,
                limit,
            };
            return run_find(&ApiClient::new(url), &opts);
        }
        Command::Search | Command::Chat => {}
    }

    setup_panic_hook();

    // Enable terminal settings
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableBracketedPaste
    )?;
    crossterm::terminal::enable_raw_mode()?;

    let backend = ratatui::backend::CrosstermBackend::new(std::io::stdout());
    let mut terminal = ratatui::Terminal::new(backend)?;

    // Run application
    let result = match command {
        Command::Chat => chat::ChatApp::new(store, api_flag).run(&mut terminal),
        _ => {
            let url = resolve_api_url(api_flag.as_deref(), &Settings::load(&store));
            launcher::LauncherApp::new(ApiClient::new(url), store).run(&mut terminal)
        }
    };

    // Terminal cleanup sequence
    disable_all_modes();
    drain_input_events_until_silence(std::time::Duration::from_millis(100));
    flush_stdin_buffer();
    force_cleanup_terminal();

    if let Err(e) = &result {
        error!("Exited with error: {}", e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_launcher() {
        let cli = Cli::try_parse_from(["lifetrace-tui"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["lifetrace-tui", "chat", "--api-url", "localhost:9000"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Chat)));
        assert_eq!(cli.api_url.as_deref(), Some("localhost:9000"));
    }

    #[test]
    fn test_config_set_and_unset() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        run_config(
            &store,
            ConfigAction::Set {
                key: "historyLimit".into(),
                value: "10".into(),
            },
        )
        .unwrap();
        assert_eq!(Settings::load(&store).history_limit, 10);

        run_config(&store, ConfigAction::Unset { key: "historyLimit".into() }).unwrap();
        assert_eq!(Settings::load(&store).history_limit, Settings::default().history_limit);

        let err = run_config(
            &store,
            ConfigAction::Set {
                key: "nope".into(),
                value: "1".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_semantic_requires_screenshots() {
        assert!(Cli::try_parse_from(["lifetrace-tui", "find", "x", "--semantic"]).is_err());
        let cli = Cli::try_parse_from(["lifetrace-tui", "find", "x", "--screenshots", "--semantic"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Find { semantic: true, limit: 20, .. })));
    }

    #[test]
    fn test_cli_verifies() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
