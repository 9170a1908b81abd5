//! Outpost TUI - a terminal client for the Outpost template catalog and
//! environment provisioner.
//!
//! This application provides a fast, keyboard-driven interface for browsing
//! templates and environments behind a token-based session.

mod app;
mod ui;

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use outpost_core::api::ApiClient;
use outpost_core::auth::{CredentialStore, SessionManager, TokenStore};
use outpost_core::config::Config;

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

/// Log file name in the state directory
const LOG_FILE: &str = "outpost.log";

fn env_filter() -> EnvFilter {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Initialize tracing for the TUI. The terminal belongs to ratatui, so log
/// lines go to a file in the state directory. The returned guard must stay
/// alive for the worker to flush.
fn init_tracing_to_file(state_dir: &PathBuf) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    if std::fs::create_dir_all(state_dir).is_err() {
        return None;
    }
    let file_appender = tracing_appender::rolling::never(state_dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(env_filter())
        .init();

    Some(guard)
}

/// Initialize tracing to stderr for CLI mode
fn init_tracing_to_stderr() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    // Check for CLI commands
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 && args[1] == "--login" {
        init_tracing_to_stderr();
        return cli_login().await;
    }

    let config = Config::load().unwrap_or_default();
    let state_dir = config
        .state_dir()
        .unwrap_or_else(|_| PathBuf::from("./state"));
    let _log_guard = init_tracing_to_file(&state_dir);
    info!("Outpost TUI starting");

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create app and settle the session before the first keypress
    let mut app = App::new()?;
    app.initialize_session().await;

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("Outpost TUI shutting down");
    Ok(())
}

/// Sign in from the terminal without starting the TUI
async fn cli_login() -> Result<()> {
    let mut config = Config::load().unwrap_or_default();
    let api = ApiClient::new(config.base_url())?;
    let state_dir = config
        .state_dir()
        .unwrap_or_else(|_| PathBuf::from("./state"));
    let mut session = SessionManager::new(TokenStore::new(state_dir), api);

    let snapshot = session.initialize().await;
    if let Some(identity) = snapshot.identity {
        println!("Already signed in as {}", identity.email);
        return Ok(());
    }

    println!("\n=== Outpost Login ===\n");

    let email = if let Some(ref last_email) = config.last_email {
        print!("Email [{}]: ", last_email);
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim();

        if input.is_empty() {
            last_email.clone()
        } else {
            input.to_string()
        }
    } else {
        prompt_email()?
    };

    let password = if CredentialStore::has_credentials(&email) {
        print!("Use stored password? [Y/n]: ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if input.trim().to_lowercase() != "n" {
            CredentialStore::get_password(&email)?
        } else {
            prompt_password()?
        }
    } else {
        prompt_password()?
    };

    println!("\nAuthenticating...");

    let snapshot = session.login(&email, &password).await?;

    CredentialStore::store(&email, &password)?;
    config.last_email = Some(email);
    config.save()?;

    let signed_in_as = snapshot
        .identity
        .map(|i| i.email)
        .unwrap_or_default();
    println!("Login successful! Signed in as {}\n", signed_in_as);
    Ok(())
}

fn prompt_email() -> Result<String> {
    print!("Email: ");
    io::stdout().flush()?;

    let mut email = String::new();
    io::stdin().read_line(&mut email)?;
    Ok(email.trim().to_string())
}

fn prompt_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ")?;
    Ok(password)
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                // Handle input
                if handle_input(app, key).await? {
                    return Ok(());
                }
            }
        }

        // Check for completed background tasks
        app.check_background_tasks();

        // Check if we should quit
        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}
