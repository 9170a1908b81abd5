//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes. Navigation keys go through `App::navigate`,
//! so the access guards see every attempted screen change.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use crate::app::{
    can_add_email_char, can_add_password_char, App, AppState, LoginFocus, Route,
};

/// Handle keyboard input. Returns true if the app should quit.
pub async fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    // Handle help overlay
    if matches!(app.state, AppState::ShowingHelp) {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
            app.state = AppState::Normal;
        }
        return Ok(false);
    }

    // Handle quit confirmation
    if matches!(app.state, AppState::ConfirmingQuit) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                app.state = AppState::Quitting;
                return Ok(true);
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.state = AppState::Normal;
            }
            _ => {}
        }
        return Ok(false);
    }

    // The sign-in screen owns the keyboard while it is active
    if app.route == Route::Login {
        return handle_login_input(app, key).await;
    }

    // Global keys
    match key.code {
        KeyCode::Char('q') => {
            app.state = AppState::ConfirmingQuit;
        }
        KeyCode::Char('?') => {
            app.state = AppState::ShowingHelp;
        }
        KeyCode::Char('1') => app.navigate(Route::Templates),
        KeyCode::Char('2') => app.navigate(Route::Environments),
        KeyCode::Char('3') => app.navigate(Route::Account),
        KeyCode::Tab => app.navigate(app.route.next()),
        KeyCode::BackTab => app.navigate(app.route.prev()),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
        KeyCode::Char('r') => {
            app.status_message = None;
            app.refresh_background();
        }
        KeyCode::Char('o') => {
            app.logout();
        }
        _ => {}
    }

    Ok(false)
}

async fn handle_login_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    // Ignore everything while a submission is running; the form is disabled
    if app.login_in_flight {
        return Ok(false);
    }

    match key.code {
        KeyCode::Esc => {
            // Quit if on the sign-in screen
            app.state = AppState::Quitting;
            return Ok(true);
        }
        KeyCode::Down | KeyCode::Tab => {
            // Move to next field
            app.login_focus = match app.login_focus {
                LoginFocus::Email => LoginFocus::Password,
                LoginFocus::Password => LoginFocus::Button,
                LoginFocus::Button => LoginFocus::Email,
            };
        }
        KeyCode::Up | KeyCode::BackTab => {
            // Move to previous field
            app.login_focus = match app.login_focus {
                LoginFocus::Email => LoginFocus::Button,
                LoginFocus::Password => LoginFocus::Email,
                LoginFocus::Button => LoginFocus::Password,
            };
        }
        KeyCode::Enter => {
            match app.login_focus {
                LoginFocus::Email => {
                    app.login_focus = LoginFocus::Password;
                }
                LoginFocus::Password => {
                    app.login_focus = LoginFocus::Button;
                }
                LoginFocus::Button => {
                    // Attempt login; on failure login_error is set for display
                    let _ = app.attempt_login().await;
                }
            }
        }
        KeyCode::Backspace => {
            match app.login_focus {
                LoginFocus::Email => {
                    app.login_email.pop();
                }
                LoginFocus::Password => {
                    app.login_password.pop();
                }
                LoginFocus::Button => {}
            }
        }
        KeyCode::Char(c) => {
            match app.login_focus {
                LoginFocus::Email => {
                    if can_add_email_char(app.login_email.len(), c) {
                        app.login_email.push(c);
                    }
                }
                LoginFocus::Password => {
                    if can_add_password_char(app.login_password.len(), c) {
                        app.login_password.push(c);
                    }
                }
                LoginFocus::Button => {}
            }
        }
        _ => {}
    }

    Ok(false)
}
