use chrono::Utc;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use outpost_core::guard::GuardOutcome;
use outpost_core::models::EnvironmentStatus;

use crate::app::{App, AppState, LoginFocus, Route};

use super::styles;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Length(3), // Nav tabs
            Constraint::Min(10),   // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    render_nav(frame, app, chunks[1]);
    render_main_content(frame, app, chunks[2]);
    render_status_bar(frame, app, chunks[3]);

    // Render overlays
    if matches!(app.state, AppState::ShowingHelp) {
        render_help_overlay(frame);
    }

    if matches!(app.state, AppState::ConfirmingQuit) {
        render_quit_overlay(frame);
    }
}

fn render_title_bar(frame: &mut Frame, _app: &App, area: Rect) {
    let title = "  Outpost";
    let help_hint = "[?] Help";
    let title_len = title.len();

    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat(
            area.width
                .saturating_sub(title_len as u16 + help_hint.len() as u16 + 4)
                as usize,
        )),
        Span::styled(help_hint, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let paragraph = Paragraph::new(title_line).block(block);
    frame.render_widget(paragraph, area);
}

/// Nav tabs are part of the authenticated surface; anonymous users get a
/// sign-in hint instead.
fn render_nav(frame: &mut Frame, app: &App, area: Rect) {
    let spans = if app.session.is_authenticated() {
        let tabs = vec![
            ("[1] Templates", app.route == Route::Templates),
            ("[2] Environments", app.route == Route::Environments),
            ("[3] Account", app.route == Route::Account),
        ];

        let mut spans = vec![Span::raw(" ")];
        for (i, (label, selected)) in tabs.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled(" | ", styles::muted_style()));
            }
            if *selected {
                spans.push(Span::styled(*label, styles::tab_style(true)));
            } else {
                spans.push(Span::styled(*label, styles::muted_style()));
            }
        }
        spans
    } else {
        vec![
            Span::raw(" "),
            Span::styled("Sign in to browse the catalog", styles::muted_style()),
        ]
    };

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_main_content(frame: &mut Frame, app: &App, area: Rect) {
    // An unsettled session blocks every screen behind a neutral indicator
    if matches!(app.current_outcome(), GuardOutcome::Pending) {
        render_pending(frame, area);
        return;
    }

    match app.route {
        Route::Login => render_login(frame, app, area),
        Route::Templates => render_templates(frame, app, area),
        Route::Environments => render_environments(frame, app, area),
        Route::Account => render_account(frame, app, area),
    }
}

fn render_pending(frame: &mut Frame, area: Rect) {
    let box_area = centered_rect_fixed(30, 3, area);
    let paragraph = Paragraph::new(Line::from(Span::styled(
        " Checking session...",
        styles::muted_style(),
    )))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(styles::border_style(false)),
    );
    frame.render_widget(paragraph, box_area);
}

fn render_login(frame: &mut Frame, app: &App, area: Rect) {
    let height = if app.login_error.is_some() { 12 } else { 10 };
    let box_area = centered_rect_fixed(46, height, area);

    frame.render_widget(Clear, box_area);

    let mut lines = vec![];

    lines.push(Line::from(Span::styled(
        "      ── Outpost · Sign in ──",
        styles::title_style(),
    )));
    lines.push(Line::from(""));

    // Email field
    let email_focused = app.login_focus == LoginFocus::Email;
    let email_style = if email_focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let email_display = format!("{:<24}", app.login_email);
    let cursor = if email_focused { "▌" } else { "" };
    lines.push(Line::from(vec![
        Span::raw("   "),
        Span::styled("Email:    [", styles::muted_style()),
        Span::styled(format!("{}{}", email_display, cursor), email_style),
        Span::styled("]", styles::muted_style()),
    ]));

    // Password field (masked)
    let password_focused = app.login_focus == LoginFocus::Password;
    let password_style = if password_focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let password_masked: String = "*".repeat(app.login_password.len().min(24));
    let password_display = format!("{:<24}", password_masked);
    let cursor = if password_focused { "▌" } else { "" };
    lines.push(Line::from(vec![
        Span::raw("   "),
        Span::styled("Password: [", styles::muted_style()),
        Span::styled(format!("{}{}", password_display, cursor), password_style),
        Span::styled("]", styles::muted_style()),
    ]));

    // Submit button, disabled while a submission is in flight
    let button_focused = app.login_focus == LoginFocus::Button;
    let button_style = if button_focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    lines.push(Line::from(""));
    let label = if app.login_in_flight {
        " Signing in... ".to_string()
    } else if button_focused {
        " ▶ Sign in ◀ ".to_string()
    } else {
        "   Sign in   ".to_string()
    };
    lines.push(Line::from(vec![
        Span::raw("            ["),
        Span::styled(label, button_style),
        Span::raw("]"),
    ]));

    if let Some(ref error) = app.login_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" {}", error),
            styles::error_style(),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), box_area);
}

fn render_templates(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = vec![];

    if app.templates.is_empty() {
        let hint = if app.refreshing {
            " Loading templates..."
        } else {
            " No templates. Press [r] to refresh."
        };
        lines.push(Line::from(Span::styled(hint, styles::muted_style())));
    } else {
        lines.push(Line::from(Span::styled(
            format!("  {:<28} {:<12} {:>6}", "NAME", "VERSION", "USERS"),
            styles::muted_style(),
        )));
        for (i, template) in app.templates.iter().enumerate() {
            let selected = i == app.template_selection;
            let marker = if selected { "▶ " } else { "  " };
            let style = if selected {
                styles::selected_style()
            } else if template.deprecated {
                styles::muted_style()
            } else {
                styles::list_item_style()
            };
            let name = if template.deprecated {
                format!("{} (deprecated)", template.name)
            } else {
                template.name.clone()
            };
            lines.push(Line::from(Span::styled(
                format!(
                    "{}{:<28} {:<12} {:>6}",
                    marker,
                    name,
                    template.version_display(),
                    template.active_user_count
                ),
                style,
            )));
        }

        if let Some(selected) = app.templates.get(app.template_selection) {
            if let Some(ref description) = selected.description {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(
                    format!("  {}", description),
                    styles::highlight_style(),
                )));
            }
        }
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Templates ")
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_environments(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = vec![];

    if app.environments.is_empty() {
        let hint = if app.refreshing {
            " Loading environments..."
        } else {
            " No environments yet."
        };
        lines.push(Line::from(Span::styled(hint, styles::muted_style())));
    } else {
        lines.push(Line::from(Span::styled(
            format!("  {:<24} {:<20} {:<10}", "NAME", "TEMPLATE", "STATUS"),
            styles::muted_style(),
        )));
        for (i, env) in app.environments.iter().enumerate() {
            let selected = i == app.environment_selection;
            let marker = if selected { "▶ " } else { "  " };
            let row_style = if selected {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            let status_style = match env.status {
                EnvironmentStatus::Running => styles::success_style(),
                EnvironmentStatus::Failed => styles::error_style(),
                _ => styles::muted_style(),
            };
            lines.push(Line::from(vec![
                Span::styled(
                    format!(
                        "{}{:<24} {:<20} ",
                        marker,
                        env.name,
                        env.template_name.as_deref().unwrap_or("-")
                    ),
                    row_style,
                ),
                Span::styled(format!("{:<10}", env.status.to_string()), status_style),
            ]));
        }
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Environments ")
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_account(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = vec![];

    if let Some(identity) = app.session.identity() {
        lines.push(Line::from(vec![
            Span::styled("  Signed in as ", styles::muted_style()),
            Span::styled(identity.greeting_name().to_string(), styles::title_style()),
        ]));
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("  Email:      ", styles::muted_style()),
            Span::styled(identity.email.clone(), styles::list_item_style()),
        ]));
        lines.push(Line::from(vec![
            Span::styled("  Account id: ", styles::muted_style()),
            Span::styled(identity.id.clone(), styles::list_item_style()),
        ]));
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("  Press ", styles::muted_style()),
            Span::styled("[o]", styles::help_key_style()),
            Span::styled(" to sign out", styles::muted_style()),
        ]));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Account ")
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![Span::raw(" ")];

    if let Some(identity) = app.session.identity() {
        spans.push(Span::styled(identity.email.clone(), styles::success_style()));
    } else {
        spans.push(Span::styled("not signed in", styles::muted_style()));
    }

    if let Some(ref message) = app.status_message {
        spans.push(Span::raw("  │  "));
        spans.push(Span::styled(message.clone(), styles::highlight_style()));
    } else if app.refreshing {
        spans.push(Span::raw("  │  "));
        spans.push(Span::styled("refreshing...", styles::muted_style()));
    } else if let Some(refreshed) = app.last_refreshed {
        let minutes = (Utc::now() - refreshed).num_minutes();
        let age = if minutes < 1 {
            "updated just now".to_string()
        } else {
            format!("updated {}m ago", minutes)
        };
        spans.push(Span::raw("  │  "));
        spans.push(Span::styled(age, styles::muted_style()));
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(styles::status_bar_style());
    frame.render_widget(paragraph, area);
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(44, 13, frame.area());
    frame.render_widget(Clear, area);

    let entry = |key: &'static str, desc: &'static str| {
        Line::from(vec![
            Span::raw("  "),
            Span::styled(format!("{:<8}", key), styles::help_key_style()),
            Span::styled(desc, styles::help_desc_style()),
        ])
    };

    let help_text = vec![
        Line::from(Span::styled("  Keys", styles::title_style())),
        Line::from(""),
        entry("1/2/3", "Switch screen"),
        entry("Tab", "Next screen"),
        entry("↑/↓", "Move selection"),
        entry("r", "Refresh data"),
        entry("o", "Sign out"),
        entry("q", "Quit"),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Press ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" to close", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(help_text).block(block), area);
}

fn render_quit_overlay(frame: &mut Frame) {
    // Fixed size dialog matching the help overlay
    let area = centered_rect_fixed(34, 5, frame.area());
    frame.render_widget(Clear, area);

    let text = vec![
        Line::from(""),
        Line::from(vec![
            Span::raw("   Quit? "),
            Span::styled("[y]", styles::help_key_style()),
            Span::raw("es / "),
            Span::styled("[n]", styles::help_key_style()),
            Span::raw("o"),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(text).block(block), area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}
