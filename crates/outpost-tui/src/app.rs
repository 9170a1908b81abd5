//! Application state management for the Outpost TUI.
//!
//! This module contains the core `App` struct that owns the session state
//! machine, the API client, the route table, and background task
//! coordination. All navigation goes through the access guards; the active
//! route's guard is re-evaluated after every session change so a logout
//! revokes protected screens immediately.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{info, warn};

use outpost_core::api::{ApiClient, ApiError};
use outpost_core::auth::{CredentialStore, SessionManager, TokenStore};
use outpost_core::config::Config;
use outpost_core::guard::{
    AccessGuard, GuardOutcome, NavigationIntent, RequireAnonymous, RequireAuthenticated,
};
use outpost_core::models::{Environment, Template};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
/// A refresh produces a handful of messages; 8 leaves headroom.
const CHANNEL_BUFFER_SIZE: usize = 8;

/// Maximum length for email input.
/// 64 chars covers practically every real account email.
const MAX_EMAIL_LENGTH: usize = 64;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

// ============================================================================
// Routes
// ============================================================================

/// The client's navigable screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Templates,
    Environments,
    Account,
}

impl Route {
    /// Default destination for an authenticated user
    pub const HOME: Route = Route::Templates;

    /// Where denied navigations are sent to sign in
    pub const SIGN_IN: Route = Route::Login;

    /// Stable path string, used by guards and navigation intents
    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Templates => "/templates",
            Route::Environments => "/environments",
            Route::Account => "/account",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "/login" => Some(Route::Login),
            "/templates" => Some(Route::Templates),
            "/environments" => Some(Route::Environments),
            "/account" => Some(Route::Account),
            _ => None,
        }
    }

    /// Get the next protected route (wrapping around)
    pub fn next(&self) -> Self {
        match self {
            Route::Templates => Route::Environments,
            Route::Environments => Route::Account,
            Route::Account => Route::Templates,
            Route::Login => Route::Login,
        }
    }

    /// Get the previous protected route (wrapping around)
    pub fn prev(&self) -> Self {
        match self {
            Route::Templates => Route::Account,
            Route::Environments => Route::Templates,
            Route::Account => Route::Environments,
            Route::Login => Route::Login,
        }
    }
}

// ============================================================================
// UI State Types
// ============================================================================

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    ShowingHelp,
    ConfirmingQuit,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoginFocus {
    Email,
    Password,
    Button,
}

/// Check whether another character fits in the email field
pub fn can_add_email_char(len: usize, c: char) -> bool {
    len < MAX_EMAIL_LENGTH && !c.is_control()
}

/// Check whether another character fits in the password field
pub fn can_add_password_char(len: usize, c: char) -> bool {
    len < MAX_PASSWORD_LENGTH && !c.is_control()
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Result types from background refresh tasks.
///
/// These variants are sent through an MPSC channel from the background
/// refresh task back to the main application.
enum RefreshResult {
    /// Template catalog fetched successfully
    Templates(Vec<Template>),
    /// Environment list fetched successfully
    Environments(Vec<Environment>),
    /// Signal that all refresh tasks have completed
    RefreshComplete,
    /// An error occurred during refresh
    Error(String),
}

// ============================================================================
// Main Application Struct
// ============================================================================

/// Main application state container
pub struct App {
    // Core services
    pub config: Config,
    pub session: SessionManager<ApiClient>,
    pub api: ApiClient,

    // Routing
    pub route: Route,
    pending_intent: Option<NavigationIntent>,
    require_auth: RequireAuthenticated,
    require_anon: RequireAnonymous,

    // UI state
    pub state: AppState,
    pub status_message: Option<String>,

    // Login form state
    pub login_email: String,
    pub login_password: String,
    pub login_focus: LoginFocus,
    pub login_error: Option<String>,
    pub login_in_flight: bool,

    // Cached data
    pub templates: Vec<Template>,
    pub environments: Vec<Environment>,
    pub template_selection: usize,
    pub environment_selection: usize,
    pub last_refreshed: Option<DateTime<Utc>>,
    pub refreshing: bool,

    // Background task channel
    refresh_rx: mpsc::Receiver<RefreshResult>,
    refresh_tx: mpsc::Sender<RefreshResult>,
}

impl App {
    /// Create a new application instance. The session starts `Unknown`;
    /// call `initialize_session` before the event loop.
    pub fn new() -> anyhow::Result<Self> {
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };

        let api = ApiClient::new(config.base_url())?;

        let state_dir = config
            .state_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("./state"));
        let store = TokenStore::new(state_dir);
        let session = SessionManager::new(store, api.clone());

        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        // Prefill credentials from env vars or config
        let login_email = std::env::var("OUTPOST_EMAIL")
            .ok()
            .or_else(|| config.last_email.clone())
            .unwrap_or_default();
        let login_password = std::env::var("OUTPOST_PASSWORD").unwrap_or_default();

        Ok(Self {
            config,
            session,
            api,

            route: Route::HOME,
            pending_intent: None,
            require_auth: RequireAuthenticated::new(Route::SIGN_IN.path()),
            require_anon: RequireAnonymous::new(Route::HOME.path()),

            state: AppState::Normal,
            status_message: None,

            login_focus: if login_email.is_empty() {
                LoginFocus::Email
            } else {
                LoginFocus::Password
            },
            login_email,
            login_password,
            login_error: None,
            login_in_flight: false,

            templates: Vec::new(),
            environments: Vec::new(),
            template_selection: 0,
            environment_selection: 0,
            last_refreshed: None,
            refreshing: false,

            refresh_rx: rx,
            refresh_tx: tx,
        })
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    /// Settle the session from storage and enforce the active route.
    /// Invoked once before the event loop starts.
    pub async fn initialize_session(&mut self) {
        let snapshot = self.session.initialize().await;

        if let Some(credential) = self.session.credential() {
            self.api.set_token(credential.to_string());
        }

        self.enforce_route();

        if snapshot.is_authenticated() {
            self.refresh_background();
        }
    }

    /// Attempt login with the credentials from the login form
    pub async fn attempt_login(&mut self) -> anyhow::Result<()> {
        if self.login_in_flight {
            // A submission is already running; the form is disabled
            return Ok(());
        }

        let email = self.login_email.trim().to_string();
        let password = self.login_password.clone();

        if email.is_empty() || password.is_empty() {
            self.login_error = Some("Email and password required".to_string());
            return Err(anyhow::anyhow!("Email and password required"));
        }

        self.login_error = None;
        self.login_in_flight = true;
        let result = self.session.login(&email, &password).await;
        self.login_in_flight = false;

        match result {
            Ok(_snapshot) => {
                if let Err(e) = CredentialStore::store(&email, &password) {
                    warn!(error = %e, "Failed to store credentials");
                }

                self.config.last_email = Some(email);
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }

                if let Some(credential) = self.session.credential() {
                    self.api.set_token(credential.to_string());
                }

                self.login_password.clear();

                // Honor the destination captured when a guard denied access
                let destination = self
                    .pending_intent
                    .take()
                    .and_then(|intent| Route::from_path(&intent.return_to))
                    .unwrap_or(Route::HOME);
                self.navigate(destination);

                self.refresh_background();
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Login failed");
                self.login_error = Some(login_error_message(&e));
                self.enforce_route();
                Err(e.into())
            }
        }
    }

    /// Drop the session and return to the sign-in screen
    pub fn logout(&mut self) {
        self.session.logout();
        self.api.clear_token();
        self.templates.clear();
        self.environments.clear();
        self.last_refreshed = None;
        self.status_message = Some("Signed out".to_string());
        self.enforce_route();
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Navigate to a route, subject to its guard. A denial captures the
    /// destination so the sign-in flow can return there.
    pub fn navigate(&mut self, route: Route) {
        let outcome = self
            .guard_for(route)
            .evaluate(&self.session.snapshot(), route.path());
        match outcome {
            GuardOutcome::Allow | GuardOutcome::Pending => {
                // Pending renders as the neutral waiting screen for this route
                self.route = route;
            }
            GuardOutcome::Redirect { to, intent } => {
                if let Some(intent) = intent {
                    info!(return_to = %intent.return_to, "Navigation denied, capturing intent");
                    self.pending_intent = Some(intent);
                }
                self.route = Route::from_path(&to).unwrap_or(Route::SIGN_IN);
            }
        }
    }

    /// Re-run the active route's guard. Called after every session change:
    /// a logout while a protected screen is displayed must redirect
    /// immediately, not at the next keypress.
    pub fn enforce_route(&mut self) {
        self.navigate(self.route);
    }

    /// Guard outcome for the active route, consulted by the renderer
    pub fn current_outcome(&self) -> GuardOutcome {
        self.guard_for(self.route)
            .evaluate(&self.session.snapshot(), self.route.path())
    }

    fn guard_for(&self, route: Route) -> &dyn AccessGuard {
        match route {
            Route::Login => &self.require_anon,
            _ => &self.require_auth,
        }
    }

    // =========================================================================
    // Background Data Refresh
    // =========================================================================

    /// Spawn a background task to refresh the template and environment lists
    pub fn refresh_background(&mut self) {
        if self.refreshing {
            return;
        }
        if !self.session.is_authenticated() {
            return;
        }

        info!("Starting background refresh");
        self.refreshing = true;

        let api = self.api.clone();
        let tx = self.refresh_tx.clone();

        tokio::spawn(async move {
            let (templates, environments) =
                futures::future::join(api.fetch_templates(), api.fetch_environments()).await;

            match templates {
                Ok(t) => {
                    let _ = tx.send(RefreshResult::Templates(t)).await;
                }
                Err(e) => {
                    let _ = tx.send(RefreshResult::Error(format!("templates: {}", e))).await;
                }
            }

            match environments {
                Ok(envs) => {
                    let _ = tx.send(RefreshResult::Environments(envs)).await;
                }
                Err(e) => {
                    let _ = tx
                        .send(RefreshResult::Error(format!("environments: {}", e)))
                        .await;
                }
            }

            let _ = tx.send(RefreshResult::RefreshComplete).await;
        });
    }

    /// Drain completed background task results into application state
    pub fn check_background_tasks(&mut self) {
        while let Ok(result) = self.refresh_rx.try_recv() {
            match result {
                RefreshResult::Templates(templates) => {
                    self.templates = templates;
                    self.template_selection = self
                        .template_selection
                        .min(self.templates.len().saturating_sub(1));
                }
                RefreshResult::Environments(environments) => {
                    self.environments = environments;
                    self.environment_selection = self
                        .environment_selection
                        .min(self.environments.len().saturating_sub(1));
                }
                RefreshResult::RefreshComplete => {
                    self.refreshing = false;
                    self.last_refreshed = Some(Utc::now());
                }
                RefreshResult::Error(msg) => {
                    warn!(error = %msg, "Background refresh failed");
                    self.status_message = Some(format!("Refresh failed: {}", msg));
                }
            }
        }
    }

    // =========================================================================
    // List selection
    // =========================================================================

    pub fn select_next(&mut self) {
        match self.route {
            Route::Templates => {
                if !self.templates.is_empty() {
                    self.template_selection =
                        (self.template_selection + 1).min(self.templates.len() - 1);
                }
            }
            Route::Environments => {
                if !self.environments.is_empty() {
                    self.environment_selection =
                        (self.environment_selection + 1).min(self.environments.len() - 1);
                }
            }
            _ => {}
        }
    }

    pub fn select_prev(&mut self) {
        match self.route {
            Route::Templates => {
                self.template_selection = self.template_selection.saturating_sub(1);
            }
            Route::Environments => {
                self.environment_selection = self.environment_selection.saturating_sub(1);
            }
            _ => {}
        }
    }
}

/// Map a login failure to the message shown on the form
fn login_error_message(error: &ApiError) -> String {
    match error {
        ApiError::InvalidCredentials | ApiError::Unauthorized => {
            "Invalid email or password".to_string()
        }
        ApiError::NetworkError(e) if e.is_timeout() => {
            "Connection timed out. Please try again.".to_string()
        }
        ApiError::NetworkError(_) => {
            "Unable to connect to server. Check your internet connection.".to_string()
        }
        ApiError::RateLimited => "Too many attempts. Please wait and try again.".to_string(),
        other => format!("Login failed: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_paths_round_trip() {
        for route in [Route::Login, Route::Templates, Route::Environments, Route::Account] {
            assert_eq!(Route::from_path(route.path()), Some(route));
        }
        assert_eq!(Route::from_path("/nope"), None);
    }

    #[test]
    fn test_route_cycling_skips_login() {
        assert_eq!(Route::Templates.next(), Route::Environments);
        assert_eq!(Route::Account.next(), Route::Templates);
        assert_eq!(Route::Templates.prev(), Route::Account);
        // The sign-in screen is not part of the tab cycle
        assert_eq!(Route::Login.next(), Route::Login);
    }

    #[test]
    fn test_login_error_messages() {
        assert_eq!(
            login_error_message(&ApiError::InvalidCredentials),
            "Invalid email or password"
        );
        assert!(login_error_message(&ApiError::RateLimited).contains("wait"));
        assert!(
            login_error_message(&ApiError::ServerError("boom".to_string()))
                .starts_with("Login failed")
        );
    }

    #[test]
    fn test_input_length_guards() {
        assert!(can_add_email_char(0, 'a'));
        assert!(!can_add_email_char(MAX_EMAIL_LENGTH, 'a'));
        assert!(!can_add_email_char(0, '\n'));
        assert!(can_add_password_char(MAX_PASSWORD_LENGTH - 1, '!'));
        assert!(!can_add_password_char(MAX_PASSWORD_LENGTH, '!'));
    }
}
