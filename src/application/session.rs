use crate::application::scheduled::ScheduledTask;
use crate::domain::models::{Credentials, SESSION_ACTIVE_MESSAGE, Session};
use crate::domain::routes::Route;
use crate::infrastructure::auth_client::{AuthApi, AuthResponse};
use crate::infrastructure::config::{ClientConfig, RetryPolicy};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::navigator::Navigator;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub main_route: Route,
    pub redirect_delay: Duration,
    pub probe_retry: RetryPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for SessionSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            main_route: config.main_route.clone(),
            redirect_delay: config.redirect_delay,
            probe_retry: config.probe_retry.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionStatus {
    /// The probe has not answered yet.
    Loading,
    Authenticated { session: Session },
    Anonymous,
    /// The probe gave up after its retries; the user is treated as signed out
    /// but not redirected.
    Unreachable { reason: String },
}

impl SessionStatus {
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Authenticated { session } => Some(session),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "route", rename_all = "snake_case")]
pub enum RouteDecision {
    Allow,
    /// Session state unknown; render a loading view.
    Pending,
    Redirect(Route),
}

#[derive(Debug)]
pub struct LogoutOutcome {
    /// Server-side failure, if any. Local state is cleared either way.
    pub server_error: Option<InfraError>,
}

#[derive(Debug)]
struct SessionRuntime {
    status: SessionStatus,
    probe_started: bool,
}

pub struct SessionManager<A, N>
where
    A: AuthApi,
    N: Navigator,
{
    settings: SessionSettings,
    auth_api: Arc<A>,
    navigator: Arc<N>,
    runtime: Mutex<SessionRuntime>,
    pending_navigation: Mutex<Option<ScheduledTask>>,
}

impl<A, N> SessionManager<A, N>
where
    A: AuthApi + 'static,
    N: Navigator + 'static,
{
    pub fn new(settings: SessionSettings, auth_api: Arc<A>, navigator: Arc<N>) -> Self {
        Self {
            settings,
            auth_api,
            navigator,
            runtime: Mutex::new(SessionRuntime {
                status: SessionStatus::Loading,
                probe_started: false,
            }),
            pending_navigation: Mutex::new(None),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.lock_runtime().status.clone()
    }

    pub fn navigator(&self) -> &Arc<N> {
        &self.navigator
    }

    /// One-shot probe of `/auth/session`. Later calls return the current
    /// status without touching the network.
    pub async fn check_session(&self) -> Result<SessionStatus, InfraError> {
        {
            let mut runtime = self.lock_runtime();
            if runtime.probe_started {
                return Ok(runtime.status.clone());
            }
            runtime.probe_started = true;
        }

        let outcome = self.probe_with_retry().await;
        let mut redirect = false;
        let status = {
            let mut runtime = self.lock_runtime();
            if runtime.status != SessionStatus::Loading {
                // A login finished while the probe was in flight; it wins.
                tracing::debug!("session probe result ignored; status already settled");
                return Ok(runtime.status.clone());
            }

            runtime.status = match outcome {
                Ok(response) if response.message.as_deref() == Some(SESSION_ACTIVE_MESSAGE) => {
                    tracing::info!("session restored");
                    SessionStatus::Authenticated {
                        session: Session::authenticated(response.message, response.fields, None),
                    }
                }
                Ok(response) => {
                    tracing::warn!(
                        message = response.message.as_deref().unwrap_or_default(),
                        "unrecognized session probe answer"
                    );
                    SessionStatus::Anonymous
                }
                Err(InfraError::AuthExpired) => {
                    redirect = true;
                    SessionStatus::Anonymous
                }
                Err(error) => {
                    tracing::error!(%error, "session probe failed");
                    SessionStatus::Unreachable {
                        reason: error.to_string(),
                    }
                }
            };
            runtime.status.clone()
        };

        if redirect {
            let current = self.navigator.current_route();
            if current.is_auth_route() {
                tracing::debug!(route = %current, "no session; staying on auth route");
            } else {
                tracing::info!(from = %current, "no session; redirecting to login");
                self.navigator.navigate(Route::Login);
            }
        }

        Ok(status)
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<Session, InfraError> {
        let response = self.auth_api.login(credentials).await?;
        Ok(self.complete_login(response, &credentials.email))
    }

    /// Stores a successful login answer and schedules the hop to the main
    /// view, leaving time for the success notice.
    pub fn complete_login(&self, response: AuthResponse, email: &str) -> Session {
        let session = Session::authenticated(response.message, response.fields, Some(email));
        {
            let mut runtime = self.lock_runtime();
            runtime.status = SessionStatus::Authenticated {
                session: session.clone(),
            };
            runtime.probe_started = true;
        }
        tracing::info!(email = session.email.as_deref().unwrap_or_default(), "logged in");

        let navigator = Arc::clone(&self.navigator);
        let target = self.settings.main_route.clone();
        let task = ScheduledTask::after(self.settings.redirect_delay, move || {
            navigator.navigate(target);
        });
        self.replace_pending_navigation(Some(task));
        session
    }

    /// Clears the local session and returns to login whatever the server
    /// says; a failed call is logged and reported in the outcome.
    pub async fn logout(&self) -> LogoutOutcome {
        self.replace_pending_navigation(None);
        let server_error = match self.auth_api.logout().await {
            Ok(()) => None,
            Err(error) => {
                tracing::warn!(%error, "logout request failed; clearing local session anyway");
                Some(error)
            }
        };

        self.clear();
        self.navigator.navigate(Route::Login);
        LogoutOutcome { server_error }
    }

    /// Drops local session state, e.g. after a resource call answered 401.
    pub fn clear(&self) {
        let mut runtime = self.lock_runtime();
        runtime.status = SessionStatus::Anonymous;
        runtime.probe_started = true;
    }

    pub fn guard_route(&self, route: &Route) -> RouteDecision {
        if route.is_auth_route() {
            return RouteDecision::Allow;
        }
        match self.lock_runtime().status {
            SessionStatus::Authenticated { .. } => RouteDecision::Allow,
            SessionStatus::Loading => RouteDecision::Pending,
            SessionStatus::Anonymous | SessionStatus::Unreachable { .. } => {
                RouteDecision::Redirect(Route::Login)
            }
        }
    }

    /// Cancels background work; called on teardown.
    pub fn shutdown(&self) {
        self.replace_pending_navigation(None);
    }

    pub fn has_pending_navigation(&self) -> bool {
        self.lock_pending()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    async fn probe_with_retry(&self) -> Result<AuthResponse, InfraError> {
        let max_attempts = self.settings.probe_retry.max_attempts.max(1);
        let mut attempt: u8 = 0;

        loop {
            match self.auth_api.session().await {
                Ok(response) => return Ok(response),
                Err(error) if error.is_transient() && attempt + 1 < max_attempts => {
                    let delay = self.settings.probe_retry.delay_for(attempt);
                    tracing::warn!(
                        %error,
                        attempt = attempt + 1,
                        max_attempts,
                        "session probe failed; retrying in {}ms",
                        delay.as_millis()
                    );
                    sleep(delay).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn replace_pending_navigation(&self, task: Option<ScheduledTask>) {
        let previous = std::mem::replace(&mut *self.lock_pending(), task);
        drop(previous);
    }

    fn lock_runtime(&self) -> MutexGuard<'_, SessionRuntime> {
        self.runtime.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_pending(&self) -> MutexGuard<'_, Option<ScheduledTask>> {
        self.pending_navigation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
