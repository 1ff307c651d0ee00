use crate::application::account::AccountFlows;
use crate::application::lockout::LoginGuard;
use crate::application::session::{SessionManager, SessionSettings, SessionStatus};
use crate::domain::models::{Credentials, Notice, Session};
use crate::domain::routes::Route;
use crate::infrastructure::auth_client::AuthApi;
use crate::infrastructure::config::ClientConfig;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::navigator::Navigator;
use serde::Serialize;
use std::sync::Arc;

pub const LOGIN_NOTICE: &str = "Login successful";
pub const LOGOUT_NOTICE: &str = "Logged out";

#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub session: Session,
    pub notice: Notice,
}

/// Application-wide auth context: the session, the login lockout and the
/// account flows, created once and torn down on exit.
pub struct AuthStore<A, N>
where
    A: AuthApi,
    N: Navigator,
{
    session: Arc<SessionManager<A, N>>,
    login: LoginGuard<A, N>,
    account: AccountFlows<A, N>,
}

impl<A, N> AuthStore<A, N>
where
    A: AuthApi + 'static,
    N: Navigator + 'static,
{
    pub fn new(config: &ClientConfig, auth_api: Arc<A>, navigator: Arc<N>) -> Self {
        let session = Arc::new(SessionManager::new(
            SessionSettings::from(config),
            Arc::clone(&auth_api),
            Arc::clone(&navigator),
        ));
        let login = LoginGuard::new(
            Arc::clone(&session),
            config.max_login_attempts,
            config.default_lockout_seconds,
        );
        let account = AccountFlows::new(auth_api, navigator, config.redirect_delay);
        Self {
            session,
            login,
            account,
        }
    }

    pub fn session(&self) -> &SessionManager<A, N> {
        &self.session
    }

    pub fn login_guard(&self) -> &LoginGuard<A, N> {
        &self.login
    }

    pub fn account(&self) -> &AccountFlows<A, N> {
        &self.account
    }

    /// Runs the one-shot session probe.
    pub async fn init(&self) -> Result<SessionStatus, InfraError> {
        self.session.check_session().await
    }

    pub async fn login(&self, credentials: Credentials) -> Result<LoginOutcome, InfraError> {
        let session = self.login.submit(credentials).await?;
        let message = session
            .message
            .clone()
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| LOGIN_NOTICE.to_string());
        Ok(LoginOutcome {
            session,
            notice: Notice::success(message),
        })
    }

    pub async fn logout(&self) -> Notice {
        let outcome = self.session.logout().await;
        match outcome.server_error {
            None => Notice::success(LOGOUT_NOTICE),
            Some(error) => Notice::warning(format!(
                "{LOGOUT_NOTICE} locally; the server did not confirm: {error}"
            )),
        }
    }

    /// Reacts to a failed resource call: a 401 there means the session
    /// cookie is gone, so local state follows.
    pub fn observe_resource_error(&self, error: &InfraError) {
        if matches!(error, InfraError::AuthExpired) {
            tracing::info!("resource call unauthorized; clearing session");
            self.session.clear();
            if !self.session.navigator().current_route().is_auth_route() {
                self.session.navigator().navigate(Route::Login);
            }
        }
    }

    /// Cancels the countdown and any scheduled navigation.
    pub fn teardown(&self) {
        self.login.teardown();
        self.account.teardown();
        self.session.shutdown();
    }
}
