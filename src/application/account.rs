use crate::application::scheduled::ScheduledTask;
use crate::domain::models::{
    Credentials, Notice, validate_non_empty, validate_password_strength,
};
use crate::domain::routes::Route;
use crate::infrastructure::auth_client::{
    AuthApi, AuthResponse, ConfirmSignupRequest, ForgotPasswordRequest, ResetPasswordRequest,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::navigator::Navigator;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub const SIGNUP_NOTICE: &str =
    "Signup successful. A verification code has been sent to your email.";
pub const CONFIRM_NOTICE: &str = "Signup confirmed. You can now log in.";
pub const FORGOT_PASSWORD_NOTICE: &str = "Password reset code sent to your email";
pub const RESET_PASSWORD_NOTICE: &str = "Password reset successful";

/// Signup, confirmation and password recovery. Each success yields a notice
/// and moves the view along after the redirect delay.
pub struct AccountFlows<A, N>
where
    A: AuthApi,
    N: Navigator,
{
    auth_api: Arc<A>,
    navigator: Arc<N>,
    redirect_delay: Duration,
    pending_navigation: Mutex<Option<ScheduledTask>>,
}

impl<A, N> AccountFlows<A, N>
where
    A: AuthApi + 'static,
    N: Navigator + 'static,
{
    pub fn new(auth_api: Arc<A>, navigator: Arc<N>, redirect_delay: Duration) -> Self {
        Self {
            auth_api,
            navigator,
            redirect_delay,
            pending_navigation: Mutex::new(None),
        }
    }

    pub async fn signup(&self, email: &str, password: &str) -> Result<Notice, InfraError> {
        let credentials = Credentials::new(email, password);
        credentials
            .validate_new_password()
            .map_err(InfraError::InvalidInput)?;

        self.auth_api.signup(&credentials).await?;
        tracing::info!(email = %credentials.email, "signup accepted; awaiting confirmation");
        self.schedule(Route::Confirm);
        Ok(Notice::success(SIGNUP_NOTICE))
    }

    pub async fn confirm_signup(&self, email: &str, code: &str) -> Result<Notice, InfraError> {
        let request = ConfirmSignupRequest {
            email: email.trim().to_string(),
            code: code.trim().to_string(),
        };
        validate_non_empty(&request.email, "email").map_err(InfraError::InvalidInput)?;
        validate_non_empty(&request.code, "code").map_err(InfraError::InvalidInput)?;

        let response = self.auth_api.confirm_signup(&request).await?;
        tracing::info!(email = %request.email, "signup confirmed");
        self.schedule(Route::Login);
        Ok(success_notice(response, CONFIRM_NOTICE))
    }

    pub async fn forgot_password(&self, email: &str) -> Result<Notice, InfraError> {
        let request = ForgotPasswordRequest {
            email: email.trim().to_string(),
        };
        validate_non_empty(&request.email, "email").map_err(InfraError::InvalidInput)?;

        let response = self.auth_api.forgot_password(&request).await?;
        tracing::info!(email = %request.email, "password reset code requested");
        self.schedule(Route::ResetPassword);
        Ok(success_notice(response, FORGOT_PASSWORD_NOTICE))
    }

    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        password: &str,
    ) -> Result<Notice, InfraError> {
        let request = ResetPasswordRequest {
            email: email.trim().to_string(),
            code: code.trim().to_string(),
            password: password.to_string(),
        };
        validate_non_empty(&request.email, "email").map_err(InfraError::InvalidInput)?;
        validate_non_empty(&request.code, "code").map_err(InfraError::InvalidInput)?;
        validate_password_strength(&request.password).map_err(InfraError::InvalidInput)?;

        let response = self.auth_api.reset_password(&request).await?;
        tracing::info!(email = %request.email, "password reset");
        self.schedule(Route::Login);
        Ok(success_notice(response, RESET_PASSWORD_NOTICE))
    }

    pub fn teardown(&self) {
        self.lock_pending().take();
    }

    fn schedule(&self, target: Route) {
        let navigator = Arc::clone(&self.navigator);
        let task = ScheduledTask::after(self.redirect_delay, move || navigator.navigate(target));
        let previous = self.lock_pending().replace(task);
        drop(previous);
    }

    fn lock_pending(&self) -> MutexGuard<'_, Option<ScheduledTask>> {
        self.pending_navigation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn success_notice(response: AuthResponse, fallback: &str) -> Notice {
    let message = response
        .message
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string());
    Notice::success(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::session::tests::{FakeAuthApi, FakeReply};
    use crate::infrastructure::navigator::InMemoryNavigator;
    use std::sync::atomic::Ordering;
    use tokio::time::sleep;

    fn flows() -> (
        AccountFlows<FakeAuthApi, InMemoryNavigator>,
        Arc<FakeAuthApi>,
        Arc<InMemoryNavigator>,
    ) {
        let api = Arc::new(FakeAuthApi::default());
        let navigator = Arc::new(InMemoryNavigator::new(Route::Signup));
        let flows = AccountFlows::new(
            Arc::clone(&api),
            Arc::clone(&navigator),
            Duration::from_millis(1500),
        );
        (flows, api, navigator)
    }

    #[tokio::test(start_paused = true)]
    async fn signup_moves_to_confirm_after_delay() {
        let (flows, api, navigator) = flows();
        let notice = flows
            .signup(" new@example.com ", "password123")
            .await
            .expect("signup");
        assert_eq!(notice, Notice::success(SIGNUP_NOTICE));
        assert_eq!(api.account_calls.load(Ordering::SeqCst), 1);
        assert!(navigator.history().is_empty());

        sleep(Duration::from_millis(1600)).await;
        assert_eq!(navigator.history(), vec![Route::Confirm]);
    }

    #[tokio::test]
    async fn short_password_is_rejected_without_a_request() {
        let (flows, api, _navigator) = flows();
        let error = flows
            .signup("new@example.com", "short")
            .await
            .expect_err("weak password");
        assert!(matches!(error, InfraError::InvalidInput(_)));
        assert_eq!(api.account_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn server_detail_is_surfaced_verbatim() {
        let (flows, api, navigator) = flows();
        api.push_account(FakeReply::Rejected("User already exists".to_string()));
        let error = flows
            .signup("new@example.com", "password123")
            .await
            .expect_err("duplicate");
        assert_eq!(error.to_string(), "User already exists");
        assert!(navigator.history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn confirm_prefers_server_message() {
        let (flows, api, navigator) = flows();
        api.push_account(FakeReply::message("User confirmed successfully"));
        let notice = flows
            .confirm_signup("new@example.com", " 123456 ")
            .await
            .expect("confirm");
        assert_eq!(notice.message, "User confirmed successfully");

        sleep(Duration::from_secs(2)).await;
        assert_eq!(navigator.current_route(), Route::Login);
    }

    #[tokio::test]
    async fn confirm_requires_code() {
        let (flows, api, _navigator) = flows();
        let error = flows
            .confirm_signup("new@example.com", "  ")
            .await
            .expect_err("missing code");
        assert_eq!(error.to_string(), "code must not be empty");
        assert_eq!(api.account_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn forgot_password_falls_back_to_default_notice() {
        let (flows, api, navigator) = flows();
        api.push_account(FakeReply::Ok(AuthResponse::default()));
        let notice = flows
            .forgot_password("user@example.com")
            .await
            .expect("forgot password");
        assert_eq!(notice.message, FORGOT_PASSWORD_NOTICE);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(navigator.history(), vec![Route::ResetPassword]);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_cancels_pending_navigation() {
        let (flows, _api, navigator) = flows();
        flows
            .reset_password("user@example.com", "123456", "new-password")
            .await
            .expect("reset");
        flows.teardown();

        sleep(Duration::from_secs(3)).await;
        assert!(navigator.history().is_empty());
    }
}
