use crate::application::scheduled::ScheduledTask;
use crate::application::session::SessionManager;
use crate::domain::lockout::{LockoutSnapshot, LockoutState, TickOutcome};
use crate::domain::models::{Credentials, Session};
use crate::infrastructure::auth_client::AuthApi;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::navigator::Navigator;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, interval_at};

const COUNTDOWN_PERIOD: Duration = Duration::from_secs(1);

/// Login form controller: mirrors the server lockout, intercepts
/// submissions while locked and drives the visible countdown.
pub struct LoginGuard<A, N>
where
    A: AuthApi,
    N: Navigator,
{
    session: Arc<SessionManager<A, N>>,
    state: Arc<Mutex<LockoutState>>,
    updates: Arc<watch::Sender<LockoutSnapshot>>,
    latest_ticket: AtomicU64,
    default_lockout_seconds: u64,
    countdown: Mutex<Option<ScheduledTask>>,
}

impl<A, N> LoginGuard<A, N>
where
    A: AuthApi + 'static,
    N: Navigator + 'static,
{
    pub fn new(
        session: Arc<SessionManager<A, N>>,
        max_attempts: u8,
        default_lockout_seconds: u64,
    ) -> Self {
        let state = LockoutState::new(max_attempts);
        let (updates, _) = watch::channel(state.snapshot());
        Self {
            session,
            state: Arc::new(Mutex::new(state)),
            updates: Arc::new(updates),
            latest_ticket: AtomicU64::new(0),
            default_lockout_seconds,
            countdown: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> LockoutSnapshot {
        lock_state(&self.state).snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<LockoutSnapshot> {
        self.updates.subscribe()
    }

    pub fn has_countdown(&self) -> bool {
        self.lock_countdown()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    pub async fn submit(&self, credentials: Credentials) -> Result<Session, InfraError> {
        {
            let state = lock_state(&self.state);
            if state.is_locked() {
                let remaining_seconds = state.lockout_seconds_remaining();
                tracing::debug!(remaining_seconds, "login intercepted while locked");
                return Err(InfraError::LockedOut { remaining_seconds });
            }
        }
        credentials.validate().map_err(InfraError::InvalidInput)?;

        let ticket = self.latest_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        let result = self.session.login(&credentials).await;

        if self.latest_ticket.load(Ordering::SeqCst) != ticket {
            tracing::debug!(ticket, "discarding stale login response");
            return result;
        }
        self.apply(&result);
        result
    }

    /// Aborts the countdown. The lock itself stays as it is; the next
    /// submission is still intercepted until the server answers otherwise.
    pub fn teardown(&self) {
        self.replace_countdown(None);
    }

    fn apply(&self, result: &Result<Session, InfraError>) {
        match result {
            Ok(_) => {
                lock_state(&self.state).record_success();
                self.replace_countdown(None);
            }
            Err(InfraError::InvalidCredentials {
                attempts_remaining, ..
            }) => {
                let mut state = lock_state(&self.state);
                state.record_invalid_credentials(*attempts_remaining);
                tracing::info!(
                    remaining_attempts = state.remaining_attempts(),
                    "login rejected"
                );
            }
            Err(InfraError::RateLimited {
                retry_after_seconds,
                ..
            }) => {
                let seconds = retry_after_seconds.unwrap_or(self.default_lockout_seconds);
                let locked = lock_state(&self.state).record_rate_limited(seconds);
                if locked {
                    tracing::warn!(seconds, "login locked out by server");
                    self.start_countdown();
                } else {
                    self.replace_countdown(None);
                }
            }
            Err(error) => {
                tracing::warn!(%error, "login failed");
                return;
            }
        }
        self.publish();
    }

    fn start_countdown(&self) {
        let state = Arc::clone(&self.state);
        let updates = Arc::clone(&self.updates);
        let task = ScheduledTask::spawn(async move {
            let mut ticker = interval_at(Instant::now() + COUNTDOWN_PERIOD, COUNTDOWN_PERIOD);
            loop {
                ticker.tick().await;
                let (outcome, snapshot) = {
                    let mut state = lock_state(&state);
                    let outcome = state.tick();
                    (outcome, state.snapshot())
                };
                updates.send_replace(snapshot);
                match outcome {
                    TickOutcome::Counting(_) => {}
                    TickOutcome::Unlocked => {
                        tracing::info!("login lockout expired");
                        break;
                    }
                    TickOutcome::Idle => break,
                }
            }
        });
        self.replace_countdown(Some(task));
    }

    fn publish(&self) {
        self.updates.send_replace(self.snapshot());
    }

    fn replace_countdown(&self, task: Option<ScheduledTask>) {
        let previous = std::mem::replace(&mut *self.lock_countdown(), task);
        drop(previous);
    }

    fn lock_countdown(&self) -> MutexGuard<'_, Option<ScheduledTask>> {
        self.countdown.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn lock_state(state: &Mutex<LockoutState>) -> MutexGuard<'_, LockoutState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::session::tests::{FakeAuthApi, FakeReply, fast_settings};
    use crate::domain::lockout::{DEFAULT_LOCKOUT_SECONDS, MAX_LOGIN_ATTEMPTS};
    use crate::domain::routes::Route;
    use crate::infrastructure::navigator::InMemoryNavigator;
    use tokio::time::sleep;

    fn guard() -> (
        LoginGuard<FakeAuthApi, InMemoryNavigator>,
        Arc<FakeAuthApi>,
    ) {
        let api = Arc::new(FakeAuthApi::default());
        let navigator = Arc::new(InMemoryNavigator::new(Route::Login));
        let session = Arc::new(SessionManager::new(
            fast_settings(),
            Arc::clone(&api),
            navigator,
        ));
        let guard = LoginGuard::new(session, MAX_LOGIN_ATTEMPTS, DEFAULT_LOCKOUT_SECONDS);
        (guard, api)
    }

    fn credentials() -> Credentials {
        Credentials::new("user@example.com", "password123")
    }

    fn rate_limited(detail: &str, seconds: u64) -> FakeReply {
        FakeReply::RateLimited {
            detail: detail.to_string(),
            seconds: Some(seconds),
        }
    }

    #[tokio::test]
    async fn unauthorized_reply_updates_remaining_attempts() {
        let (guard, api) = guard();
        api.push_login(FakeReply::Unauthorized {
            detail: "Incorrect username or password. 2 attempts remaining".to_string(),
            attempts: Some(2),
        });

        let error = guard.submit(credentials()).await.expect_err("rejected");
        assert_eq!(
            error.to_string(),
            "Incorrect username or password. 2 attempts remaining"
        );
        let snapshot = guard.snapshot();
        assert_eq!(snapshot.remaining_attempts, 2);
        assert_eq!(snapshot.attempts_warning.as_deref(), Some("2 attempts remaining"));
        assert!(!snapshot.is_locked);
    }

    #[tokio::test]
    async fn success_resets_attempts() {
        let (guard, api) = guard();
        api.push_login(FakeReply::Unauthorized {
            detail: "1 attempt remaining".to_string(),
            attempts: Some(1),
        });
        let _ = guard.submit(credentials()).await;
        guard.submit(credentials()).await.expect("login");
        assert_eq!(guard.snapshot().remaining_attempts, MAX_LOGIN_ATTEMPTS);
        assert_eq!(api.login_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn locked_guard_makes_no_network_call() {
        let (guard, api) = guard();
        api.push_login(rate_limited("Try again in 2m 30s", 150));
        let _ = guard.submit(credentials()).await;
        assert_eq!(api.login_calls.load(Ordering::SeqCst), 1);

        let error = guard.submit(credentials()).await.expect_err("locked");
        assert!(matches!(
            error,
            InfraError::LockedOut {
                remaining_seconds: 150
            }
        ));
        assert_eq!(
            error.to_string(),
            "Too many failed login attempts. Try again in 02:30"
        );
        assert_eq!(api.login_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_ticks_once_per_second() {
        let (guard, api) = guard();
        let mut updates = guard.subscribe();
        api.push_login(rate_limited("Try again in 2m 30s", 150));
        let _ = guard.submit(credentials()).await;
        assert_eq!(guard.snapshot().lockout_seconds_remaining, 150);
        assert!(updates.has_changed().expect("sender alive"));
        assert_eq!(
            updates.borrow_and_update().countdown.as_deref(),
            Some("02:30")
        );

        sleep(Duration::from_millis(1500)).await;
        assert_eq!(guard.snapshot().lockout_seconds_remaining, 149);
        sleep(Duration::from_secs(2)).await;
        assert_eq!(guard.snapshot().lockout_seconds_remaining, 147);
        assert_eq!(updates.borrow().lockout_seconds_remaining, 147);
    }

    #[tokio::test(start_paused = true)]
    async fn last_second_unlocks_and_allows_submission() {
        let (guard, api) = guard();
        api.push_login(rate_limited("Try again in 0m 1s", 1));
        let _ = guard.submit(credentials()).await;
        assert!(guard.snapshot().is_locked);

        sleep(Duration::from_millis(1100)).await;
        let snapshot = guard.snapshot();
        assert!(!snapshot.is_locked);
        assert_eq!(snapshot.lockout_seconds_remaining, 0);
        assert!(!guard.has_countdown());

        guard.submit(credentials()).await.expect("login");
        assert_eq!(api.login_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_duration_does_not_lock() {
        let (guard, api) = guard();
        api.push_login(rate_limited("Too many attempts", 0));
        let _ = guard.submit(credentials()).await;
        assert!(!guard.snapshot().is_locked);
        assert!(!guard.has_countdown());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_duration_uses_configured_default() {
        let (guard, api) = guard();
        api.push_login(FakeReply::RateLimited {
            detail: "Too many attempts".to_string(),
            seconds: None,
        });
        let error = guard.submit(credentials()).await.expect_err("rate limited");
        assert!(matches!(
            error,
            InfraError::RateLimited {
                retry_after_seconds: None,
                ..
            }
        ));

        let snapshot = guard.snapshot();
        assert!(snapshot.is_locked);
        assert_eq!(snapshot.lockout_seconds_remaining, DEFAULT_LOCKOUT_SECONDS);
        assert_eq!(snapshot.lockout_seconds_remaining, 300);
        assert!(guard.has_countdown());

        sleep(Duration::from_millis(1500)).await;
        assert_eq!(guard.snapshot().lockout_seconds_remaining, 299);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_stops_the_countdown() {
        let (guard, api) = guard();
        api.push_login(rate_limited("Try again in 2m 30s", 150));
        let _ = guard.submit(credentials()).await;
        assert!(guard.has_countdown());

        guard.teardown();
        assert!(!guard.has_countdown());
        sleep(Duration::from_secs(5)).await;
        assert_eq!(guard.snapshot().lockout_seconds_remaining, 150);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_login_response_is_discarded() {
        let (guard, api) = guard();
        api.push_login_delay(Duration::from_millis(200));
        api.push_login_delay(Duration::from_millis(10));
        api.push_login(FakeReply::Unauthorized {
            detail: "1 attempt remaining".to_string(),
            attempts: Some(1),
        });
        api.push_login(FakeReply::Unauthorized {
            detail: "2 attempts remaining".to_string(),
            attempts: Some(2),
        });

        let (first, second) = tokio::join!(
            guard.submit(credentials()),
            guard.submit(credentials())
        );
        assert!(first.is_err());
        assert!(second.is_err());
        // The older submission answered last; its count is ignored.
        assert_eq!(guard.snapshot().remaining_attempts, 2);
    }

    #[tokio::test]
    async fn empty_credentials_are_rejected_locally() {
        let (guard, api) = guard();
        let error = guard
            .submit(Credentials::new("  ", "password123"))
            .await
            .expect_err("invalid");
        assert!(matches!(error, InfraError::InvalidInput(_)));
        assert_eq!(api.login_calls.load(Ordering::SeqCst), 0);
    }
}
