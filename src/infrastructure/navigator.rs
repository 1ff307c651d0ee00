use crate::domain::routes::Route;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Navigations kept for inspection; older entries are dropped first.
pub const HISTORY_LIMIT: usize = 64;

/// Seam between the client core and whatever router renders the views.
pub trait Navigator: Send + Sync {
    fn current_route(&self) -> Route;
    fn navigate(&self, route: Route);
}

#[derive(Debug)]
struct RouterState {
    current: Route,
    history: VecDeque<Route>,
}

type NavigationListener = Box<dyn Fn(&Route) + Send + Sync>;

/// Router state held in process memory. The desktop shell keeps it in sync
/// with the webview location and installs a listener that forwards each
/// navigation to the webview; tests read back the navigation history.
pub struct InMemoryNavigator {
    state: Mutex<RouterState>,
    listener: Mutex<Option<NavigationListener>>,
}

impl InMemoryNavigator {
    pub fn new(initial: Route) -> Self {
        Self {
            state: Mutex::new(RouterState {
                current: initial,
                history: VecDeque::with_capacity(HISTORY_LIMIT),
            }),
            listener: Mutex::new(None),
        }
    }

    pub fn set_listener<F>(&self, listener: F)
    where
        F: Fn(&Route) + Send + Sync + 'static,
    {
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(listener));
    }

    /// Records a location change made by the view layer itself (links, back
    /// button). Not counted as a navigation issued by the core.
    pub fn set_current(&self, route: Route) {
        self.lock().current = route;
    }

    /// The most recent navigations issued through [`Navigator::navigate`],
    /// oldest first, at most [`HISTORY_LIMIT`] of them.
    pub fn history(&self) -> Vec<Route> {
        self.lock().history.iter().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, RouterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for InMemoryNavigator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryNavigator")
            .field("state", &*self.lock())
            .finish_non_exhaustive()
    }
}

impl Default for InMemoryNavigator {
    fn default() -> Self {
        Self::new(Route::Root)
    }
}

impl Navigator for InMemoryNavigator {
    fn current_route(&self) -> Route {
        self.lock().current.clone()
    }

    fn navigate(&self, route: Route) {
        {
            let mut state = self.lock();
            state.current = route.clone();
            if state.history.len() == HISTORY_LIMIT {
                state.history.pop_front();
            }
            state.history.push_back(route.clone());
        }
        tracing::debug!(route = %route, "navigate");
        if let Some(listener) = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            listener(&route);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigate_updates_current_and_history() {
        let navigator = InMemoryNavigator::new(Route::Tasks);
        navigator.navigate(Route::Login);
        assert_eq!(navigator.current_route(), Route::Login);
        assert_eq!(navigator.history(), vec![Route::Login]);
    }

    #[test]
    fn listener_sees_each_navigation() {
        let navigator = InMemoryNavigator::default();
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let sink = std::sync::Arc::clone(&seen);
        navigator.set_listener(move |route| {
            sink.lock().expect("sink poisoned").push(route.path());
        });

        navigator.navigate(Route::Login);
        navigator.navigate(Route::EditTask(4));
        assert_eq!(
            *seen.lock().expect("sink poisoned"),
            vec!["/login".to_string(), "/edit-task/4".to_string()]
        );
    }

    #[test]
    fn view_driven_changes_are_not_history() {
        let navigator = InMemoryNavigator::default();
        navigator.set_current(Route::Signup);
        assert_eq!(navigator.current_route(), Route::Signup);
        assert!(navigator.history().is_empty());
    }

    #[test]
    fn history_keeps_only_the_latest_navigations() {
        let navigator = InMemoryNavigator::default();
        for id in 0..(HISTORY_LIMIT as i64 + 10) {
            navigator.navigate(Route::EditTask(id));
        }

        let history = navigator.history();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history.first(), Some(&Route::EditTask(10)));
        assert_eq!(
            history.last(),
            Some(&Route::EditTask(HISTORY_LIMIT as i64 + 9))
        );
        assert_eq!(
            navigator.current_route(),
            Route::EditTask(HISTORY_LIMIT as i64 + 9)
        );
    }
}
