use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Root,
    Login,
    Signup,
    Confirm,
    ForgotPassword,
    ResetPassword,
    Tasks,
    EditTask(i64),
    Dashboard,
    Events,
    Unknown(String),
}

impl Route {
    /// Parses a router location; query string and fragment are ignored.
    pub fn parse(location: &str) -> Self {
        let path = location
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim()
            .trim_end_matches('/');
        let segments = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>();

        match segments.as_slice() {
            [] => Self::Root,
            ["login"] => Self::Login,
            ["signup"] => Self::Signup,
            ["confirm"] => Self::Confirm,
            ["forgot-password"] => Self::ForgotPassword,
            ["reset-password"] => Self::ResetPassword,
            ["tasks"] => Self::Tasks,
            ["edit-task", id] => id
                .parse::<i64>()
                .map(Self::EditTask)
                .unwrap_or_else(|_| Self::Unknown(format!("/{}", segments.join("/")))),
            ["dashboard"] => Self::Dashboard,
            ["events"] => Self::Events,
            _ => Self::Unknown(format!("/{}", segments.join("/"))),
        }
    }

    pub fn path(&self) -> String {
        match self {
            Self::Root => "/".to_string(),
            Self::Login => "/login".to_string(),
            Self::Signup => "/signup".to_string(),
            Self::Confirm => "/confirm".to_string(),
            Self::ForgotPassword => "/forgot-password".to_string(),
            Self::ResetPassword => "/reset-password".to_string(),
            Self::Tasks => "/tasks".to_string(),
            Self::EditTask(id) => format!("/edit-task/{id}"),
            Self::Dashboard => "/dashboard".to_string(),
            Self::Events => "/events".to_string(),
            Self::Unknown(path) => path.clone(),
        }
    }

    /// Views reachable without a session. A failed session probe never
    /// redirects away from these.
    pub fn is_auth_route(&self) -> bool {
        matches!(
            self,
            Self::Login | Self::Signup | Self::Confirm | Self::ForgotPassword | Self::ResetPassword
        )
    }

    /// `/` and unmatched paths land on the task list.
    pub fn resolve(self) -> Self {
        match self {
            Self::Root | Self::Unknown(_) => Self::Tasks,
            route => route,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

impl Serialize for Route {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_auth_routes_with_query_and_trailing_slash() {
        assert_eq!(Route::parse("/signup"), Route::Signup);
        assert_eq!(Route::parse("/reset-password/?email=a%40b.c"), Route::ResetPassword);
        assert_eq!(Route::parse("/confirm#code"), Route::Confirm);
        assert!(Route::parse("/forgot-password").is_auth_route());
    }

    #[test]
    fn protected_routes_are_not_auth_routes() {
        for location in ["/tasks", "/dashboard", "/events", "/edit-task/4", "/"] {
            assert!(!Route::parse(location).is_auth_route(), "{location}");
        }
    }

    #[test]
    fn edit_task_requires_numeric_id() {
        assert_eq!(Route::parse("/edit-task/42"), Route::EditTask(42));
        assert_eq!(
            Route::parse("/edit-task/abc"),
            Route::Unknown("/edit-task/abc".to_string())
        );
    }

    #[test]
    fn root_and_unknown_resolve_to_tasks() {
        assert_eq!(Route::parse("/").resolve(), Route::Tasks);
        assert_eq!(Route::parse("/nope").resolve(), Route::Tasks);
        assert_eq!(Route::parse("/login").resolve(), Route::Login);
    }

    #[test]
    fn path_round_trips_through_parse() {
        let route = Route::EditTask(7);
        assert_eq!(Route::parse(&route.path()), route);
        assert_eq!(Route::Login.to_string(), "/login");
    }
}
