use crate::application::bootstrap::{BootstrapResult, bootstrap_workspace};
use crate::application::session::{RouteDecision, SessionStatus};
use crate::application::store::{AuthStore, LoginOutcome};
use crate::application::task_list::TaskList;
use crate::domain::lockout::LockoutSnapshot;
use crate::domain::models::{
    CompletedTask, Credentials, DashboardSummary, Event, EventDraft, Notice, Page, Task, TaskDraft,
    TaskPriority, TaskStatus, TaskUpdate, UpdatedTask,
};
use crate::domain::routes::Route;
use crate::infrastructure::auth_client::{AuthApi, ReqwestAuthClient};
use crate::infrastructure::config::ClientConfig;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::http::build_http_client;
use crate::infrastructure::navigator::InMemoryNavigator;
use crate::infrastructure::resource_client::{
    DEFAULT_PER_PAGE, EventPageQuery, ReqwestResourceClient, ResourceApi,
};
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The backend keys tasks by user id but the session payload does not
/// always carry one; it serves a single account.
const DEFAULT_USER_ID: i64 = 1;

const DUE_DATE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

pub struct AppState<A = ReqwestAuthClient, R = ReqwestResourceClient>
where
    A: AuthApi,
    R: ResourceApi,
{
    workspace_root: PathBuf,
    config_dir: PathBuf,
    logs_dir: PathBuf,
    config: ClientConfig,
    navigator: Arc<InMemoryNavigator>,
    store: AuthStore<A, InMemoryNavigator>,
    resources: Arc<R>,
    tasks: TaskList<R>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let client = build_http_client(&bootstrap.config)?;
        let base_url = bootstrap.config.api_base_url.clone();

        let auth_api = Arc::new(ReqwestAuthClient::new(client.clone(), base_url.clone()));
        let resources = Arc::new(ReqwestResourceClient::new(client, base_url));
        Ok(Self::with_backends(bootstrap, auth_api, resources))
    }
}

impl<A, R> AppState<A, R>
where
    A: AuthApi + 'static,
    R: ResourceApi + 'static,
{
    pub fn with_backends(bootstrap: BootstrapResult, auth_api: Arc<A>, resources: Arc<R>) -> Self {
        let navigator = Arc::new(InMemoryNavigator::default());
        let store = AuthStore::new(&bootstrap.config, auth_api, Arc::clone(&navigator));
        let tasks = TaskList::new(Arc::clone(&resources), DEFAULT_USER_ID);
        tracing::info!(
            api_base_url = %bootstrap.config.api_base_url,
            workspace = %bootstrap.workspace_root.display(),
            "app state ready"
        );

        Self {
            workspace_root: bootstrap.workspace_root,
            config_dir: bootstrap.config_dir,
            logs_dir: bootstrap.logs_dir,
            config: bootstrap.config,
            navigator,
            store,
            resources,
            tasks,
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn navigator(&self) -> &Arc<InMemoryNavigator> {
        &self.navigator
    }

    pub fn store(&self) -> &AuthStore<A, InMemoryNavigator> {
        &self.store
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        tracing::info!(command, "{message}");
    }

    pub fn log_error(&self, command: &str, message: &str) {
        tracing::error!(command, "{message}");
    }

    fn observed<T>(&self, result: Result<T, InfraError>) -> Result<T, InfraError> {
        if let Err(error) = &result {
            self.store.observe_resource_error(error);
        }
        result
    }

    fn signed_in_user_id(&self) -> Result<i64, InfraError> {
        match self.store.session().status() {
            SessionStatus::Authenticated { session } => {
                Ok(session.user_id().unwrap_or(DEFAULT_USER_ID))
            }
            _ => Err(InfraError::AuthExpired),
        }
    }
}

pub async fn check_session_impl<A, R>(state: &AppState<A, R>) -> Result<SessionStatus, InfraError>
where
    A: AuthApi + 'static,
    R: ResourceApi + 'static,
{
    state.store.init().await
}

pub async fn login_impl<A, R>(
    state: &AppState<A, R>,
    email: String,
    password: String,
) -> Result<LoginOutcome, InfraError>
where
    A: AuthApi + 'static,
    R: ResourceApi + 'static,
{
    let outcome = state.store.login(Credentials::new(email, password)).await?;
    state.log_info("login", "login accepted");
    Ok(outcome)
}

pub async fn logout_impl<A, R>(state: &AppState<A, R>) -> Notice
where
    A: AuthApi + 'static,
    R: ResourceApi + 'static,
{
    state.store.logout().await
}

pub fn guard_route_impl<A, R>(state: &AppState<A, R>, location: String) -> RouteDecision
where
    A: AuthApi + 'static,
    R: ResourceApi + 'static,
{
    let route = Route::parse(&location).resolve();
    state.store.session().guard_route(&route)
}

/// Records a location change made by the webview and returns the guard
/// decision for it.
pub fn set_route_impl<A, R>(state: &AppState<A, R>, location: String) -> RouteDecision
where
    A: AuthApi + 'static,
    R: ResourceApi + 'static,
{
    let route = Route::parse(&location).resolve();
    state.navigator.set_current(route.clone());
    state.store.session().guard_route(&route)
}

pub fn get_session_state_impl<A, R>(state: &AppState<A, R>) -> SessionStatus
where
    A: AuthApi + 'static,
    R: ResourceApi + 'static,
{
    state.store.session().status()
}

pub fn get_lockout_state_impl<A, R>(state: &AppState<A, R>) -> LockoutSnapshot
where
    A: AuthApi + 'static,
    R: ResourceApi + 'static,
{
    state.store.login_guard().snapshot()
}

pub async fn signup_impl<A, R>(
    state: &AppState<A, R>,
    email: String,
    password: String,
) -> Result<Notice, InfraError>
where
    A: AuthApi + 'static,
    R: ResourceApi + 'static,
{
    state.store.account().signup(&email, &password).await
}

pub async fn confirm_signup_impl<A, R>(
    state: &AppState<A, R>,
    email: String,
    code: String,
) -> Result<Notice, InfraError>
where
    A: AuthApi + 'static,
    R: ResourceApi + 'static,
{
    state.store.account().confirm_signup(&email, &code).await
}

pub async fn forgot_password_impl<A, R>(
    state: &AppState<A, R>,
    email: String,
) -> Result<Notice, InfraError>
where
    A: AuthApi + 'static,
    R: ResourceApi + 'static,
{
    state.store.account().forgot_password(&email).await
}

pub async fn reset_password_impl<A, R>(
    state: &AppState<A, R>,
    email: String,
    code: String,
    password: String,
) -> Result<Notice, InfraError>
where
    A: AuthApi + 'static,
    R: ResourceApi + 'static,
{
    state
        .store
        .account()
        .reset_password(&email, &code, &password)
        .await
}

pub async fn list_tasks_impl<A, R>(
    state: &AppState<A, R>,
    page: Option<u32>,
) -> Result<Page<Task>, InfraError>
where
    A: AuthApi + 'static,
    R: ResourceApi + 'static,
{
    let user_id = state.observed(state.signed_in_user_id())?;
    state.tasks.set_user(user_id);
    let result = match page {
        Some(page) => state.tasks.load(page).await,
        None => state.tasks.refresh().await,
    };
    state.observed(result)
}

pub async fn complete_task_impl<A, R>(
    state: &AppState<A, R>,
    task_id: i64,
) -> Result<Notice, InfraError>
where
    A: AuthApi + 'static,
    R: ResourceApi + 'static,
{
    state.observed(state.signed_in_user_id())?;
    state.observed(state.tasks.complete(task_id).await)?;
    Ok(Notice::success("Task marked as completed"))
}

pub async fn delete_task_impl<A, R>(
    state: &AppState<A, R>,
    task_id: i64,
) -> Result<Notice, InfraError>
where
    A: AuthApi + 'static,
    R: ResourceApi + 'static,
{
    state.observed(state.signed_in_user_id())?;
    state.observed(state.tasks.delete(task_id).await)?;
    Ok(Notice::success("Task deleted"))
}

pub async fn get_dashboard_impl<A, R>(state: &AppState<A, R>) -> Result<DashboardSummary, InfraError>
where
    A: AuthApi + 'static,
    R: ResourceApi + 'static,
{
    let user_id = state.observed(state.signed_in_user_id())?;
    state.observed(state.resources.dashboard(user_id).await)
}

pub async fn list_events_impl<A, R>(
    state: &AppState<A, R>,
    page: Option<u32>,
    search: Option<String>,
) -> Result<Page<Event>, InfraError>
where
    A: AuthApi + 'static,
    R: ResourceApi + 'static,
{
    state.observed(state.signed_in_user_id())?;
    let query = EventPageQuery {
        page: page.unwrap_or(1).max(1),
        per_page: DEFAULT_PER_PAGE,
        search: search
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()),
    };
    state.observed(state.resources.list_events(&query).await)
}

pub async fn get_task_impl<A, R>(state: &AppState<A, R>, task_id: i64) -> Result<Task, InfraError>
where
    A: AuthApi + 'static,
    R: ResourceApi + 'static,
{
    state.observed(state.signed_in_user_id())?;
    state.observed(state.resources.get_task(task_id).await)
}

pub async fn create_task_impl<A, R>(
    state: &AppState<A, R>,
    title: String,
    description: Option<String>,
    due_date: String,
    priority: Option<String>,
) -> Result<Task, InfraError>
where
    A: AuthApi + 'static,
    R: ResourceApi + 'static,
{
    let user_id = state.observed(state.signed_in_user_id())?;
    let draft = TaskDraft {
        title: title.trim().to_string(),
        description: normalize_optional(description),
        due_date: parse_due_date(&due_date)?,
        priority: priority
            .as_deref()
            .map(parse_task_priority)
            .transpose()?
            .unwrap_or_default(),
        user_id,
    };
    draft.validate().map_err(InfraError::InvalidInput)?;

    let created = state.observed(state.resources.create_task(&draft).await)?;
    state.log_info("create_task", &format!("created task {}", created.id));
    Ok(created)
}

/// Edits a task. Fields left out keep the server's current values.
pub async fn update_task_impl<A, R>(
    state: &AppState<A, R>,
    task_id: i64,
    title: Option<String>,
    description: Option<String>,
    due_date: Option<String>,
    priority: Option<String>,
    status: Option<String>,
) -> Result<UpdatedTask, InfraError>
where
    A: AuthApi + 'static,
    R: ResourceApi + 'static,
{
    state.observed(state.signed_in_user_id())?;
    let current = state.observed(state.resources.get_task(task_id).await)?;
    let mut update = TaskUpdate::from(&current);

    if let Some(title) = title {
        let title = title.trim();
        if title.is_empty() {
            return Err(InfraError::InvalidInput("task.title must not be empty".to_string()));
        }
        update.title = title.to_string();
    }
    if description.is_some() {
        update.description = normalize_optional(description);
    }
    if let Some(due_date) = due_date {
        update.due_date = parse_due_date(&due_date)?;
    }
    if let Some(priority) = priority {
        update.priority = parse_task_priority(&priority)?;
    }
    if let Some(status) = status {
        update.status = parse_task_status(&status)?;
    }

    state.observed(state.resources.update_task(task_id, &update).await)
}

pub async fn list_completed_tasks_impl<A, R>(
    state: &AppState<A, R>,
) -> Result<Vec<CompletedTask>, InfraError>
where
    A: AuthApi + 'static,
    R: ResourceApi + 'static,
{
    let user_id = state.observed(state.signed_in_user_id())?;
    state.observed(state.resources.completed_tasks(user_id).await)
}

pub async fn create_event_impl<A, R>(
    state: &AppState<A, R>,
    title: String,
    description: Option<String>,
    date: String,
) -> Result<Event, InfraError>
where
    A: AuthApi + 'static,
    R: ResourceApi + 'static,
{
    state.observed(state.signed_in_user_id())?;
    let draft = event_draft(title, description, date)?;
    state.observed(state.resources.create_event(&draft).await)
}

pub async fn update_event_impl<A, R>(
    state: &AppState<A, R>,
    event_id: i64,
    title: String,
    description: Option<String>,
    date: String,
) -> Result<Event, InfraError>
where
    A: AuthApi + 'static,
    R: ResourceApi + 'static,
{
    state.observed(state.signed_in_user_id())?;
    let draft = event_draft(title, description, date)?;
    state.observed(state.resources.update_event(event_id, &draft).await)
}

pub async fn delete_event_impl<A, R>(
    state: &AppState<A, R>,
    event_id: i64,
) -> Result<Notice, InfraError>
where
    A: AuthApi + 'static,
    R: ResourceApi + 'static,
{
    state.observed(state.signed_in_user_id())?;
    state.observed(state.resources.delete_event(event_id).await)?;
    Ok(Notice::success("Event deleted"))
}

/// Stops background work before the process exits.
pub fn shutdown_impl<A, R>(state: &AppState<A, R>)
where
    A: AuthApi + 'static,
    R: ResourceApi + 'static,
{
    state.store.teardown();
    tracing::info!("shutdown complete");
}

fn event_draft(
    title: String,
    description: Option<String>,
    date: String,
) -> Result<EventDraft, InfraError> {
    let draft = EventDraft {
        title: title.trim().to_string(),
        description: description.unwrap_or_default().trim().to_string(),
        date: date.trim().to_string(),
    };
    draft.validate().map_err(InfraError::InvalidInput)?;
    Ok(draft)
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_due_date(value: &str) -> Result<NaiveDateTime, InfraError> {
    let value = value.trim();
    DUE_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .ok_or_else(|| {
            InfraError::InvalidInput(format!("due_date must be YYYY-MM-DDTHH:MM[:SS]: {value}"))
        })
}

fn parse_task_priority(value: &str) -> Result<TaskPriority, InfraError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "critical" => Ok(TaskPriority::Critical),
        "high" => Ok(TaskPriority::High),
        "medium" => Ok(TaskPriority::Medium),
        "low" => Ok(TaskPriority::Low),
        other => Err(InfraError::InvalidInput(format!("unknown task priority: {other}"))),
    }
}

fn parse_task_status(value: &str) -> Result<TaskStatus, InfraError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "pending" => Ok(TaskStatus::Pending),
        "completed" => Ok(TaskStatus::Completed),
        other => Err(InfraError::InvalidInput(format!("unknown task status: {other}"))),
    }
}
