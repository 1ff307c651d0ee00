pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(feature = "desktop")]
mod desktop {
    use crate::application::commands::{
        AppState, check_session_impl, complete_task_impl, confirm_signup_impl, create_event_impl,
        create_task_impl, delete_event_impl, delete_task_impl, forgot_password_impl,
        get_dashboard_impl, get_lockout_state_impl, get_session_state_impl, get_task_impl,
        guard_route_impl, list_completed_tasks_impl, list_events_impl, list_tasks_impl,
        login_impl, logout_impl, reset_password_impl, set_route_impl, shutdown_impl, signup_impl,
        update_event_impl, update_task_impl,
    };
    use crate::application::session::{RouteDecision, SessionStatus};
    use crate::application::store::LoginOutcome;
    use crate::domain::lockout::LockoutSnapshot;
    use crate::domain::models::{
        CompletedTask, DashboardSummary, Event, Notice, Page, Task, UpdatedTask,
    };
    use crate::infrastructure::logging::init_logging;
    use tauri::{Emitter, Manager};

    const NAVIGATE_EVENT: &str = "navigate";
    const LOCKOUT_EVENT: &str = "lockout";

    #[tauri::command]
    async fn check_session(state: tauri::State<'_, AppState>) -> Result<SessionStatus, String> {
        check_session_impl(state.inner())
            .await
            .map_err(|error| state.command_error("check_session", &error))
    }

    #[tauri::command]
    async fn login(
        state: tauri::State<'_, AppState>,
        email: String,
        password: String,
    ) -> Result<LoginOutcome, String> {
        login_impl(state.inner(), email, password)
            .await
            .map_err(|error| state.command_error("login", &error))
    }

    #[tauri::command]
    async fn logout(state: tauri::State<'_, AppState>) -> Result<Notice, String> {
        Ok(logout_impl(state.inner()).await)
    }

    #[tauri::command]
    fn guard_route(state: tauri::State<'_, AppState>, location: String) -> RouteDecision {
        guard_route_impl(state.inner(), location)
    }

    #[tauri::command]
    fn set_route(state: tauri::State<'_, AppState>, location: String) -> RouteDecision {
        set_route_impl(state.inner(), location)
    }

    #[tauri::command]
    fn get_session_state(state: tauri::State<'_, AppState>) -> SessionStatus {
        get_session_state_impl(state.inner())
    }

    #[tauri::command]
    fn get_lockout_state(state: tauri::State<'_, AppState>) -> LockoutSnapshot {
        get_lockout_state_impl(state.inner())
    }

    #[tauri::command]
    async fn signup(
        state: tauri::State<'_, AppState>,
        email: String,
        password: String,
    ) -> Result<Notice, String> {
        signup_impl(state.inner(), email, password)
            .await
            .map_err(|error| state.command_error("signup", &error))
    }

    #[tauri::command]
    async fn confirm_signup(
        state: tauri::State<'_, AppState>,
        email: String,
        code: String,
    ) -> Result<Notice, String> {
        confirm_signup_impl(state.inner(), email, code)
            .await
            .map_err(|error| state.command_error("confirm_signup", &error))
    }

    #[tauri::command]
    async fn forgot_password(
        state: tauri::State<'_, AppState>,
        email: String,
    ) -> Result<Notice, String> {
        forgot_password_impl(state.inner(), email)
            .await
            .map_err(|error| state.command_error("forgot_password", &error))
    }

    #[tauri::command]
    async fn reset_password(
        state: tauri::State<'_, AppState>,
        email: String,
        code: String,
        password: String,
    ) -> Result<Notice, String> {
        reset_password_impl(state.inner(), email, code, password)
            .await
            .map_err(|error| state.command_error("reset_password", &error))
    }

    #[tauri::command]
    async fn list_tasks(
        state: tauri::State<'_, AppState>,
        page: Option<u32>,
    ) -> Result<Page<Task>, String> {
        list_tasks_impl(state.inner(), page)
            .await
            .map_err(|error| state.command_error("list_tasks", &error))
    }

    #[tauri::command]
    async fn complete_task(
        state: tauri::State<'_, AppState>,
        task_id: i64,
    ) -> Result<Notice, String> {
        complete_task_impl(state.inner(), task_id)
            .await
            .map_err(|error| state.command_error("complete_task", &error))
    }

    #[tauri::command]
    async fn delete_task(state: tauri::State<'_, AppState>, task_id: i64) -> Result<Notice, String> {
        delete_task_impl(state.inner(), task_id)
            .await
            .map_err(|error| state.command_error("delete_task", &error))
    }

    #[tauri::command]
    async fn get_task(state: tauri::State<'_, AppState>, task_id: i64) -> Result<Task, String> {
        get_task_impl(state.inner(), task_id)
            .await
            .map_err(|error| state.command_error("get_task", &error))
    }

    #[tauri::command]
    async fn create_task(
        state: tauri::State<'_, AppState>,
        title: String,
        description: Option<String>,
        due_date: String,
        priority: Option<String>,
    ) -> Result<Task, String> {
        create_task_impl(state.inner(), title, description, due_date, priority)
            .await
            .map_err(|error| state.command_error("create_task", &error))
    }

    #[tauri::command]
    async fn update_task(
        state: tauri::State<'_, AppState>,
        task_id: i64,
        title: Option<String>,
        description: Option<String>,
        due_date: Option<String>,
        priority: Option<String>,
        status: Option<String>,
    ) -> Result<UpdatedTask, String> {
        update_task_impl(
            state.inner(),
            task_id,
            title,
            description,
            due_date,
            priority,
            status,
        )
        .await
        .map_err(|error| state.command_error("update_task", &error))
    }

    #[tauri::command]
    async fn list_completed_tasks(
        state: tauri::State<'_, AppState>,
    ) -> Result<Vec<CompletedTask>, String> {
        list_completed_tasks_impl(state.inner())
            .await
            .map_err(|error| state.command_error("list_completed_tasks", &error))
    }

    #[tauri::command]
    async fn get_dashboard(state: tauri::State<'_, AppState>) -> Result<DashboardSummary, String> {
        get_dashboard_impl(state.inner())
            .await
            .map_err(|error| state.command_error("get_dashboard", &error))
    }

    #[tauri::command]
    async fn list_events(
        state: tauri::State<'_, AppState>,
        page: Option<u32>,
        search: Option<String>,
    ) -> Result<Page<Event>, String> {
        list_events_impl(state.inner(), page, search)
            .await
            .map_err(|error| state.command_error("list_events", &error))
    }

    #[tauri::command]
    async fn create_event(
        state: tauri::State<'_, AppState>,
        title: String,
        description: Option<String>,
        date: String,
    ) -> Result<Event, String> {
        create_event_impl(state.inner(), title, description, date)
            .await
            .map_err(|error| state.command_error("create_event", &error))
    }

    #[tauri::command]
    async fn update_event(
        state: tauri::State<'_, AppState>,
        event_id: i64,
        title: String,
        description: Option<String>,
        date: String,
    ) -> Result<Event, String> {
        update_event_impl(state.inner(), event_id, title, description, date)
            .await
            .map_err(|error| state.command_error("update_event", &error))
    }

    #[tauri::command]
    async fn delete_event(
        state: tauri::State<'_, AppState>,
        event_id: i64,
    ) -> Result<Notice, String> {
        delete_event_impl(state.inner(), event_id)
            .await
            .map_err(|error| state.command_error("delete_event", &error))
    }

    pub fn run() {
        let workspace_root = std::env::current_dir().expect("failed to resolve current directory");
        let _log_guard = init_logging(&workspace_root.join("logs"));
        let app_state = AppState::new(workspace_root).expect("failed to initialize app state");

        tauri::Builder::default()
            .manage(app_state)
            .setup(|app| {
                let handle = app.handle().clone();
                let state = app.state::<AppState>();

                let navigate_handle = handle.clone();
                state.navigator().set_listener(move |route| {
                    if let Err(error) = navigate_handle.emit(NAVIGATE_EVENT, route.path()) {
                        tracing::warn!(%error, "failed to forward navigation");
                    }
                });

                let mut lockout = state.store().login_guard().subscribe();
                tauri::async_runtime::spawn(async move {
                    while lockout.changed().await.is_ok() {
                        let snapshot = lockout.borrow_and_update().clone();
                        if let Err(error) = handle.emit(LOCKOUT_EVENT, snapshot) {
                            tracing::warn!(%error, "failed to forward lockout state");
                        }
                    }
                });
                Ok(())
            })
            .invoke_handler(tauri::generate_handler![
                check_session,
                login,
                logout,
                guard_route,
                set_route,
                get_session_state,
                get_lockout_state,
                signup,
                confirm_signup,
                forgot_password,
                reset_password,
                list_tasks,
                complete_task,
                delete_task,
                get_task,
                create_task,
                update_task,
                list_completed_tasks,
                get_dashboard,
                list_events,
                create_event,
                update_event,
                delete_event
            ])
            .build(tauri::generate_context!())
            .expect("failed to build tauri app")
            .run(|app, event| {
                if let tauri::RunEvent::Exit = event {
                    shutdown_impl(app.state::<AppState>().inner());
                }
            });
    }
}

#[cfg(feature = "desktop")]
pub use desktop::run;
