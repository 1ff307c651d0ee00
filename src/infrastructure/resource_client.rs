use crate::domain::models::{
    CompletedTask, DashboardSummary, Event, EventDraft, Page, Task, TaskDraft, TaskUpdate,
    UpdatedTask,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::failure::Unauthorized;
use crate::infrastructure::http::{endpoint_url, network_error, parse_json, read_body};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use url::Url;

pub const DEFAULT_PER_PAGE: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskPageQuery {
    pub user_id: i64,
    pub page: u32,
    pub per_page: u32,
}

impl TaskPageQuery {
    pub fn first(user_id: i64) -> Self {
        Self {
            user_id,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventPageQuery {
    pub page: u32,
    pub per_page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl Default for EventPageQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            search: None,
        }
    }
}

#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn list_tasks(&self, query: &TaskPageQuery) -> Result<Page<Task>, InfraError>;

    async fn get_task(&self, task_id: i64) -> Result<Task, InfraError>;

    async fn create_task(&self, draft: &TaskDraft) -> Result<Task, InfraError>;

    async fn update_task(
        &self,
        task_id: i64,
        update: &TaskUpdate,
    ) -> Result<UpdatedTask, InfraError>;

    async fn delete_task(&self, task_id: i64) -> Result<(), InfraError>;

    async fn dashboard(&self, user_id: i64) -> Result<DashboardSummary, InfraError>;

    async fn completed_tasks(&self, user_id: i64) -> Result<Vec<CompletedTask>, InfraError>;
}

#[async_trait]
pub trait EventApi: Send + Sync {
    async fn list_events(&self, query: &EventPageQuery) -> Result<Page<Event>, InfraError>;

    async fn create_event(&self, draft: &EventDraft) -> Result<Event, InfraError>;

    async fn update_event(&self, event_id: i64, draft: &EventDraft) -> Result<Event, InfraError>;

    async fn delete_event(&self, event_id: i64) -> Result<(), InfraError>;
}

/// Everything the task and event views need from the backend.
pub trait ResourceApi: TaskApi + EventApi {}

impl<T> ResourceApi for T where T: TaskApi + EventApi {}

/// Task and event endpoints. Shares the auth client's cookie jar; a 401 here
/// means the session cookie is gone.
#[derive(Debug, Clone)]
pub struct ReqwestResourceClient {
    client: Client,
    base_url: Url,
}

impl ReqwestResourceClient {
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    fn url(&self, segments: &[&str]) -> Result<Url, InfraError> {
        endpoint_url(&self.base_url, segments)
    }

    async fn execute(&self, request: RequestBuilder, action: &str) -> Result<String, InfraError> {
        let response = request
            .send()
            .await
            .map_err(|error| network_error(action, error))?;
        read_body(
            response,
            action,
            Unauthorized::SessionExpired,
            &format!("Failed {action}"),
        )
        .await
    }

    async fn execute_json<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
        action: &str,
    ) -> Result<T, InfraError> {
        let body = self.execute(request, action).await?;
        parse_json(&body, action)
    }
}

fn ensure_positive_id(id: i64, field: &str) -> Result<String, InfraError> {
    if id <= 0 {
        return Err(InfraError::InvalidInput(format!("{field} must be positive")));
    }
    Ok(id.to_string())
}

#[async_trait]
impl TaskApi for ReqwestResourceClient {
    async fn list_tasks(&self, query: &TaskPageQuery) -> Result<Page<Task>, InfraError> {
        let request = self.client.get(self.url(&["tasks", ""])?).query(query);
        self.execute_json(request, "listing tasks").await
    }

    async fn get_task(&self, task_id: i64) -> Result<Task, InfraError> {
        let id = ensure_positive_id(task_id, "task id")?;
        let request = self.client.get(self.url(&["tasks", id.as_str()])?);
        self.execute_json(request, "loading task").await
    }

    async fn create_task(&self, draft: &TaskDraft) -> Result<Task, InfraError> {
        draft.validate().map_err(InfraError::InvalidInput)?;
        let request = self.client.post(self.url(&["tasks", ""])?).json(draft);
        self.execute_json(request, "creating task").await
    }

    async fn update_task(
        &self,
        task_id: i64,
        update: &TaskUpdate,
    ) -> Result<UpdatedTask, InfraError> {
        let id = ensure_positive_id(task_id, "task id")?;
        let request = self.client.put(self.url(&["tasks", id.as_str()])?).json(update);
        self.execute_json(request, "updating task").await
    }

    async fn delete_task(&self, task_id: i64) -> Result<(), InfraError> {
        let id = ensure_positive_id(task_id, "task id")?;
        let request = self.client.delete(self.url(&["tasks", id.as_str()])?);
        self.execute(request, "deleting task").await?;
        Ok(())
    }

    async fn dashboard(&self, user_id: i64) -> Result<DashboardSummary, InfraError> {
        let request = self
            .client
            .get(self.url(&["tasks", "dashboard"])?)
            .query(&[("user_id", user_id)]);
        self.execute_json(request, "loading dashboard").await
    }

    async fn completed_tasks(&self, user_id: i64) -> Result<Vec<CompletedTask>, InfraError> {
        let request = self
            .client
            .get(self.url(&["completed-tasks"])?)
            .query(&[("user_id", user_id)]);
        self.execute_json(request, "loading completed tasks").await
    }
}

#[async_trait]
impl EventApi for ReqwestResourceClient {
    async fn list_events(&self, query: &EventPageQuery) -> Result<Page<Event>, InfraError> {
        let request = self.client.get(self.url(&["events"])?).query(query);
        self.execute_json(request, "listing events").await
    }

    async fn create_event(&self, draft: &EventDraft) -> Result<Event, InfraError> {
        draft.validate().map_err(InfraError::InvalidInput)?;
        let request = self.client.post(self.url(&["events", ""])?).json(draft);
        self.execute_json(request, "creating event").await
    }

    async fn update_event(&self, event_id: i64, draft: &EventDraft) -> Result<Event, InfraError> {
        let id = ensure_positive_id(event_id, "event id")?;
        draft.validate().map_err(InfraError::InvalidInput)?;
        let request = self.client.put(self.url(&["events", id.as_str()])?).json(draft);
        self.execute_json(request, "updating event").await
    }

    async fn delete_event(&self, event_id: i64) -> Result<(), InfraError> {
        let id = ensure_positive_id(event_id, "event id")?;
        let request = self.client.delete(self.url(&["events", id.as_str()])?);
        self.execute(request, "deleting event").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ReqwestResourceClient {
        ReqwestResourceClient::new(
            Client::new(),
            Url::parse("http://localhost:8000").expect("base url"),
        )
    }

    #[test]
    fn collection_and_item_urls() {
        let client = client();
        assert_eq!(
            client.url(&["tasks", ""]).expect("url").as_str(),
            "http://localhost:8000/tasks/"
        );
        assert_eq!(
            client.url(&["tasks", "12"]).expect("url").as_str(),
            "http://localhost:8000/tasks/12"
        );
        assert_eq!(
            client.url(&["completed-tasks"]).expect("url").path(),
            "/completed-tasks"
        );
    }

    #[test]
    fn task_page_query_serializes_backend_parameters() {
        let query = serde_json::to_value(TaskPageQuery::first(1)).expect("serialize");
        assert_eq!(
            query,
            serde_json::json!({"user_id": 1, "page": 1, "per_page": 10})
        );
        let events = serde_json::to_value(EventPageQuery::default()).expect("serialize");
        assert!(events.get("search").is_none());
    }

    #[tokio::test]
    async fn non_positive_ids_are_rejected_before_any_request() {
        let client = client();
        assert!(matches!(
            client.get_task(0).await,
            Err(InfraError::InvalidInput(_))
        ));
        assert!(matches!(
            client.delete_event(-3).await,
            Err(InfraError::InvalidInput(_))
        ));
    }
}
