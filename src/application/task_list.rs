use crate::domain::models::{Page, Task, TaskStatus, TaskUpdate, UpdatedTask};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::resource_client::{TaskApi, TaskPageQuery};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
struct TaskListState {
    query: TaskPageQuery,
    page: Page<Task>,
    // Bumped whenever `page` is replaced; a rollback only lands on the page
    // it was taken from.
    generation: u64,
}

/// A row removed ahead of a write, with where it came from.
struct TakenRow {
    index: usize,
    generation: u64,
    task: Task,
}

/// Current page of the task table. Completing or deleting a row removes it
/// locally first and puts it back where it was if the server refuses.
pub struct TaskList<T>
where
    T: TaskApi,
{
    task_api: Arc<T>,
    state: Mutex<TaskListState>,
}

impl<T> TaskList<T>
where
    T: TaskApi,
{
    pub fn new(task_api: Arc<T>, user_id: i64) -> Self {
        Self {
            task_api,
            state: Mutex::new(TaskListState {
                query: TaskPageQuery::first(user_id),
                page: Page::default(),
                generation: 0,
            }),
        }
    }

    pub fn items(&self) -> Vec<Task> {
        self.lock_state().page.items.clone()
    }

    pub fn page(&self) -> Page<Task> {
        self.lock_state().page.clone()
    }

    pub fn current_page(&self) -> u32 {
        self.lock_state().query.page
    }

    pub fn set_user(&self, user_id: i64) {
        let mut state = self.lock_state();
        if state.query.user_id != user_id {
            state.query = TaskPageQuery::first(user_id);
            state.page = Page::default();
            state.generation = state.generation.wrapping_add(1);
        }
    }

    /// Loads page `page` (1-based) and makes it current.
    pub async fn load(&self, page: u32) -> Result<Page<Task>, InfraError> {
        if page == 0 {
            return Err(InfraError::InvalidInput("page must be at least 1".to_string()));
        }
        let query = {
            let mut query = self.lock_state().query.clone();
            query.page = page;
            query
        };

        let loaded = self.task_api.list_tasks(&query).await?;
        let mut state = self.lock_state();
        state.query = query;
        state.page = loaded.clone();
        state.generation = state.generation.wrapping_add(1);
        tracing::debug!(
            page,
            items = loaded.items.len(),
            total_pages = loaded.total_pages,
            "task page loaded"
        );
        Ok(loaded)
    }

    pub async fn refresh(&self) -> Result<Page<Task>, InfraError> {
        let page = self.current_page();
        self.load(page).await
    }

    pub async fn complete(&self, task_id: i64) -> Result<UpdatedTask, InfraError> {
        let taken = self.take(task_id)?;
        let mut update = TaskUpdate::from(&taken.task);
        update.status = TaskStatus::Completed;

        match self.task_api.update_task(task_id, &update).await {
            Ok(updated) => {
                tracing::info!(task_id, "task completed");
                Ok(updated)
            }
            Err(error) => {
                tracing::warn!(task_id, %error, "completing task failed; restoring row");
                self.restore(taken);
                Err(error)
            }
        }
    }

    pub async fn delete(&self, task_id: i64) -> Result<(), InfraError> {
        let taken = self.take(task_id)?;

        match self.task_api.delete_task(task_id).await {
            Ok(()) => {
                tracing::info!(task_id, "task deleted");
                Ok(())
            }
            Err(error) => {
                tracing::warn!(task_id, %error, "deleting task failed; restoring row");
                self.restore(taken);
                Err(error)
            }
        }
    }

    fn take(&self, task_id: i64) -> Result<TakenRow, InfraError> {
        let mut state = self.lock_state();
        let index = state
            .page
            .items
            .iter()
            .position(|task| task.id == task_id)
            .ok_or_else(|| {
                InfraError::InvalidInput(format!("task {task_id} is not on the current page"))
            })?;
        let task = state.page.items.remove(index);
        Ok(TakenRow {
            index,
            generation: state.generation,
            task,
        })
    }

    fn restore(&self, taken: TakenRow) {
        let mut state = self.lock_state();
        if state.generation != taken.generation {
            tracing::debug!(task_id = taken.task.id, "page reloaded meanwhile; row not restored");
            return;
        }
        if state.page.items.iter().any(|task| task.id == taken.task.id) {
            return;
        }
        let index = taken.index.min(state.page.items.len());
        state.page.items.insert(index, taken.task);
    }

    fn lock_state(&self) -> MutexGuard<'_, TaskListState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
