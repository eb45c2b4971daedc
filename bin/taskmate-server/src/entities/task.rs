use async_trait::async_trait;
use chrono::Utc;
use taskmate_agent::{AgentError, NewTask, StatusFilter, Task, TaskId, TaskPatch, TaskStore};

use crate::entities::{SqliteStore, parse_timestamp, unavailable};

type TaskRow = (i64, String, String, String, bool, String, String);

const SELECT_TASK: &str =
    "SELECT id, user_id, title, description, completed, created_at, updated_at FROM tasks";

fn from_row(
    (id, owner_id, title, description, completed, created_at, updated_at): TaskRow,
) -> Task {
    Task {
        id,
        owner_id,
        title,
        description,
        completed,
        created_at: parse_timestamp(&created_at, "tasks.created_at"),
        updated_at: parse_timestamp(&updated_at, "tasks.updated_at"),
    }
}

fn not_found(id: TaskId) -> AgentError {
    AgentError::NotFound(format!("task {id}"))
}

#[async_trait]
impl TaskStore for SqliteStore {
    async fn create(&self, owner: &str, task: NewTask) -> Result<Task, AgentError> {
        let now = Utc::now();
        let stamp = now.to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO tasks (user_id, title, description, completed, created_at, updated_at) \
             VALUES (?1, ?2, ?3, 0, ?4, ?4)",
        )
        .bind(owner)
        .bind(&task.title)
        .bind(&task.description)
        .bind(&stamp)
        .execute(self.pool())
        .await
        .map_err(unavailable)?;

        Ok(Task {
            id: result.last_insert_rowid(),
            owner_id: owner.to_owned(),
            title: task.title,
            description: task.description,
            completed: false,
            created_at: now,
            updated_at: now,
        })
    }

    async fn list(&self, owner: &str, filter: StatusFilter) -> Result<Vec<Task>, AgentError> {
        let clause = match filter {
            StatusFilter::All => "",
            StatusFilter::Pending => " AND completed = 0",
            StatusFilter::Completed => " AND completed = 1",
        };
        // Ids are assigned in creation order.
        let sql = format!("{SELECT_TASK} WHERE user_id = ?1{clause} ORDER BY id DESC");
        let rows: Vec<TaskRow> = sqlx::query_as(&sql)
            .bind(owner)
            .fetch_all(self.pool())
            .await
            .map_err(unavailable)?;
        Ok(rows.into_iter().map(from_row).collect())
    }

    async fn get(&self, owner: &str, id: TaskId) -> Result<Task, AgentError> {
        let sql = format!("{SELECT_TASK} WHERE id = ?1 AND user_id = ?2");
        let row: Option<TaskRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(self.pool())
            .await
            .map_err(unavailable)?;
        row.map(from_row).ok_or_else(|| not_found(id))
    }

    async fn update(&self, owner: &str, id: TaskId, patch: TaskPatch) -> Result<Task, AgentError> {
        let patch = patch.validated()?;
        if patch.is_empty() {
            return self.get(owner, id).await;
        }
        // Unset fields keep the row's current value, so concurrent writers
        // touching other columns are not overwritten.
        let row: Option<TaskRow> = sqlx::query_as(
            "UPDATE tasks SET title = COALESCE(?1, title), \
             description = COALESCE(?2, description), \
             completed = COALESCE(?3, completed), updated_at = ?4 \
             WHERE id = ?5 AND user_id = ?6 \
             RETURNING id, user_id, title, description, completed, created_at, updated_at",
        )
        .bind(patch.title)
        .bind(patch.description)
        .bind(patch.completed)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .bind(owner)
        .fetch_optional(self.pool())
        .await
        .map_err(unavailable)?;
        row.map(from_row).ok_or_else(|| not_found(id))
    }

    async fn delete(&self, owner: &str, id: TaskId) -> Result<Task, AgentError> {
        let task = self.get(owner, id).await?;
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?1 AND user_id = ?2")
            .bind(id)
            .bind(owner)
            .execute(self.pool())
            .await
            .map_err(unavailable)?;
        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(task)
    }

    async fn toggle(&self, owner: &str, id: TaskId) -> Result<Task, AgentError> {
        let result = sqlx::query(
            "UPDATE tasks SET completed = NOT completed, updated_at = ?1 \
             WHERE id = ?2 AND user_id = ?3",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .bind(owner)
        .execute(self.pool())
        .await
        .map_err(unavailable)?;
        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        self.get(owner, id).await
    }

    async fn purge_owner(&self, owner: &str) -> Result<u64, AgentError> {
        let result = sqlx::query("DELETE FROM tasks WHERE user_id = ?1")
            .bind(owner)
            .execute(self.pool())
            .await
            .map_err(unavailable)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    async fn store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    fn new_task(title: &str) -> NewTask {
        NewTask::new(title, None).unwrap()
    }

    #[tokio::test]
    async fn create_then_list_newest_first() {
        let store = store().await;
        let first = store.create("u1", new_task("Buy milk")).await.unwrap();
        let second = store.create("u1", new_task("Walk dog")).await.unwrap();
        assert!(second.id > first.id);

        let tasks = store.list("u1", StatusFilter::All).await.unwrap();
        let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["Walk dog", "Buy milk"]);
        assert!(tasks.iter().all(|t| !t.completed));
    }

    #[tokio::test]
    async fn filters_by_status() {
        let store = store().await;
        let done = store.create("u1", new_task("Done thing")).await.unwrap();
        store.create("u1", new_task("Open thing")).await.unwrap();
        store.toggle("u1", done.id).await.unwrap();

        let pending = store.list("u1", StatusFilter::Pending).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].title, "Open thing");
        let completed = store.list("u1", StatusFilter::Completed).await.unwrap();
        assert_eq!(completed.len(), 1);
        assert!(completed[0].completed);
    }

    #[tokio::test]
    async fn other_owner_sees_not_found() {
        let store = store().await;
        let task = store.create("alice", new_task("Secret")).await.unwrap();

        assert!(matches!(store.get("bob", task.id).await, Err(AgentError::NotFound(_))));
        assert!(matches!(store.delete("bob", task.id).await, Err(AgentError::NotFound(_))));
        assert!(matches!(store.toggle("bob", task.id).await, Err(AgentError::NotFound(_))));
        assert!(store.list("bob", StatusFilter::All).await.unwrap().is_empty());
        assert_eq!(store.get("alice", task.id).await.unwrap().title, "Secret");
    }

    #[tokio::test]
    async fn update_applies_only_given_fields() {
        let store = store().await;
        let task = store
            .create("u1", NewTask::new("Report", Some("draft")).unwrap())
            .await
            .unwrap();
        let patch = TaskPatch {
            title: Some("Quarterly report".into()),
            ..TaskPatch::default()
        };
        let updated = store.update("u1", task.id, patch).await.unwrap();
        assert_eq!(updated.title, "Quarterly report");
        assert_eq!(updated.description, "draft");

        let reread = store.get("u1", task.id).await.unwrap();
        assert_eq!(reread, updated);
    }

    #[tokio::test]
    async fn title_update_leaves_completion_alone() {
        let store = store().await;
        let task = store.create("u1", new_task("Report")).await.unwrap();
        store.toggle("u1", task.id).await.unwrap();

        let patch = TaskPatch {
            title: Some("Final report".into()),
            ..TaskPatch::default()
        };
        let updated = store.update("u1", task.id, patch).await.unwrap();
        assert_eq!(updated.title, "Final report");
        assert!(updated.completed);
        assert!(store.get("u1", task.id).await.unwrap().completed);

        let reopened = store
            .update("u1", task.id, TaskPatch::completed(false))
            .await
            .unwrap();
        assert_eq!(reopened.title, "Final report");
        assert!(!reopened.completed);
    }

    #[tokio::test]
    async fn update_of_missing_or_foreign_task_is_not_found() {
        let store = store().await;
        let task = store.create("alice", new_task("Secret")).await.unwrap();
        let patch = TaskPatch {
            title: Some("Mine now".into()),
            ..TaskPatch::default()
        };
        assert!(matches!(
            store.update("bob", task.id, patch.clone()).await,
            Err(AgentError::NotFound(_))
        ));
        assert!(matches!(
            store.update("alice", 999, TaskPatch::default()).await,
            Err(AgentError::NotFound(_))
        ));
        assert_eq!(store.get("alice", task.id).await.unwrap().title, "Secret");
    }

    #[tokio::test]
    async fn purge_only_touches_owner() {
        let store = store().await;
        store.create("u1", new_task("a")).await.unwrap();
        store.create("u1", new_task("b")).await.unwrap();
        store.create("u2", new_task("c")).await.unwrap();

        assert_eq!(store.purge_owner("u1").await.unwrap(), 2);
        assert_eq!(store.list("u2", StatusFilter::All).await.unwrap().len(), 1);
    }
}
