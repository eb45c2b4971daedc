//! In-process implementation of both storage contracts.
//!
//! Used by the agent's own tests and handy for embedding the interpreter
//! without a database. State lives behind a single [`Mutex`]; a poisoned lock
//! surfaces as [`AgentError::StoreUnavailable`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::AgentError;
use crate::store::{ConversationLog, TaskStore};
use crate::types::{Conversation, Message, NewTask, StatusFilter, Task, TaskId, TaskPatch};

#[derive(Default)]
struct Inner {
    next_id: TaskId,
    tasks: BTreeMap<TaskId, Task>,
    conversations: BTreeMap<String, Conversation>,
    messages: Vec<Message>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    unavailable: AtomicBool,
    mutations: AtomicU64,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tasks = self.inner.lock().map(|i| i.tasks.len()).unwrap_or(0);
        write!(f, "MemoryStore({tasks} tasks)")
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `StoreUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of task mutations (create/update/delete/toggle/purge) served so far.
    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, AgentError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AgentError::StoreUnavailable("memory store is offline".into()));
        }
        self.inner
            .lock()
            .map_err(|_| AgentError::StoreUnavailable("memory store lock poisoned".into()))
    }

    fn mutated(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }
}

fn owned_mut<'a>(
    inner: &'a mut Inner,
    owner: &str,
    id: TaskId,
) -> Result<&'a mut Task, AgentError> {
    inner
        .tasks
        .get_mut(&id)
        .filter(|t| t.owner_id == owner)
        .ok_or_else(|| AgentError::NotFound(format!("task {id}")))
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn create(&self, owner: &str, task: NewTask) -> Result<Task, AgentError> {
        let mut inner = self.lock()?;
        inner.next_id += 1;
        let now = Utc::now();
        let record = Task {
            id: inner.next_id,
            owner_id: owner.to_owned(),
            title: task.title,
            description: task.description,
            completed: false,
            created_at: now,
            updated_at: now,
        };
        inner.tasks.insert(record.id, record.clone());
        self.mutated();
        Ok(record)
    }

    async fn list(&self, owner: &str, filter: StatusFilter) -> Result<Vec<Task>, AgentError> {
        let inner = self.lock()?;
        // Ids grow with creation time, so reverse id order is newest first.
        Ok(inner
            .tasks
            .values()
            .rev()
            .filter(|t| t.owner_id == owner && filter.matches(t))
            .cloned()
            .collect())
    }

    async fn get(&self, owner: &str, id: TaskId) -> Result<Task, AgentError> {
        let mut inner = self.lock()?;
        owned_mut(&mut inner, owner, id).map(|t| t.clone())
    }

    async fn update(&self, owner: &str, id: TaskId, patch: TaskPatch) -> Result<Task, AgentError> {
        let patch = patch.validated()?;
        let mut inner = self.lock()?;
        let task = owned_mut(&mut inner, owner, id)?;
        patch.apply_to(task, Utc::now());
        let updated = task.clone();
        self.mutated();
        Ok(updated)
    }

    async fn delete(&self, owner: &str, id: TaskId) -> Result<Task, AgentError> {
        let mut inner = self.lock()?;
        owned_mut(&mut inner, owner, id)?;
        let removed = inner
            .tasks
            .remove(&id)
            .ok_or_else(|| AgentError::NotFound(format!("task {id}")))?;
        self.mutated();
        Ok(removed)
    }

    async fn toggle(&self, owner: &str, id: TaskId) -> Result<Task, AgentError> {
        let mut inner = self.lock()?;
        let task = owned_mut(&mut inner, owner, id)?;
        task.completed = !task.completed;
        task.updated_at = Utc::now();
        let updated = task.clone();
        self.mutated();
        Ok(updated)
    }

    async fn purge_owner(&self, owner: &str) -> Result<u64, AgentError> {
        let mut inner = self.lock()?;
        let before = inner.tasks.len();
        inner.tasks.retain(|_, t| t.owner_id != owner);
        self.mutated();
        Ok((before - inner.tasks.len()) as u64)
    }
}

#[async_trait]
impl ConversationLog for MemoryStore {
    async fn create_conversation(&self, conversation: Conversation) -> Result<(), AgentError> {
        let mut inner = self.lock()?;
        inner
            .conversations
            .insert(conversation.id.clone(), conversation);
        Ok(())
    }

    async fn get_conversation(
        &self,
        owner: &str,
        id: &str,
    ) -> Result<Option<Conversation>, AgentError> {
        let inner = self.lock()?;
        Ok(inner
            .conversations
            .get(id)
            .filter(|c| c.owner_id == owner)
            .cloned())
    }

    async fn list_conversations(&self, owner: &str) -> Result<Vec<Conversation>, AgentError> {
        let inner = self.lock()?;
        let mut conversations: Vec<Conversation> = inner
            .conversations
            .values()
            .filter(|c| c.owner_id == owner)
            .cloned()
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations)
    }

    async fn delete_conversation(&self, owner: &str, id: &str) -> Result<bool, AgentError> {
        let mut inner = self.lock()?;
        let owned = inner
            .conversations
            .get(id)
            .is_some_and(|c| c.owner_id == owner);
        if !owned {
            return Ok(false);
        }
        inner.conversations.remove(id);
        inner.messages.retain(|m| m.conversation_id != id);
        Ok(true)
    }

    async fn touch_conversation(&self, id: &str) -> Result<(), AgentError> {
        let mut inner = self.lock()?;
        if let Some(conversation) = inner.conversations.get_mut(id) {
            conversation.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn append(&self, message: Message) -> Result<(), AgentError> {
        let mut inner = self.lock()?;
        if !inner.conversations.contains_key(&message.conversation_id) {
            return Err(AgentError::ConversationNotFound(message.conversation_id));
        }
        inner.messages.push(message);
        Ok(())
    }

    async fn recent(&self, conversation_id: &str, limit: usize) -> Result<Vec<Message>, AgentError> {
        let inner = self.lock()?;
        let matching: Vec<&Message> = inner
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .collect();
        let skip = matching.len().saturating_sub(limit);
        Ok(matching.into_iter().skip(skip).cloned().collect())
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, AgentError> {
        let inner = self.lock()?;
        Ok(inner
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn count_messages(&self, conversation_id: &str) -> Result<u64, AgentError> {
        let inner = self.lock()?;
        Ok(inner
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .count() as u64)
    }

    async fn purge_conversations(&self, owner: &str) -> Result<u64, AgentError> {
        let mut inner = self.lock()?;
        let doomed: Vec<String> = inner
            .conversations
            .values()
            .filter(|c| c.owner_id == owner)
            .map(|c| c.id.clone())
            .collect();
        inner.conversations.retain(|_, c| c.owner_id != owner);
        inner
            .messages
            .retain(|m| !doomed.contains(&m.conversation_id));
        Ok(doomed.len() as u64)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn new_task(title: &str) -> NewTask {
        NewTask::new(title, None).unwrap()
    }

    #[tokio::test]
    async fn list_is_newest_first_and_owner_scoped() {
        let store = MemoryStore::new();
        store.create("alice", new_task("first")).await.unwrap();
        store.create("bob", new_task("not yours")).await.unwrap();
        store.create("alice", new_task("second")).await.unwrap();

        let titles: Vec<String> = store
            .list("alice", StatusFilter::All)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn foreign_task_reads_as_not_found() {
        let store = MemoryStore::new();
        let task = store.create("alice", new_task("private")).await.unwrap();
        let err = store.delete("bob", task.id).await.unwrap_err();
        assert!(matches!(err, AgentError::NotFound(_)));
        assert!(store.get("alice", task.id).await.is_ok());
    }

    #[tokio::test]
    async fn toggle_flips_and_filter_follows() {
        let store = MemoryStore::new();
        let task = store.create("alice", new_task("walk dog")).await.unwrap();
        let toggled = store.toggle("alice", task.id).await.unwrap();
        assert!(toggled.completed);
        assert_eq!(store.list("alice", StatusFilter::Completed).await.unwrap().len(), 1);
        assert!(store.list("alice", StatusFilter::Pending).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn offline_store_reports_unavailable() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let err = store.list("alice", StatusFilter::All).await.unwrap_err();
        assert_eq!(err.code(), "store_unavailable");
    }

    #[tokio::test]
    async fn recent_returns_tail_in_order() {
        let store = MemoryStore::new();
        let conversation = Conversation::start("alice", "hello");
        let id = conversation.id.clone();
        store.create_conversation(conversation).await.unwrap();
        for i in 0..5 {
            store.append(Message::user(&id, &format!("m{i}"))).await.unwrap();
        }
        let tail: Vec<String> = store
            .recent(&id, 2)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(tail, vec!["m3", "m4"]);
        assert_eq!(store.count_messages(&id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn deleting_conversation_requires_owner() {
        let store = MemoryStore::new();
        let conversation = Conversation::start("alice", "hello");
        let id = conversation.id.clone();
        store.create_conversation(conversation).await.unwrap();
        store.append(Message::user(&id, "hello")).await.unwrap();

        assert!(!store.delete_conversation("bob", &id).await.unwrap());
        assert!(store.delete_conversation("alice", &id).await.unwrap());
        assert_eq!(store.count_messages(&id).await.unwrap(), 0);
    }
}
