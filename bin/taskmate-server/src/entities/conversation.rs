use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use taskmate_agent::{AgentError, Conversation, ConversationLog, Message, Role, ToolCall, TurnMeta};
use tracing::warn;

use crate::entities::{SqliteStore, parse_timestamp, unavailable};

type ConversationRow = (String, String, Option<String>, String, String);
type MessageRow = (String, String, String, String, String, Option<String>, String);

const SELECT_CONVERSATION: &str =
    "SELECT id, user_id, title, created_at, updated_at FROM conversations";
const SELECT_MESSAGE: &str =
    "SELECT id, conversation_id, role, content, tool_calls, meta, created_at FROM messages";

fn conversation_from_row(
    (id, owner_id, title, created_at, updated_at): ConversationRow,
) -> Conversation {
    Conversation {
        id,
        owner_id,
        title,
        created_at: parse_timestamp(&created_at, "conversations.created_at"),
        updated_at: parse_timestamp(&updated_at, "conversations.updated_at"),
    }
}

fn message_from_row(
    (id, conversation_id, role, content, tool_calls, meta, created_at): MessageRow,
) -> Message {
    let role = Role::from_str(&role).unwrap_or_else(|_| {
        warn!(message_id = %id, role = %role, "unknown message role; treating as system");
        Role::System
    });
    let tool_calls: Vec<ToolCall> = serde_json::from_str(&tool_calls).unwrap_or_else(|e| {
        warn!(message_id = %id, error = %e, "failed to parse tool calls; dropping them");
        Vec::new()
    });
    let meta = meta.and_then(|raw| match serde_json::from_str::<TurnMeta>(&raw) {
        Ok(meta) => Some(meta),
        Err(e) => {
            warn!(message_id = %id, error = %e, "failed to parse turn meta; ignoring it");
            None
        }
    });
    Message {
        created_at: parse_timestamp(&created_at, "messages.created_at"),
        id,
        conversation_id,
        role,
        content,
        tool_calls,
        meta,
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String, AgentError> {
    serde_json::to_string(value)
        .map_err(|e| AgentError::Validation(format!("unserializable message field: {e}")))
}

#[async_trait]
impl ConversationLog for SqliteStore {
    async fn create_conversation(&self, conversation: Conversation) -> Result<(), AgentError> {
        sqlx::query(
            "INSERT INTO conversations (id, user_id, title, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&conversation.id)
        .bind(&conversation.owner_id)
        .bind(&conversation.title)
        .bind(conversation.created_at.to_rfc3339())
        .bind(conversation.updated_at.to_rfc3339())
        .execute(self.pool())
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn get_conversation(
        &self,
        owner: &str,
        id: &str,
    ) -> Result<Option<Conversation>, AgentError> {
        let sql = format!("{SELECT_CONVERSATION} WHERE id = ?1 AND user_id = ?2");
        let row: Option<ConversationRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(self.pool())
            .await
            .map_err(unavailable)?;
        Ok(row.map(conversation_from_row))
    }

    async fn list_conversations(&self, owner: &str) -> Result<Vec<Conversation>, AgentError> {
        let sql = format!("{SELECT_CONVERSATION} WHERE user_id = ?1 ORDER BY updated_at DESC");
        let rows: Vec<ConversationRow> = sqlx::query_as(&sql)
            .bind(owner)
            .fetch_all(self.pool())
            .await
            .map_err(unavailable)?;
        Ok(rows.into_iter().map(conversation_from_row).collect())
    }

    async fn delete_conversation(&self, owner: &str, id: &str) -> Result<bool, AgentError> {
        let mut tx = self.pool().begin().await.map_err(unavailable)?;
        sqlx::query(
            "DELETE FROM messages WHERE conversation_id = ?1 \
             AND EXISTS (SELECT 1 FROM conversations WHERE id = ?1 AND user_id = ?2)",
        )
        .bind(id)
        .bind(owner)
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?;
        let result = sqlx::query("DELETE FROM conversations WHERE id = ?1 AND user_id = ?2")
            .bind(id)
            .bind(owner)
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;
        tx.commit().await.map_err(unavailable)?;
        Ok(result.rows_affected() > 0)
    }

    async fn touch_conversation(&self, id: &str) -> Result<(), AgentError> {
        sqlx::query("UPDATE conversations SET updated_at = ?1 WHERE id = ?2")
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn append(&self, message: Message) -> Result<(), AgentError> {
        let tool_calls = encode(&message.tool_calls)?;
        let meta = message.meta.as_ref().map(encode).transpose()?;
        let result = sqlx::query(
            "INSERT INTO messages (id, conversation_id, role, content, tool_calls, meta, created_at) \
             SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7 \
             WHERE EXISTS (SELECT 1 FROM conversations WHERE id = ?2)",
        )
        .bind(&message.id)
        .bind(&message.conversation_id)
        .bind(message.role.as_ref())
        .bind(&message.content)
        .bind(&tool_calls)
        .bind(&meta)
        .bind(message.created_at.to_rfc3339())
        .execute(self.pool())
        .await
        .map_err(unavailable)?;
        if result.rows_affected() == 0 {
            return Err(AgentError::ConversationNotFound(message.conversation_id));
        }
        Ok(())
    }

    async fn recent(&self, conversation_id: &str, limit: usize) -> Result<Vec<Message>, AgentError> {
        let sql = format!("{SELECT_MESSAGE} WHERE conversation_id = ?1 ORDER BY seq DESC LIMIT ?2");
        let rows: Vec<MessageRow> = sqlx::query_as(&sql)
            .bind(conversation_id)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(self.pool())
            .await
            .map_err(unavailable)?;
        Ok(rows.into_iter().rev().map(message_from_row).collect())
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, AgentError> {
        let sql = format!("{SELECT_MESSAGE} WHERE conversation_id = ?1 ORDER BY seq ASC");
        let rows: Vec<MessageRow> = sqlx::query_as(&sql)
            .bind(conversation_id)
            .fetch_all(self.pool())
            .await
            .map_err(unavailable)?;
        Ok(rows.into_iter().map(message_from_row).collect())
    }

    async fn count_messages(&self, conversation_id: &str) -> Result<u64, AgentError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM messages WHERE conversation_id = ?1")
                .bind(conversation_id)
                .fetch_one(self.pool())
                .await
                .map_err(unavailable)?;
        Ok(count.max(0) as u64)
    }

    async fn purge_conversations(&self, owner: &str) -> Result<u64, AgentError> {
        let mut tx = self.pool().begin().await.map_err(unavailable)?;
        sqlx::query(
            "DELETE FROM messages WHERE conversation_id IN \
             (SELECT id FROM conversations WHERE user_id = ?1)",
        )
        .bind(owner)
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?;
        let result = sqlx::query("DELETE FROM conversations WHERE user_id = ?1")
            .bind(owner)
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;
        tx.commit().await.map_err(unavailable)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;
    use taskmate_agent::IntentKind;

    async fn store_with(owner: &str) -> (SqliteStore, Conversation) {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        let conversation = Conversation::start(owner, "add buy milk");
        store.create_conversation(conversation.clone()).await.unwrap();
        (store, conversation)
    }

    #[tokio::test]
    async fn messages_round_trip_with_meta_and_tool_calls() {
        let (store, conv) = store_with("u1").await;
        store.append(Message::user(&conv.id, "add buy milk")).await.unwrap();
        let meta = TurnMeta {
            intent: Some(IntentKind::Create),
            focus: Some(7),
            ..TurnMeta::default()
        };
        let call = ToolCall {
            operation: "add_task".into(),
            arguments: json!({ "title": "buy milk" }),
            result: json!({ "task_id": 7, "status": "created" }),
        };
        let reply = Message::assistant(&conv.id, "Added 'buy milk' to your list.".into(), vec![call], meta);
        store.append(reply.clone()).await.unwrap();

        let messages = store.messages(&conv.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1], reply);
    }

    #[tokio::test]
    async fn recent_returns_tail_in_order() {
        let (store, conv) = store_with("u1").await;
        for i in 0..5 {
            store
                .append(Message::user(&conv.id, &format!("m{i}")))
                .await
                .unwrap();
        }
        let recent = store.recent(&conv.id, 2).await.unwrap();
        let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["m3", "m4"]);
        assert_eq!(store.count_messages(&conv.id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn append_to_unknown_conversation_fails() {
        let (store, _) = store_with("u1").await;
        let err = store
            .append(Message::user("missing", "hello"))
            .await
            .unwrap_err();
        assert_eq!(err, AgentError::ConversationNotFound("missing".into()));
    }

    #[tokio::test]
    async fn conversations_are_owner_scoped() {
        let (store, conv) = store_with("alice").await;
        store.append(Message::user(&conv.id, "hi")).await.unwrap();

        assert!(store.get_conversation("bob", &conv.id).await.unwrap().is_none());
        assert!(!store.delete_conversation("bob", &conv.id).await.unwrap());
        assert_eq!(store.count_messages(&conv.id).await.unwrap(), 1);

        assert!(store.delete_conversation("alice", &conv.id).await.unwrap());
        assert_eq!(store.count_messages(&conv.id).await.unwrap(), 0);
        assert!(store.list_conversations("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn purge_removes_conversations_and_messages() {
        let (store, conv) = store_with("u1").await;
        store.append(Message::user(&conv.id, "hi")).await.unwrap();
        assert_eq!(store.purge_conversations("u1").await.unwrap(), 1);
        assert_eq!(store.count_messages(&conv.id).await.unwrap(), 0);
    }
}
