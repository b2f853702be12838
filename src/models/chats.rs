use crate::models::prompts::Prompt;
use crate::models::schema::{chats, prompts};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
    #[error("Chat not found")]
    NotFound,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(table_name = chats)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    /// Fetch a chat only if `user_id` owns it
    pub fn get_for_user(
        conn: &mut PgConnection,
        chat_id: i32,
        user_id: i32,
    ) -> Result<Chat, ChatError> {
        chats::table
            .filter(chats::id.eq(chat_id))
            .filter(chats::user_id.eq(user_id))
            .first::<Chat>(conn)
            .map_err(|e| match e {
                diesel::result::Error::NotFound => ChatError::NotFound,
                _ => ChatError::DatabaseError(e),
            })
    }

    /// All chats of a user, newest first, each with its prompts in creation order
    pub fn list_with_prompts(
        conn: &mut PgConnection,
        user_id: i32,
    ) -> Result<Vec<(Chat, Vec<Prompt>)>, ChatError> {
        let user_chats = chats::table
            .filter(chats::user_id.eq(user_id))
            .order(chats::created_at.desc())
            .load::<Chat>(conn)?;

        let chat_ids: Vec<i32> = user_chats.iter().map(|c| c.id).collect();
        let all_prompts = prompts::table
            .filter(prompts::chat_id.eq_any(&chat_ids))
            .order(prompts::created_at.asc())
            .load::<Prompt>(conn)?;

        Ok(user_chats
            .into_iter()
            .map(|chat| {
                let chat_prompts = all_prompts
                    .iter()
                    .filter(|p| p.chat_id == chat.id)
                    .cloned()
                    .collect();
                (chat, chat_prompts)
            })
            .collect())
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = chats)]
pub struct NewChat {
    pub user_id: i32,
    pub title: String,
}

impl NewChat {
    pub fn new(user_id: i32, title: String) -> Self {
        Self { user_id, title }
    }

    pub fn insert(self, conn: &mut PgConnection) -> Result<Chat, ChatError> {
        diesel::insert_into(chats::table)
            .values(&self)
            .get_result(conn)
            .map_err(ChatError::DatabaseError)
    }
}
