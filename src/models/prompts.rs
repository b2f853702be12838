use crate::models::schema::{chats, prompts};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
    #[error("Prompt not found")]
    NotFound,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(table_name = prompts)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub id: i32,
    pub chat_id: i32,
    pub prompt: String,
    pub response: String,
    pub model_name: String,
    pub is_starred: bool,
    pub starred_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update of a prompt; `None` fields are left untouched
#[derive(AsChangeset, Debug, Default, Clone)]
#[diesel(table_name = prompts)]
pub struct PromptChanges {
    pub response: Option<String>,
    pub is_starred: Option<bool>,
    pub starred_at: Option<Option<DateTime<Utc>>>,
}

impl PromptChanges {
    /// Star or unstar, stamping `starred_at` accordingly
    pub fn starred(is_starred: bool) -> Self {
        Self {
            response: None,
            is_starred: Some(is_starred),
            starred_at: Some(is_starred.then(Utc::now)),
        }
    }
}

fn map_not_found(e: diesel::result::Error) -> PromptError {
    match e {
        diesel::result::Error::NotFound => PromptError::NotFound,
        _ => PromptError::DatabaseError(e),
    }
}

impl Prompt {
    /// Fetch a prompt only if it sits in a chat owned by `user_id`
    pub fn get_for_user(
        conn: &mut PgConnection,
        prompt_id: i32,
        user_id: i32,
    ) -> Result<Prompt, PromptError> {
        prompts::table
            .inner_join(chats::table)
            .filter(prompts::id.eq(prompt_id))
            .filter(chats::user_id.eq(user_id))
            .select(Prompt::as_select())
            .first::<Prompt>(conn)
            .map_err(map_not_found)
    }

    pub fn update(
        conn: &mut PgConnection,
        prompt_id: i32,
        changes: &PromptChanges,
    ) -> Result<Prompt, PromptError> {
        diesel::update(prompts::table.filter(prompts::id.eq(prompt_id)))
            .set((changes, prompts::updated_at.eq(diesel::dsl::now)))
            .get_result(conn)
            .map_err(map_not_found)
    }

    pub fn update_response(
        conn: &mut PgConnection,
        prompt_id: i32,
        response: &str,
    ) -> Result<(), PromptError> {
        let rows = diesel::update(prompts::table.filter(prompts::id.eq(prompt_id)))
            .set((
                prompts::response.eq(response),
                prompts::updated_at.eq(diesel::dsl::now),
            ))
            .execute(conn)?;

        if rows == 0 {
            Err(PromptError::NotFound)
        } else {
            Ok(())
        }
    }

    /// Starred prompts across all chats of a user, most recently starred first
    pub fn list_starred_for_user(
        conn: &mut PgConnection,
        user_id: i32,
    ) -> Result<Vec<Prompt>, PromptError> {
        prompts::table
            .inner_join(chats::table)
            .filter(chats::user_id.eq(user_id))
            .filter(prompts::is_starred.eq(true))
            .order(prompts::starred_at.desc())
            .select(Prompt::as_select())
            .load::<Prompt>(conn)
            .map_err(PromptError::DatabaseError)
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = prompts)]
pub struct NewPrompt {
    pub chat_id: i32,
    pub prompt: String,
    pub response: String,
    pub model_name: String,
    pub is_starred: bool,
}

impl NewPrompt {
    /// A prompt awaiting generation: empty response, not starred
    pub fn new(chat_id: i32, prompt: String, model_name: String) -> Self {
        Self {
            chat_id,
            prompt,
            response: String::new(),
            model_name,
            is_starred: false,
        }
    }

    pub fn insert(self, conn: &mut PgConnection) -> Result<Prompt, PromptError> {
        diesel::insert_into(prompts::table)
            .values(&self)
            .get_result(conn)
            .map_err(PromptError::DatabaseError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_prompt_starts_empty_and_unstarred() {
        let p = NewPrompt::new(7, "hello".to_string(), "Default".to_string());
        assert_eq!(p.chat_id, 7);
        assert!(p.response.is_empty());
        assert!(!p.is_starred);
    }

    #[test]
    fn test_starred_changes_stamp_time() {
        let star = PromptChanges::starred(true);
        assert_eq!(star.is_starred, Some(true));
        assert!(matches!(star.starred_at, Some(Some(_))));

        let unstar = PromptChanges::starred(false);
        assert_eq!(unstar.is_starred, Some(false));
        assert!(matches!(unstar.starred_at, Some(None)));
        assert!(unstar.response.is_none());
    }
}
