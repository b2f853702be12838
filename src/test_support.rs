//! In-memory database and state builders for handler tests.

use crate::config::AppConfig;
use crate::db::{DBConnection, DBError};
use crate::generation::{BackendSettings, ChunkOptions, SimulatedConfig};
use crate::models::ai_models::AiModel;
use crate::models::chats::{Chat, ChatError, NewChat};
use crate::models::prompts::{NewPrompt, Prompt, PromptChanges, PromptError};
use crate::models::users::{NewUser, User, UserError};
use crate::AppState;
use axum::http::{header, StatusCode};
use axum::Router;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "handler-test-secret";

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    chats: Vec<Chat>,
    prompts: Vec<Prompt>,
}

#[derive(Default)]
pub struct MemoryDb {
    tables: Mutex<Tables>,
}

impl MemoryDb {
    pub fn prompt(&self, prompt_id: i32) -> Option<Prompt> {
        let tables = self.tables.lock().unwrap();
        tables.prompts.iter().find(|p| p.id == prompt_id).cloned()
    }

    pub fn delete_user(&self, user_id: i32) {
        let mut tables = self.tables.lock().unwrap();
        tables.users.retain(|u| u.id != user_id);
    }

    /// A user with one chat holding one fresh prompt for `model_name`
    pub fn seed_prompt(&self, email: &str, model_name: &str) -> (User, Chat, Prompt) {
        let user = self
            .create_user(NewUser::new(
                "Test".to_string(),
                email.to_string(),
                String::new(),
            ))
            .unwrap();
        let chat = self
            .create_chat(NewChat::new(user.id, "Test chat".to_string()))
            .unwrap();
        let prompt = self
            .create_prompt(NewPrompt::new(
                chat.id,
                "Tell me something".to_string(),
                model_name.to_string(),
            ))
            .unwrap();
        (user, chat, prompt)
    }
}

impl DBConnection for MemoryDb {
    fn create_user(&self, new_user: NewUser) -> Result<User, DBError> {
        let mut tables = self.tables.lock().unwrap();
        if tables.users.iter().any(|u| u.email == new_user.email) {
            return Err(UserError::DuplicateEmail.into());
        }
        let user = User {
            id: tables.users.len() as i32 + 1,
            uuid: new_user.uuid,
            name: new_user.name,
            email: new_user.email,
            password_hash: new_user.password_hash,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    fn get_user_by_uuid(&self, uuid: Uuid) -> Result<User, DBError> {
        let tables = self.tables.lock().unwrap();
        tables
            .users
            .iter()
            .find(|u| u.uuid == uuid)
            .cloned()
            .ok_or(DBError::UserNotFound)
    }

    fn get_user_by_email(&self, email: &str) -> Result<User, DBError> {
        let tables = self.tables.lock().unwrap();
        tables
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(DBError::UserNotFound)
    }

    fn list_ai_models(&self) -> Result<Vec<AiModel>, DBError> {
        Ok(["Default", "GPT-4", "Gemini Pro"]
            .iter()
            .enumerate()
            .map(|(i, name)| AiModel {
                id: i as i32 + 1,
                name: name.to_string(),
                description: None,
                created_at: Utc::now(),
            })
            .collect())
    }

    fn create_chat(&self, new_chat: NewChat) -> Result<Chat, DBError> {
        let mut tables = self.tables.lock().unwrap();
        let chat = Chat {
            id: tables.chats.len() as i32 + 1,
            user_id: new_chat.user_id,
            title: new_chat.title,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        tables.chats.push(chat.clone());
        Ok(chat)
    }

    fn get_chat_for_user(&self, chat_id: i32, user_id: i32) -> Result<Chat, DBError> {
        let tables = self.tables.lock().unwrap();
        tables
            .chats
            .iter()
            .find(|c| c.id == chat_id && c.user_id == user_id)
            .cloned()
            .ok_or(ChatError::NotFound.into())
    }

    fn list_chats_with_prompts(&self, user_id: i32) -> Result<Vec<(Chat, Vec<Prompt>)>, DBError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .chats
            .iter()
            .rev()
            .filter(|c| c.user_id == user_id)
            .map(|c| {
                let prompts = tables
                    .prompts
                    .iter()
                    .filter(|p| p.chat_id == c.id)
                    .cloned()
                    .collect();
                (c.clone(), prompts)
            })
            .collect())
    }

    fn create_prompt(&self, new_prompt: NewPrompt) -> Result<Prompt, DBError> {
        let mut tables = self.tables.lock().unwrap();
        let prompt = Prompt {
            id: tables.prompts.len() as i32 + 1,
            chat_id: new_prompt.chat_id,
            prompt: new_prompt.prompt,
            response: new_prompt.response,
            model_name: new_prompt.model_name,
            is_starred: new_prompt.is_starred,
            starred_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        tables.prompts.push(prompt.clone());
        Ok(prompt)
    }

    fn get_prompt_for_user(&self, prompt_id: i32, user_id: i32) -> Result<Prompt, DBError> {
        let tables = self.tables.lock().unwrap();
        tables
            .prompts
            .iter()
            .find(|p| {
                p.id == prompt_id
                    && tables
                        .chats
                        .iter()
                        .any(|c| c.id == p.chat_id && c.user_id == user_id)
            })
            .cloned()
            .ok_or(PromptError::NotFound.into())
    }

    fn update_prompt(&self, prompt_id: i32, changes: PromptChanges) -> Result<Prompt, DBError> {
        let mut tables = self.tables.lock().unwrap();
        let prompt = tables
            .prompts
            .iter_mut()
            .find(|p| p.id == prompt_id)
            .ok_or(DBError::from(PromptError::NotFound))?;
        if let Some(response) = changes.response {
            prompt.response = response;
        }
        if let Some(is_starred) = changes.is_starred {
            prompt.is_starred = is_starred;
        }
        if let Some(starred_at) = changes.starred_at {
            prompt.starred_at = starred_at;
        }
        prompt.updated_at = Utc::now();
        Ok(prompt.clone())
    }

    fn update_prompt_response(&self, prompt_id: i32, response: &str) -> Result<(), DBError> {
        self.update_prompt(
            prompt_id,
            PromptChanges {
                response: Some(response.to_string()),
                ..PromptChanges::default()
            },
        )
        .map(|_| ())
    }

    fn list_starred_prompts(&self, user_id: i32) -> Result<Vec<Prompt>, DBError> {
        let tables = self.tables.lock().unwrap();
        let mut starred: Vec<Prompt> = tables
            .prompts
            .iter()
            .filter(|p| {
                p.is_starred
                    && tables
                        .chats
                        .iter()
                        .any(|c| c.id == p.chat_id && c.user_id == user_id)
            })
            .cloned()
            .collect();
        starred.sort_by(|a, b| b.starred_at.cmp(&a.starred_at));
        Ok(starred)
    }
}

pub fn test_config(options: ChunkOptions) -> AppConfig {
    AppConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: "postgres://unused".to_string(),
        jwt_secret: TEST_JWT_SECRET.to_string(),
        cors_origin: None,
        persist_every_fragment: true,
        backends: BackendSettings {
            simulated: SimulatedConfig {
                body: "ABCDEFGHIJ".to_string(),
                options,
            },
            gemini: None,
            openai: None,
        },
    }
}

/// Fast simulated backend over "ABCDEFGHIJ" in fragments of three
pub fn test_state() -> (Arc<AppState>, Arc<MemoryDb>) {
    test_state_with(ChunkOptions::new(Duration::ZERO, 3))
}

pub fn test_state_with(options: ChunkOptions) -> (Arc<AppState>, Arc<MemoryDb>) {
    let db = Arc::new(MemoryDb::default());
    let state = Arc::new(AppState::new(db.clone(), test_config(options)));
    (state, db)
}

/// Serves `body` with `status` on every path from a local port and returns the
/// base url. Stands in for a provider's streaming endpoint.
pub async fn serve_stub(status: StatusCode, body: &'static str) -> String {
    let app = Router::new().fallback(move || async move {
        (status, [(header::CONTENT_TYPE, "text/event-stream")], body)
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}
