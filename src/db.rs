use crate::models::ai_models::AiModel;
use crate::models::chats::{Chat, ChatError, NewChat};
use crate::models::prompts::{NewPrompt, Prompt, PromptChanges, PromptError};
use crate::models::users::{NewUser, User, UserError};
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

const DB_POOL_MAX_SIZE: u32 = 10;

#[derive(Error, Debug)]
pub enum DBError {
    #[error("Database connection error")]
    ConnectionError,
    #[error("Database query error: {0}")]
    QueryError(#[from] diesel::result::Error),
    #[error("User not found")]
    UserNotFound,
    #[error("User error: {0}")]
    UserError(#[from] UserError),
    #[error("Chat error: {0}")]
    ChatError(#[from] ChatError),
    #[error("Prompt error: {0}")]
    PromptError(#[from] PromptError),
    #[error("Blocking task failed: {0}")]
    TaskError(String),
}

/// Every query the web layer performs
pub trait DBConnection {
    fn create_user(&self, new_user: NewUser) -> Result<User, DBError>;
    fn get_user_by_uuid(&self, uuid: Uuid) -> Result<User, DBError>;
    fn get_user_by_email(&self, email: &str) -> Result<User, DBError>;

    fn list_ai_models(&self) -> Result<Vec<AiModel>, DBError>;

    fn create_chat(&self, new_chat: NewChat) -> Result<Chat, DBError>;
    fn get_chat_for_user(&self, chat_id: i32, user_id: i32) -> Result<Chat, DBError>;
    fn list_chats_with_prompts(&self, user_id: i32) -> Result<Vec<(Chat, Vec<Prompt>)>, DBError>;

    fn create_prompt(&self, new_prompt: NewPrompt) -> Result<Prompt, DBError>;
    fn get_prompt_for_user(&self, prompt_id: i32, user_id: i32) -> Result<Prompt, DBError>;
    fn update_prompt(&self, prompt_id: i32, changes: PromptChanges) -> Result<Prompt, DBError>;
    fn update_prompt_response(&self, prompt_id: i32, response: &str) -> Result<(), DBError>;
    fn list_starred_prompts(&self, user_id: i32) -> Result<Vec<Prompt>, DBError>;
}

pub struct PostgresConnection {
    db: Pool<ConnectionManager<PgConnection>>,
}

impl PostgresConnection {
    fn conn(&self) -> Result<PooledConnection<ConnectionManager<PgConnection>>, DBError> {
        self.db.get().map_err(|e| {
            error!("Failed to get pooled connection: {:?}", e);
            DBError::ConnectionError
        })
    }
}

impl DBConnection for PostgresConnection {
    fn create_user(&self, new_user: NewUser) -> Result<User, DBError> {
        debug!("Creating new user");
        let conn = &mut self.conn()?;
        new_user.insert(conn).map_err(DBError::from)
    }

    fn get_user_by_uuid(&self, uuid: Uuid) -> Result<User, DBError> {
        let conn = &mut self.conn()?;
        User::get_by_uuid(conn, uuid)?.ok_or(DBError::UserNotFound)
    }

    fn get_user_by_email(&self, email: &str) -> Result<User, DBError> {
        let conn = &mut self.conn()?;
        User::get_by_email(conn, email)?.ok_or(DBError::UserNotFound)
    }

    fn list_ai_models(&self) -> Result<Vec<AiModel>, DBError> {
        let conn = &mut self.conn()?;
        AiModel::list(conn).map_err(DBError::from)
    }

    fn create_chat(&self, new_chat: NewChat) -> Result<Chat, DBError> {
        let conn = &mut self.conn()?;
        new_chat.insert(conn).map_err(DBError::from)
    }

    fn get_chat_for_user(&self, chat_id: i32, user_id: i32) -> Result<Chat, DBError> {
        let conn = &mut self.conn()?;
        Chat::get_for_user(conn, chat_id, user_id).map_err(DBError::from)
    }

    fn list_chats_with_prompts(&self, user_id: i32) -> Result<Vec<(Chat, Vec<Prompt>)>, DBError> {
        let conn = &mut self.conn()?;
        Chat::list_with_prompts(conn, user_id).map_err(DBError::from)
    }

    fn create_prompt(&self, new_prompt: NewPrompt) -> Result<Prompt, DBError> {
        let conn = &mut self.conn()?;
        new_prompt.insert(conn).map_err(DBError::from)
    }

    fn get_prompt_for_user(&self, prompt_id: i32, user_id: i32) -> Result<Prompt, DBError> {
        let conn = &mut self.conn()?;
        Prompt::get_for_user(conn, prompt_id, user_id).map_err(DBError::from)
    }

    fn update_prompt(&self, prompt_id: i32, changes: PromptChanges) -> Result<Prompt, DBError> {
        let conn = &mut self.conn()?;
        Prompt::update(conn, prompt_id, &changes).map_err(DBError::from)
    }

    fn update_prompt_response(&self, prompt_id: i32, response: &str) -> Result<(), DBError> {
        let conn = &mut self.conn()?;
        Prompt::update_response(conn, prompt_id, response).map_err(DBError::from)
    }

    fn list_starred_prompts(&self, user_id: i32) -> Result<Vec<Prompt>, DBError> {
        let conn = &mut self.conn()?;
        Prompt::list_starred_for_user(conn, user_id).map_err(DBError::from)
    }
}

pub fn setup_db(url: &str) -> Result<PostgresConnection, DBError> {
    let manager = ConnectionManager::<PgConnection>::new(url);
    let pool = Pool::builder()
        .max_size(DB_POOL_MAX_SIZE)
        .build(manager)
        .map_err(|e| {
            error!("Could not build database pool: {:?}", e);
            DBError::ConnectionError
        })?;
    info!("Database pool ready (max {} connections)", DB_POOL_MAX_SIZE);
    Ok(PostgresConnection { db: pool })
}
