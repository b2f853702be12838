pub mod ai_models;
pub mod chats;
pub mod prompts;
pub mod schema;
pub mod users;
