use crate::models::schema::users;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum UserError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
    #[error("Email already registered")]
    DuplicateEmail,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Clone)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub uuid: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("uuid", &self.uuid)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

impl User {
    pub fn get_by_uuid(conn: &mut PgConnection, uuid: Uuid) -> Result<Option<Self>, UserError> {
        users::table
            .filter(users::uuid.eq(uuid))
            .first::<Self>(conn)
            .optional()
            .map_err(UserError::DatabaseError)
    }

    pub fn get_by_email(conn: &mut PgConnection, email: &str) -> Result<Option<Self>, UserError> {
        users::table
            .filter(users::email.eq(email))
            .first::<Self>(conn)
            .optional()
            .map_err(UserError::DatabaseError)
    }
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub uuid: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("uuid", &self.uuid)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

impl NewUser {
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name,
            email,
            password_hash,
        }
    }

    pub fn insert(self, conn: &mut PgConnection) -> Result<User, UserError> {
        diesel::insert_into(users::table)
            .values(&self)
            .get_result(conn)
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    ref info,
                ) if info.constraint_name() == Some("users_email_key") => {
                    UserError::DuplicateEmail
                }
                _ => UserError::DatabaseError(e),
            })
    }
}
