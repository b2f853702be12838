use crate::models::schema::ai_models;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Queryable, Selectable, Debug, Clone, Serialize, Deserialize)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(table_name = ai_models)]
pub struct AiModel {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
}

impl AiModel {
    pub fn list(conn: &mut PgConnection) -> Result<Vec<AiModel>, diesel::result::Error> {
        ai_models::table.order(ai_models::id.asc()).load::<AiModel>(conn)
    }
}
