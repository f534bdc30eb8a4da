use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::schema::email_log;

/// One outbound email attempt
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = email_log)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EmailLogEntry {
    pub id: Uuid,
    pub provider: String,
    pub to_email: String,
    pub template: String,
    pub status: String,
    pub provider_message_id: Option<String>,
    pub payload: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = email_log)]
pub struct NewEmailLogEntry {
    pub id: Uuid,
    pub provider: String,
    pub to_email: String,
    pub template: String,
    pub status: String,
    pub provider_message_id: Option<String>,
    pub payload: Option<JsonValue>,
}

impl EmailLogEntry {
    pub async fn insert(conn: &mut AsyncPgConnection, entry: &NewEmailLogEntry) -> QueryResult<usize> {
        diesel::insert_into(email_log::table)
            .values(entry)
            .execute(conn)
            .await
    }

    pub async fn list_recent(
        conn: &mut AsyncPgConnection,
        limit: i64,
    ) -> QueryResult<Vec<EmailLogEntry>> {
        email_log::table
            .order(email_log::created_at.desc())
            .limit(limit)
            .select(EmailLogEntry::as_select())
            .load(conn)
            .await
    }
}
