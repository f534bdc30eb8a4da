use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::schema::webhook_events;

/// A provider event id seen by the webhook endpoint. The id is the dedup key.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = webhook_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct WebhookEvent {
    pub id: String,
    pub event_type: String,
    pub payload: JsonValue,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = webhook_events)]
pub struct NewWebhookEvent {
    pub id: String,
    pub event_type: String,
    pub payload: JsonValue,
}

impl WebhookEvent {
    /// Insert-or-skip. Returns true when this call recorded the event.
    pub async fn record(conn: &mut AsyncPgConnection, event: &NewWebhookEvent) -> QueryResult<bool> {
        let inserted = diesel::insert_into(webhook_events::table)
            .values(event)
            .on_conflict_do_nothing()
            .execute(conn)
            .await?;

        Ok(inserted == 1)
    }

    pub async fn delete(conn: &mut AsyncPgConnection, event_id: &str) -> QueryResult<usize> {
        diesel::delete(webhook_events::table.filter(webhook_events::id.eq(event_id)))
            .execute(conn)
            .await
    }
}
