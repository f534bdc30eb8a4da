use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::schema::app_settings;

/// Key under which admin feature flags are stored
pub const FEATURE_FLAGS_KEY: &str = "feature_flags";

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = app_settings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AppSetting {
    pub key: String,
    pub value: JsonValue,
    pub updated_at: DateTime<Utc>,
}

impl AppSetting {
    pub async fn get(conn: &mut AsyncPgConnection, setting_key: &str) -> QueryResult<Option<JsonValue>> {
        app_settings::table
            .find(setting_key)
            .select(app_settings::value)
            .first(conn)
            .await
            .optional()
    }

    pub async fn put(
        conn: &mut AsyncPgConnection,
        setting_key: &str,
        new_value: &JsonValue,
    ) -> QueryResult<usize> {
        let now = Utc::now();
        diesel::insert_into(app_settings::table)
            .values((
                app_settings::key.eq(setting_key),
                app_settings::value.eq(new_value),
                app_settings::updated_at.eq(now),
            ))
            .on_conflict(app_settings::key)
            .do_update()
            .set((app_settings::value.eq(new_value), app_settings::updated_at.eq(now)))
            .execute(conn)
            .await
    }
}
