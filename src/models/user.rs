use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

use crate::schema::users;

/// A user mirrored from the identity provider on session creation
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
#[diesel(primary_key(uid))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub uid: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub uid: String,
    pub email: String,
}

impl NewUser {
    pub fn new(uid: impl Into<String>, email: &str) -> Self {
        Self {
            uid: uid.into(),
            email: normalize_email(email),
        }
    }
}

/// Emails are stored lowercased so lookups by email are case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl User {
    /// Insert the user or refresh its email if the uid already exists
    pub async fn upsert(conn: &mut AsyncPgConnection, new_user: &NewUser) -> QueryResult<User> {
        diesel::insert_into(users::table)
            .values(new_user)
            .on_conflict(users::uid)
            .do_update()
            .set(users::email.eq(&new_user.email))
            .returning(User::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn find_by_uid(conn: &mut AsyncPgConnection, uid: &str) -> QueryResult<Option<User>> {
        users::table
            .filter(users::uid.eq(uid))
            .select(User::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn find_by_email(
        conn: &mut AsyncPgConnection,
        email: &str,
    ) -> QueryResult<Option<User>> {
        users::table
            .filter(users::email.eq(normalize_email(email)))
            .order(users::created_at.asc())
            .select(User::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn list(
        conn: &mut AsyncPgConnection,
        limit: i64,
        offset: i64,
    ) -> QueryResult<Vec<User>> {
        users::table
            .order(users::created_at.desc())
            .limit(limit)
            .offset(offset)
            .select(User::as_select())
            .load(conn)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_normalizes_email() {
        let user = NewUser::new("uid-1", "  Owner@Example.COM ");
        assert_eq!(user.email, "owner@example.com");
        assert_eq!(user.uid, "uid-1");
    }
}
