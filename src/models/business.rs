use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::schema::businesses;

const GOOGLE_WRITE_REVIEW_URL: &str = "https://search.google.com/local/writereview";

/// A business profile. At most one row per owner.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = businesses)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Business {
    pub id: Uuid,
    pub owner_uid: String,
    pub name: String,
    pub google_place_id: Option<String>,
    pub google_maps_place_uri: Option<String>,
    pub google_maps_write_review_uri: Option<String>,
    pub review_link: Option<String>,
    pub google_rating: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert/update payload. `None` fields are left untouched on update.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = businesses)]
pub struct BusinessUpsert {
    pub owner_uid: String,
    pub name: String,
    pub google_place_id: Option<String>,
    pub google_maps_place_uri: Option<String>,
    pub google_maps_write_review_uri: Option<String>,
    pub review_link: Option<String>,
    pub google_rating: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpsertBusinessRequest {
    #[validate(length(min = 1, max = 200, message = "name is required"))]
    pub name: String,
    pub google_place_id: Option<String>,
    #[validate(url)]
    pub google_maps_place_uri: Option<String>,
    #[validate(url)]
    pub google_maps_write_review_uri: Option<String>,
    #[validate(url)]
    pub review_link: Option<String>,
    #[validate(range(min = 0.0, max = 5.0))]
    pub google_rating: Option<f64>,
}

impl UpsertBusinessRequest {
    /// Build the row for `owner_uid`, deriving the review link from the
    /// place id when the caller did not send one.
    pub fn into_upsert(self, owner_uid: &str) -> BusinessUpsert {
        let review_link = self
            .review_link
            .or_else(|| self.google_maps_write_review_uri.clone())
            .or_else(|| self.google_place_id.as_deref().map(make_google_review_link));

        BusinessUpsert {
            owner_uid: owner_uid.to_string(),
            name: self.name.trim().to_string(),
            google_place_id: self.google_place_id,
            google_maps_place_uri: self.google_maps_place_uri,
            google_maps_write_review_uri: self.google_maps_write_review_uri,
            review_link,
            google_rating: self.google_rating,
            updated_at: Utc::now(),
        }
    }
}

/// Google "write a review" deep link for a place id
pub fn make_google_review_link(place_id: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(place_id.as_bytes()).collect();
    format!("{}?placeid={}", GOOGLE_WRITE_REVIEW_URL, encoded)
}

impl Business {
    pub async fn find_by_owner(
        conn: &mut AsyncPgConnection,
        owner: &str,
    ) -> QueryResult<Option<Business>> {
        businesses::table
            .filter(businesses::owner_uid.eq(owner))
            .select(Business::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        business_id: Uuid,
    ) -> QueryResult<Option<Business>> {
        businesses::table
            .find(business_id)
            .select(Business::as_select())
            .first(conn)
            .await
            .optional()
    }

    /// Upsert keyed by owner
    pub async fn upsert(
        conn: &mut AsyncPgConnection,
        changes: &BusinessUpsert,
    ) -> QueryResult<Business> {
        diesel::insert_into(businesses::table)
            .values((businesses::id.eq(Uuid::new_v4()), changes))
            .on_conflict(businesses::owner_uid)
            .do_update()
            .set(changes)
            .returning(Business::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn list_by_owner(
        conn: &mut AsyncPgConnection,
        owner: &str,
    ) -> QueryResult<Vec<Business>> {
        businesses::table
            .filter(businesses::owner_uid.eq(owner))
            .select(Business::as_select())
            .load(conn)
            .await
    }

    pub async fn list_all(conn: &mut AsyncPgConnection) -> QueryResult<Vec<Business>> {
        businesses::table
            .order(businesses::created_at.asc())
            .select(Business::as_select())
            .load(conn)
            .await
    }

    pub async fn count_created_since(
        conn: &mut AsyncPgConnection,
        since: DateTime<Utc>,
    ) -> QueryResult<i64> {
        businesses::table
            .filter(businesses::created_at.ge(since))
            .count()
            .get_result(conn)
            .await
    }
}
