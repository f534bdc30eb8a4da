use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::schema::review_requests;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = review_requests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ReviewRequest {
    pub id: Uuid,
    pub business_id: Uuid,
    pub google_place_id: Option<String>,
    pub review_link: String,
    pub status: String,
    pub provider_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = review_requests)]
pub struct NewReviewRequest {
    pub id: Uuid,
    pub business_id: Uuid,
    pub google_place_id: Option<String>,
    pub review_link: String,
    pub status: String,
    pub provider_message_id: Option<String>,
}

impl ReviewRequest {
    pub async fn insert(
        conn: &mut AsyncPgConnection,
        request: &NewReviewRequest,
    ) -> QueryResult<ReviewRequest> {
        diesel::insert_into(review_requests::table)
            .values(request)
            .returning(ReviewRequest::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn count_since(
        conn: &mut AsyncPgConnection,
        business_ids: &[Uuid],
        since: DateTime<Utc>,
    ) -> QueryResult<i64> {
        review_requests::table
            .filter(review_requests::business_id.eq_any(business_ids))
            .filter(review_requests::created_at.ge(since))
            .count()
            .get_result(conn)
            .await
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendReviewRequest {
    pub business_id: Uuid,
    pub place_id: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub to_email: String,
    #[validate(length(max = 200))]
    pub customer_name: Option<String>,
    #[validate(url)]
    pub review_link: Option<String>,
}
