use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{short_clicks, short_links};

/// Distribution channel a short link is tagged with
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Qr,
    Whatsapp,
    Sms,
    Email,
    Link,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::Qr,
        Channel::Whatsapp,
        Channel::Sms,
        Channel::Email,
        Channel::Link,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Qr => "qr",
            Channel::Whatsapp => "whatsapp",
            Channel::Sms => "sms",
            Channel::Email => "email",
            Channel::Link => "link",
        }
    }

    /// Unknown channel names aggregate as `link`
    pub fn from_string(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "qr" => Channel::Qr,
            "whatsapp" => Channel::Whatsapp,
            "sms" => Channel::Sms,
            "email" => Channel::Email,
            _ => Channel::Link,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = short_links)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ShortLink {
    pub slug: String,
    pub business_id: Uuid,
    pub channel: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = short_clicks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ShortClick {
    pub id: i64,
    pub slug: String,
    pub ts: DateTime<Utc>,
}

impl ShortLink {
    pub fn channel(&self) -> Channel {
        Channel::from_string(&self.channel)
    }

    pub async fn insert(conn: &mut AsyncPgConnection, link: &ShortLink) -> QueryResult<ShortLink> {
        diesel::insert_into(short_links::table)
            .values(link)
            .returning(ShortLink::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn find_by_slug(
        conn: &mut AsyncPgConnection,
        link_slug: &str,
    ) -> QueryResult<Option<ShortLink>> {
        short_links::table
            .find(link_slug)
            .select(ShortLink::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn list_for_businesses(
        conn: &mut AsyncPgConnection,
        business_ids: &[Uuid],
    ) -> QueryResult<Vec<ShortLink>> {
        short_links::table
            .filter(short_links::business_id.eq_any(business_ids))
            .order(short_links::created_at.desc())
            .select(ShortLink::as_select())
            .load(conn)
            .await
    }

    pub async fn list_by_slugs(
        conn: &mut AsyncPgConnection,
        slugs: &[String],
    ) -> QueryResult<Vec<ShortLink>> {
        short_links::table
            .filter(short_links::slug.eq_any(slugs))
            .select(ShortLink::as_select())
            .load(conn)
            .await
    }
}

impl ShortClick {
    pub async fn record(
        conn: &mut AsyncPgConnection,
        link_slug: &str,
        at: DateTime<Utc>,
    ) -> QueryResult<usize> {
        diesel::insert_into(short_clicks::table)
            .values((short_clicks::slug.eq(link_slug), short_clicks::ts.eq(at)))
            .execute(conn)
            .await
    }

    /// Clicks at or after `since`, optionally restricted to a set of slugs
    pub async fn since(
        conn: &mut AsyncPgConnection,
        slugs: Option<&[String]>,
        since: DateTime<Utc>,
        limit: i64,
    ) -> QueryResult<Vec<ShortClick>> {
        let mut query = short_clicks::table
            .filter(short_clicks::ts.ge(since))
            .order(short_clicks::ts.asc())
            .limit(limit)
            .select(ShortClick::as_select())
            .into_boxed();

        if let Some(slugs) = slugs {
            query = query.filter(short_clicks::slug.eq_any(slugs.to_vec()));
        }

        query.load(conn).await
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShortLinkRequest {
    pub business_id: Uuid,
    pub channel: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShortLinkResponse {
    pub slug: String,
    pub url: String,
    pub channel: Channel,
    pub created_at: DateTime<Utc>,
}

impl ShortLinkResponse {
    pub fn from_link(link: &ShortLink, app_url: &str) -> Self {
        Self {
            slug: link.slug.clone(),
            url: format!("{}/r/{}", app_url, link.slug),
            channel: link.channel(),
            created_at: link.created_at,
        }
    }
}
