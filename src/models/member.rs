use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::schema::{business_members, member_invites};

/// Access role within a business
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Member,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Member => "member",
            Role::Viewer => "viewer",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(Role::Owner),
            "admin" => Some(Role::Admin),
            "member" => Some(Role::Member),
            "viewer" => Some(Role::Viewer),
            _ => None,
        }
    }

    /// Roles that can be handed out through an invite
    pub fn is_invitable(&self) -> bool {
        !matches!(self, Role::Owner)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = business_members)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BusinessMember {
    #[serde(skip_serializing)]
    pub business_id: Uuid,
    pub uid: String,
    pub role: String,
    pub added_at: DateTime<Utc>,
}

impl BusinessMember {
    pub fn role(&self) -> Option<Role> {
        Role::from_string(&self.role)
    }

    pub async fn find(
        conn: &mut AsyncPgConnection,
        business: Uuid,
        member_uid: &str,
    ) -> QueryResult<Option<BusinessMember>> {
        business_members::table
            .filter(business_members::business_id.eq(business))
            .filter(business_members::uid.eq(member_uid))
            .select(BusinessMember::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn list_for_business(
        conn: &mut AsyncPgConnection,
        business: Uuid,
    ) -> QueryResult<Vec<BusinessMember>> {
        business_members::table
            .filter(business_members::business_id.eq(business))
            .order(business_members::added_at.asc())
            .select(BusinessMember::as_select())
            .load(conn)
            .await
    }

    pub async fn upsert(
        conn: &mut AsyncPgConnection,
        business: Uuid,
        member_uid: &str,
        role: Role,
    ) -> QueryResult<usize> {
        diesel::insert_into(business_members::table)
            .values((
                business_members::business_id.eq(business),
                business_members::uid.eq(member_uid),
                business_members::role.eq(role.as_str()),
            ))
            .on_conflict((business_members::business_id, business_members::uid))
            .do_update()
            .set(business_members::role.eq(role.as_str()))
            .execute(conn)
            .await
    }

    pub async fn remove(
        conn: &mut AsyncPgConnection,
        business: Uuid,
        member_uid: &str,
    ) -> QueryResult<usize> {
        diesel::delete(
            business_members::table
                .filter(business_members::business_id.eq(business))
                .filter(business_members::uid.eq(member_uid)),
        )
        .execute(conn)
        .await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = member_invites)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MemberInvite {
    pub token: String,
    #[serde(skip_serializing)]
    pub business_id: Uuid,
    pub email: String,
    pub role: String,
    #[serde(skip_serializing)]
    pub invited_by: Option<String>,
    pub invited_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = member_invites)]
pub struct NewMemberInvite {
    pub token: String,
    pub business_id: Uuid,
    pub email: String,
    pub role: String,
    pub invited_by: Option<String>,
}

impl MemberInvite {
    pub fn is_accepted(&self) -> bool {
        self.accepted_at.is_some()
    }

    pub async fn insert(
        conn: &mut AsyncPgConnection,
        invite: &NewMemberInvite,
    ) -> QueryResult<MemberInvite> {
        diesel::insert_into(member_invites::table)
            .values(invite)
            .returning(MemberInvite::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn find_by_token(
        conn: &mut AsyncPgConnection,
        invite_token: &str,
    ) -> QueryResult<Option<MemberInvite>> {
        member_invites::table
            .filter(member_invites::token.eq(invite_token))
            .select(MemberInvite::as_select())
            .first(conn)
            .await
            .optional()
    }

    /// Marks the invite accepted. Returns false if it was already used.
    pub async fn mark_accepted(
        conn: &mut AsyncPgConnection,
        invite_token: &str,
        by_uid: &str,
    ) -> QueryResult<bool> {
        let updated = diesel::update(
            member_invites::table
                .filter(member_invites::token.eq(invite_token))
                .filter(member_invites::accepted_at.is_null()),
        )
        .set((
            member_invites::accepted_by.eq(by_uid),
            member_invites::accepted_at.eq(Utc::now()),
        ))
        .execute(conn)
        .await?;

        Ok(updated == 1)
    }

    pub async fn list_for_business(
        conn: &mut AsyncPgConnection,
        business: Uuid,
    ) -> QueryResult<Vec<MemberInvite>> {
        member_invites::table
            .filter(member_invites::business_id.eq(business))
            .order(member_invites::invited_at.desc())
            .select(MemberInvite::as_select())
            .load(conn)
            .await
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InviteMemberRequest {
    pub business_id: Uuid,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AcceptInviteRequest {
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveMemberRequest {
    pub business_id: Uuid,
    pub uid: String,
}
