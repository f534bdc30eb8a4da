// Team membership: invites, acceptance, removal and listing

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::{Store, StoreError};
use crate::models::{normalize_email, BusinessMember, MemberInvite, NewMemberInvite, Role};
use crate::services::email::{EmailError, EmailService};
use crate::services::entitlements::has_active_pro;
use crate::services::roles::{can_manage_members, resolve_role};
use crate::utils::audit_logger::{AuditAction, AuditLogger};

#[derive(Error, Debug)]
pub enum MemberError {
    #[error("Forbidden")]
    Forbidden,

    #[error("Team invites require a Pro subscription")]
    ProRequired,

    #[error("Business not found")]
    BusinessNotFound,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invite was sent to a different email")]
    EmailMismatch,

    #[error("Role {0} cannot be invited")]
    RoleNotInvitable(Role),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Email(#[from] EmailError),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberListing {
    pub can_manage: bool,
    pub members: Vec<BusinessMember>,
    pub invites: Vec<MemberInvite>,
    pub role: Role,
}

#[derive(Clone)]
pub struct MemberService {
    store: Arc<dyn Store>,
    email: Arc<EmailService>,
    app_url: String,
}

impl MemberService {
    pub fn new(store: Arc<dyn Store>, email: Arc<EmailService>, app_url: String) -> Self {
        Self {
            store,
            email,
            app_url,
        }
    }

    /// Link a recipient follows to accept an invite
    pub fn accept_url(&self, token: &str) -> String {
        format!("{}/settings?accept={}", self.app_url, token)
    }

    #[instrument(skip(self))]
    pub async fn list(&self, uid: &str, business_id: Uuid) -> Result<MemberListing, MemberError> {
        let role = resolve_role(self.store.as_ref(), uid, business_id)
            .await?
            .ok_or(MemberError::Forbidden)?;

        let can_manage = can_manage_members(Some(role));
        let members = self.store.list_members(business_id).await?;

        // Invite tokens are bearer credentials; only managers see pending ones
        let invites = if can_manage {
            self.store
                .list_invites(business_id)
                .await?
                .into_iter()
                .filter(|invite| !invite.is_accepted())
                .collect()
        } else {
            Vec::new()
        };

        Ok(MemberListing {
            can_manage,
            members,
            invites,
            role,
        })
    }

    /// Email an accept link, then record the invite.
    /// Requires owner/admin, and a Pro subscription on the business owner.
    /// Nothing is stored when the email cannot be sent.
    #[instrument(skip(self))]
    pub async fn invite(
        &self,
        actor_uid: &str,
        business_id: Uuid,
        email: &str,
        role: Role,
    ) -> Result<MemberInvite, MemberError> {
        if !role.is_invitable() {
            return Err(MemberError::RoleNotInvitable(role));
        }

        let actor_role = resolve_role(self.store.as_ref(), actor_uid, business_id).await?;
        if !can_manage_members(actor_role) {
            return Err(MemberError::Forbidden);
        }

        let business = self
            .store
            .find_business(business_id)
            .await?
            .ok_or(MemberError::BusinessNotFound)?;

        if !has_active_pro(self.store.as_ref(), &business.owner_uid).await? {
            return Err(MemberError::ProRequired);
        }

        let token = Uuid::new_v4().to_string();
        let email = normalize_email(email);

        self.email
            .send_invite(&email, &business.name, role.as_str(), &self.accept_url(&token))
            .await?;

        let invite = self
            .store
            .insert_invite(NewMemberInvite {
                token,
                business_id,
                email,
                role: role.as_str().to_string(),
                invited_by: Some(actor_uid.to_string()),
            })
            .await?;

        AuditLogger::log(
            AuditAction::MemberInvited,
            actor_uid,
            "business",
            Some(business_id.to_string()),
            Some(format!("email={} role={}", invite.email, role)),
        );

        Ok(invite)
    }

    /// Redeem an invite for `uid`, whose verified email must be the invited one.
    /// Each token works once.
    #[instrument(skip(self, token))]
    pub async fn accept(
        &self,
        uid: &str,
        email: Option<&str>,
        token: &str,
    ) -> Result<Role, MemberError> {
        let invite = self
            .store
            .find_invite(token)
            .await?
            .ok_or(MemberError::InvalidToken)?;

        if invite.is_accepted() {
            info!("Invite for business {} already used", invite.business_id);
            return Err(MemberError::InvalidToken);
        }

        if email.map(normalize_email).as_deref() != Some(invite.email.as_str()) {
            warn!("Invite for business {} redeemed by another account", invite.business_id);
            return Err(MemberError::EmailMismatch);
        }

        let role = Role::from_string(&invite.role)
            .filter(Role::is_invitable)
            .ok_or(MemberError::InvalidToken)?;

        // Claim the token first so concurrent accepts cannot both succeed
        if !self.store.mark_invite_accepted(token, uid).await? {
            return Err(MemberError::InvalidToken);
        }

        self.store.upsert_member(invite.business_id, uid, role).await?;

        AuditLogger::log(
            AuditAction::InviteAccepted,
            uid,
            "business",
            Some(invite.business_id.to_string()),
            Some(format!("role={}", role)),
        );

        Ok(role)
    }

    #[instrument(skip(self))]
    pub async fn remove(
        &self,
        actor_uid: &str,
        business_id: Uuid,
        member_uid: &str,
    ) -> Result<(), MemberError> {
        let actor_role = resolve_role(self.store.as_ref(), actor_uid, business_id).await?;
        if !can_manage_members(actor_role) {
            return Err(MemberError::Forbidden);
        }

        let removed = self.store.remove_member(business_id, member_uid).await?;
        if !removed {
            warn!("No membership for {} in business {}", member_uid, business_id);
        }

        AuditLogger::log(
            AuditAction::MemberRemoved,
            actor_uid,
            "business",
            Some(business_id.to_string()),
            Some(format!("uid={}", member_uid)),
        );

        Ok(())
    }
}
