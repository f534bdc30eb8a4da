// Audit logging for membership, billing and admin actions
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub enum AuditAction {
    SessionCreated,
    BusinessUpserted,
    MemberInvited,
    InviteAccepted,
    MemberRemoved,
    ShortLinkCreated,
    ReviewRequestSent,
    SubscriptionSynced,
    AdminFeaturesUpdated,
    AdminTestEmailSent,
    MigrationsRun,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub action: AuditAction,
    /// Acting uid, or "admin"/"stripe" for token-authenticated callers
    pub actor: String,
    pub resource_id: Option<String>,
    pub resource_type: String,
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}

pub struct AuditLogger;

impl AuditLogger {
    pub fn log(
        action: AuditAction,
        actor: &str,
        resource_type: &str,
        resource_id: Option<String>,
        details: Option<String>,
    ) {
        let audit_log = AuditLog {
            id: Uuid::new_v4(),
            action,
            actor: actor.to_string(),
            resource_id,
            resource_type: resource_type.to_string(),
            details,
            timestamp: Utc::now(),
        };

        let json_log = serde_json::to_string(&audit_log).unwrap_or_else(|e| {
            warn!("Failed to serialize audit log: {}", e);
            format!("{:?}", audit_log)
        });

        info!(target: "audit", "{}", json_log);
    }
}
