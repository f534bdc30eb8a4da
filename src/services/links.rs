// Channel short links: creation, listing and redirect resolution

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::db::{Store, StoreError};
use crate::models::{Channel, ShortLink, ShortLinkResponse};
use crate::services::roles::{can_manage_members, resolve_role};
use crate::utils::audit_logger::{AuditAction, AuditLogger};
use crate::utils::base62::{is_valid_slug, random_slug};

const MAX_SLUG_ATTEMPTS: u32 = 5;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Forbidden")]
    Forbidden,

    #[error("Link not found")]
    NotFound,

    #[error("Business has no review link")]
    NoReviewLink,

    #[error("Failed to generate a unique slug after {0} attempts")]
    SlugExhausted(u32),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct LinkService {
    store: Arc<dyn Store>,
    app_url: String,
}

impl LinkService {
    pub fn new(store: Arc<dyn Store>, app_url: String) -> Self {
        Self { store, app_url }
    }

    /// Create a short link for `channel`; owner or admin only
    #[instrument(skip(self))]
    pub async fn create(
        &self,
        actor_uid: &str,
        business_id: Uuid,
        channel: Channel,
    ) -> Result<ShortLinkResponse, LinkError> {
        let role = resolve_role(self.store.as_ref(), actor_uid, business_id).await?;
        if !can_manage_members(role) {
            return Err(LinkError::Forbidden);
        }

        let mut attempts = 0;
        let link = loop {
            attempts += 1;
            let candidate = ShortLink {
                slug: random_slug(),
                business_id,
                channel: channel.as_str().to_string(),
                created_at: Utc::now(),
            };

            match self.store.insert_short_link(candidate).await {
                Ok(link) => break link,
                Err(StoreError::Conflict(slug)) if attempts < MAX_SLUG_ATTEMPTS => {
                    warn!("Short link slug collision: {} (attempt: {})", slug, attempts);
                },
                Err(StoreError::Conflict(_)) => return Err(LinkError::SlugExhausted(attempts)),
                Err(e) => return Err(e.into()),
            }
        };

        info!("Created short link {} for business {}", link.slug, business_id);
        AuditLogger::log(
            AuditAction::ShortLinkCreated,
            actor_uid,
            "short_link",
            Some(link.slug.clone()),
            Some(format!("business={} channel={}", business_id, channel.as_str())),
        );

        Ok(ShortLinkResponse::from_link(&link, &self.app_url))
    }

    /// Links of a business, visible to any role
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        uid: &str,
        business_id: Uuid,
    ) -> Result<Vec<ShortLinkResponse>, LinkError> {
        if resolve_role(self.store.as_ref(), uid, business_id).await?.is_none() {
            return Err(LinkError::Forbidden);
        }

        let links = self
            .store
            .list_short_links_for_businesses(&[business_id])
            .await?;
        Ok(links
            .iter()
            .map(|link| ShortLinkResponse::from_link(link, &self.app_url))
            .collect())
    }

    /// Record a click on `slug` and return the review link to redirect to
    #[instrument(skip(self))]
    pub async fn resolve_redirect(&self, slug: &str) -> Result<String, LinkError> {
        if !is_valid_slug(slug) {
            return Err(LinkError::NotFound);
        }

        let link = self
            .store
            .find_short_link(slug)
            .await?
            .ok_or(LinkError::NotFound)?;

        let target = self
            .store
            .find_business(link.business_id)
            .await?
            .and_then(|business| business.review_link)
            .ok_or(LinkError::NoReviewLink)?;

        if let Err(e) = self.store.record_click(slug, Utc::now()).await {
            // A lost click must not break the redirect
            warn!("Failed to record click for {}: {}", slug, e);
        } else {
            debug!("Recorded click for {}", slug);
        }

        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::UpsertBusinessRequest;

    async fn setup() -> (LinkService, Arc<MemoryStore>, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let business = store
            .upsert_business(
                UpsertBusinessRequest {
                    name: "Joe's Pizza".to_string(),
                    google_place_id: Some("ChIJ123".to_string()),
                    google_maps_place_uri: None,
                    google_maps_write_review_uri: None,
                    review_link: None,
                    google_rating: None,
                }
                .into_upsert("owner-1"),
            )
            .await
            .unwrap();
        let service = LinkService::new(store.clone(), "https://app.example.com".to_string());
        (service, store, business.id)
    }

    #[tokio::test]
    async fn test_create_and_redirect_records_click() {
        let (service, store, business_id) = setup().await;

        let created = service
            .create("owner-1", business_id, Channel::Whatsapp)
            .await
            .unwrap();
        assert_eq!(created.channel, Channel::Whatsapp);
        assert_eq!(created.url, format!("https://app.example.com/r/{}", created.slug));

        let target = service.resolve_redirect(&created.slug).await.unwrap();
        assert_eq!(
            target,
            "https://search.google.com/local/writereview?placeid=ChIJ123"
        );

        let clicks = store
            .clicks_since(None, Utc::now() - chrono::Duration::minutes(1), 100)
            .await
            .unwrap();
        assert_eq!(clicks.len(), 1);
        assert_eq!(clicks[0].slug, created.slug);
    }

    #[tokio::test]
    async fn test_viewer_cannot_create_but_can_list() {
        let (service, store, business_id) = setup().await;
        store
            .upsert_member(business_id, "viewer-1", crate::models::Role::Viewer)
            .await
            .unwrap();

        let result = service.create("viewer-1", business_id, Channel::Qr).await;
        assert!(matches!(result, Err(LinkError::Forbidden)));

        service.create("owner-1", business_id, Channel::Qr).await.unwrap();
        let links = service.list("viewer-1", business_id).await.unwrap();
        assert_eq!(links.len(), 1);

        let stranger = service.list("stranger", business_id).await;
        assert!(matches!(stranger, Err(LinkError::Forbidden)));
    }

    #[tokio::test]
    async fn test_unknown_slug_is_not_found() {
        let (service, _store, _) = setup().await;
        assert!(matches!(
            service.resolve_redirect("nope1234").await,
            Err(LinkError::NotFound)
        ));
        assert!(matches!(
            service.resolve_redirect("../etc").await,
            Err(LinkError::NotFound)
        ));
    }
}
