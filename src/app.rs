// Application state shared across handlers
use std::sync::Arc;

use crate::{
    app_config::AppConfig,
    db::Store,
    services::{
        BillingProvider, EmailError, EmailService, EmailTransport, IdentityProvider, LinkService,
        MemberService, PlacesProvider, SessionService, WebhookService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub identity: Arc<dyn IdentityProvider>,
    pub sessions: Arc<SessionService>,
    pub billing: Arc<dyn BillingProvider>,
    pub email: Arc<EmailService>,
    pub places: Arc<dyn PlacesProvider>,
    pub members: Arc<MemberService>,
    pub links: Arc<LinkService>,
    pub webhooks: Arc<WebhookService>,
}

impl AppState {
    /// Wire the derived services around the given providers
    pub fn new(
        config: AppConfig,
        store: Arc<dyn Store>,
        identity: Arc<dyn IdentityProvider>,
        billing: Arc<dyn BillingProvider>,
        transport: Arc<dyn EmailTransport>,
        places: Arc<dyn PlacesProvider>,
    ) -> Result<Self, EmailError> {
        let app_url = config.server.app_url.clone();

        let sessions = Arc::new(SessionService::new(&config.session));
        let email = Arc::new(EmailService::new(
            config.email.clone(),
            app_url.clone(),
            transport,
            store.clone(),
        )?);
        let members = Arc::new(MemberService::new(store.clone(), email.clone(), app_url.clone()));
        let links = Arc::new(LinkService::new(store.clone(), app_url));
        let webhooks = Arc::new(WebhookService::new(
            store.clone(),
            billing.clone(),
            config.stripe.webhook_secret.clone(),
            config.stripe.webhook_tolerance_seconds,
        ));

        Ok(Self {
            config: Arc::new(config),
            store,
            identity,
            sessions,
            billing,
            email,
            places,
            members,
            links,
            webhooks,
        })
    }
}
