// Services module for the Reviews & Marketing backend
// Business logic layer between handlers and the store/providers

pub mod analytics;
pub mod billing;
pub mod email;
pub mod entitlements;
pub mod identity;
pub mod links;
pub mod members;
pub mod places;
pub mod qr;
pub mod roles;
pub mod session;
pub mod webhook;

// Re-export commonly used services
pub use billing::{BillingError, BillingProvider, StripeClient, SubscriberStats};
pub use email::{EmailError, EmailService, EmailTransport, PostmarkSender};
pub use identity::{FirebaseIdentity, IdentityError, IdentityProvider};
pub use links::{LinkError, LinkService};
pub use members::{MemberError, MemberService};
pub use places::{GoogleProvider, PlacesError, PlacesProvider};
pub use qr::{QrError, QrFormat};
pub use session::{SessionError, SessionService};
pub use webhook::{WebhookError, WebhookOutcome, WebhookService};
