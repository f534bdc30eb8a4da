pub mod app_setting;
pub mod auth;
pub mod business;
pub mod email_log;
pub mod member;
pub mod review_request;
pub mod short_link;
pub mod subscription;
pub mod user;
pub mod webhook_event;

// Re-export common types
pub use app_setting::{AppSetting, FEATURE_FLAGS_KEY};
pub use auth::*;
pub use business::{make_google_review_link, Business, BusinessUpsert, UpsertBusinessRequest};
pub use email_log::{EmailLogEntry, NewEmailLogEntry};
pub use member::*;
pub use review_request::{NewReviewRequest, ReviewRequest, SendReviewRequest};
pub use short_link::*;
pub use subscription::*;
pub use user::*;
pub use webhook_event::{NewWebhookEvent, WebhookEvent};
