// Utility modules for the Reviews & Marketing backend

pub mod api_error;
pub mod audit_logger;
pub mod base62;
pub mod extract;
pub mod stripe_signature;
pub mod validation;

pub use api_error::{ApiError, ApiResult};
pub use audit_logger::{AuditAction, AuditLogger};
pub use extract::{lenient_number, ApiJson, ApiQuery};
pub use validation::{clamp_param, trim_and_validate_field, trim_optional_field};
