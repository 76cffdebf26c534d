pub mod health_result;
pub mod process_info;
pub mod process_status;
pub mod sensitive_string;

pub use health_result::HealthResult;
pub use process_info::ProcessInfo;
pub use process_status::ProcessStatus;
pub use sensitive_string::{SensitiveString, REDACTED};
