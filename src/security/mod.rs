//! Security utilities

pub mod headers;
pub mod production_warnings;
pub mod timing;

pub use headers::add_api_security_headers;
pub use production_warnings::{check_production_readiness, report_production_warnings, ProductionWarning};
pub use timing::{constant_time_eq, constant_time_eq_bytes, AuthTimer};
