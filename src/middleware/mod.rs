pub mod auth;
pub mod client_ip;
pub mod response;

pub use auth::{AuthUser, MaybeAuthUser};
pub use client_ip::ClientIp;
pub use response::{ApiResponse, ApiResult};
