// handlers/public/mod.rs - Public actions (no identity required)
//
// Input is untrusted and there is no user context. Login is throttled per
// client address by the auth service.

pub mod auth;
pub mod ping;

pub use auth::{login, register};
pub use ping::ping;
