// handlers/protected/mod.rs - Actions that require an identity
//
// The dispatcher has already resolved the caller from the session cookie
// or a bearer token; every handler here receives `&AuthUser` and scopes
// its work to `user.user_id`.

pub mod auth;  // logout, checkAuth, account lifecycle
pub mod data;  // mapped-table reads and saves
pub mod token; // API tokens for machine clients

pub use auth::*;
pub use data::*;
pub use token::*;
