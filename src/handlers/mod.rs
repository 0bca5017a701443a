// handlers/mod.rs - Action handlers behind the /api dispatcher
//
// One endpoint, many actions. The dispatcher parses the request, resolves
// the caller and routes by action name into three tiers:
//
// Public    (no identity)      ping, login, register
// Protected (session or token) data actions, account, tokens
// Elevated  (identity + config flag) setup

pub mod dispatch;
pub mod elevated;
pub mod health;
pub mod protected;
pub mod public;

pub use dispatch::{api_get, api_post, dispatch, Action, ActionContext, Payload};
pub use health::health;
