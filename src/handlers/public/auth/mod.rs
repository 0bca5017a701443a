// handlers/public/auth/mod.rs - Session acquisition

pub mod login;    // login - verify credentials, start a session
pub mod register; // register - invitation-gated account creation

pub use login::login;
pub use register::register;
