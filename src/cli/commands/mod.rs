pub mod call;
pub mod invite;
pub mod setup;
