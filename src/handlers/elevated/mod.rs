// handlers/elevated/mod.rs - Administrative actions
//
// Require an identity AND an explicit opt-in in configuration
// (`SECURITY_SETUP_ENABLED`). Production presets leave them disabled.

pub mod setup;

pub use setup::setup;
