pub mod auth_service;
pub mod data_service;
pub mod token_service;

pub use auth_service::{AuthError, AuthService, PublicUser, RegisterRequest};
pub use data_service::{plan_save, DataError, DataService, SaveMode, SaveOperation, SaveOutcome, SavePlan};
pub use token_service::{IssuedToken, TokenService};
