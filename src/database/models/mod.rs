pub mod api_token;
pub mod invitation;
pub mod login_attempt;
pub mod profile;
pub mod user;

pub use api_token::ApiToken;
pub use invitation::Invitation;
pub use login_attempt::LoginAttempt;
pub use user::User;
