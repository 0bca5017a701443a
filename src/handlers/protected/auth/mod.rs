pub mod account;
pub mod session;

pub use account::{change_password, delete_account};
pub use session::{check_auth, logout, mark_welcome_seen};
