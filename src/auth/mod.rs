pub mod clock;
pub mod password;
pub mod session;
pub mod throttle;
pub mod token;

pub use clock::{Clock, ClockExt, DefaultClock, ManualClock};
pub use password::{hash_password, verify_password, PasswordError};
pub use session::{
    current_user, end_session, persist_user, session_layer, start_session, SessionUser, USER_KEY,
};
pub use throttle::LoginThrottle;
pub use token::{expiry_from, fingerprint, generate_token, looks_like_token};
