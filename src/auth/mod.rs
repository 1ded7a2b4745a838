//! Password hashing, the session cookie and the routes for signing up, signing in and logging out.

mod cookie;
mod log_out;
mod middleware;
mod password;
mod sign_in;
mod sign_up;

pub use log_out::get_log_out;
pub use middleware::{AuthState, auth_guard, get_signed_out_status};
pub use password::PasswordHash;
pub use sign_in::post_sign_in;
pub use sign_up::post_sign_up;

#[cfg(test)]
pub(crate) use cookie::{COOKIE_SESSION_ID, set_session_cookie};
