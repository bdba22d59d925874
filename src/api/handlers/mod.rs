pub mod audit;
pub mod auth;
pub mod health;
pub mod login;
pub mod password_change;
pub mod session;

use regex::Regex;

/// Lightweight email sanity check run before any lookup.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}
