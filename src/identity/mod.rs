//! Central identity and session management for cubby.
//! Keep the public surface thin and split implementation across sub-modules.

mod account;
mod session;
mod service;

pub use account::{valid_username, Account};
pub use session::{generate_token, Session};
pub use service::AuthService;
