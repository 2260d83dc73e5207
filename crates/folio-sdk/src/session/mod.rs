//! Authentication session and profile state

mod store;
mod user;

pub use store::{profile_key, AuthState, SessionStore, PROFILE_QUERY};
pub use user::{username_from_email, ProfilePatch, UserView};
