//! Identity: provider client, typed session and its on-disk store

mod provider;
mod session;
mod store;

pub use provider::{AuthError, GoTrueProvider, IdentityProvider, SignUpOutcome};
pub use session::{Role, Session, UserProfile};
pub use store::{AuthEvent, SessionStore};
