//! Authentication module: session persistence, validation, and gating.
//!
//! This module provides the full invalid-session funnel the console is
//! built around: the file-backed session store, the identity-authority
//! client, the read-only token validator, the route guard for protected
//! workflows, and the request gateway that re-validates before every
//! outbound API call.

pub mod gateway;
pub mod guard;
pub mod identity;
pub mod navigator;
pub mod store;
pub mod validator;

// Re-exports for convenience
pub use gateway::RequestGateway;
pub use guard::{GuardState, SessionGuard};
pub use identity::{AuthoritySession, IdentityProvider, UserPoolProvider};
pub use navigator::{ConsoleNavigator, Navigator};
pub use store::SessionStore;
pub use validator::TokenValidator;
