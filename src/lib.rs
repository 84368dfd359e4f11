//! Credential-and-token authority: password verification with transparent
//! legacy-hash upgrade, short-lived signed access tokens, and a rotating
//! chain of refresh tokens with reuse detection and cascading family
//! revocation.
//!
//! Transport, registration, and notification concerns live outside this
//! crate; it talks to the rest of the system through the
//! [`store::RefreshTokenStore`], [`users::UserDirectory`], and
//! [`session::SessionRegistrar`] collaborator traits. In-memory reference
//! implementations of all three ship alongside the traits.

pub mod config;
pub mod error;
pub mod jwt;
pub mod memory;
pub mod passwords;
pub mod rotation;
pub mod service;
pub mod session;
pub mod store;
pub mod users;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use jwt::JwtService;
pub use memory::InMemoryRefreshTokenStore;
pub use passwords::PasswordService;
pub use rotation::RotationEngine;
pub use service::AuthService;
pub use store::{RefreshTokenRecord, RefreshTokenStore};
