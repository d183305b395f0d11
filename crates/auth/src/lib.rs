//! `courseware-auth`: identity and authentication boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod claims;
pub mod jwt;
pub mod password;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod user;

pub use claims::{JwtClaims, TokenType, TokenValidationError, validate_claims};
pub use jwt::{Hs256Jwt, JwtValidator, TokenError, TokenPair};
pub use password::PasswordError;
pub use permissions::{Capability, INSTRUCTOR_CAPABILITIES, capabilities_for};
pub use principal::Actor;
pub use roles::Role;
pub use user::{RegisterUser, RegistrationError, User, register};
