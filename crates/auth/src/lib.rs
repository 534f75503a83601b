//! `painterp-auth`: bearer token validation boundary.
//!
//! Tokens are issued elsewhere; this crate only decodes and validates them.
//! Decoupled from HTTP and storage.

pub mod claims;
pub mod jwt;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{AuthError, Hs256JwtValidator, JwtValidator};
