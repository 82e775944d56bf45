//! `storefront-auth`: the authenticated-customer boundary.
//!
//! Credential parsing, hashing, and token verification live outside this
//! workspace. This crate only carries the result of that verification.

pub mod principal;

pub use principal::CustomerPrincipal;
