//! Field-service management platform integration.
//!
//! All traffic to the platform flows through [`client::FsmClient`], which
//! attaches OAuth bearer tokens from [`auth::TokenManager`] plus the static
//! application key header on every request.

pub mod auth;
pub mod client;
pub mod types;

pub use auth::TokenManager;
pub use client::{AccessTokenProvider, FsmClient};
