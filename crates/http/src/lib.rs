//! OtherLink HTTP layer
//!
//! [`ApiClient`] wraps reqwest with bearer injection, JSON normalization and
//! a per-call deadline. [`envelope`] recognizes the layouts the auth
//! endpoints answer with, and [`services`] exposes the REST endpoints as
//! typed methods.

pub mod client;
pub mod envelope;
pub mod services;

pub use client::{ApiClient, ApiClientBuilder, error::ClientError};
pub use envelope::{Envelope, TokenGrant};
pub use services::{LinkService, OtherlinkService, UserService};
pub use reqwest::{Method, StatusCode};
