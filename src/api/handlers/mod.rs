//! API handlers for the portfolio identity service.
//!
//! `auth` owns credentials, MFA, roles, and tokens; the sibling modules are
//! the authenticated surfaces built on top of it.

pub mod activity;
pub mod auth;
pub mod health;
pub mod me;
pub mod root;
pub mod users;
