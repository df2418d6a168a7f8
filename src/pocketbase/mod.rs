//! PocketBase REST client, auth store and collection definitions.

pub mod auth_store;
pub mod client;
pub mod error;
pub mod schema;

pub use auth_store::{AuthChange, AuthRecord, AuthStore};
pub use client::{ListOptions, PocketBaseClient, USERS_COLLECTION};
pub use error::PocketBaseError;
