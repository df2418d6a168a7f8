//! North Lead: a GC outreach pipeline served over a PocketBase backend.

pub mod core;
pub mod crm;
pub mod main_module;
pub mod pocketbase;

pub use crate::core::config::AppConfig;
pub use crate::core::shared::state::AppState;
