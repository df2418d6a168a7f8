pub mod state;
pub mod utils;

pub use state::{AppState, Backend};
