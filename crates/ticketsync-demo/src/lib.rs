pub mod cli;
pub mod models;
pub mod server;
pub mod state;
pub mod traffic;
pub mod watcher;

pub use cli::*;
pub use models::*;
pub use server::*;
pub use state::*;
