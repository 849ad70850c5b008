mod change;
mod commit;
mod config;
mod database;
mod entities;
mod graph;
mod history;
mod mutation;
mod schema;
mod session;
mod submit;


pub use change::ChangeState;
pub use config::Config;
pub use database::Database;
pub use graph::{Context, Graph};
pub use history::HistoryEntry;
pub use session::Session;
