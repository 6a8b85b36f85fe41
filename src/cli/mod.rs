//! Command-line surface over [`ListClient`](crate::list::ListClient)

pub mod app;
pub mod commands;

pub use app::{Cli, Commands};
pub use commands::run;
