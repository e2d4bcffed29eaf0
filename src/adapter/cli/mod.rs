pub mod args;
pub mod commands;
pub mod events;

pub use args::Cli;
pub use commands::run;
