mod cli;
mod config;
mod entry;
mod handlers;
mod notifications;
mod state;
mod text;

pub use entry::run;
