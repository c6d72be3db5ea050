pub mod bootstrap;
pub mod commands;
pub mod config;
pub mod context;
pub mod logging;
pub mod shell;
