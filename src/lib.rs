pub mod analyzers;
pub mod cli;
pub mod collectors;
pub mod config;
pub mod models;
pub mod outputs;
