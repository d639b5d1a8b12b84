pub mod archive;
pub mod cleanup;
pub mod commands;
pub mod config;
pub mod contribution;
pub mod download;
pub mod http;
pub mod installer;
pub mod listing;
pub mod platform;
pub mod progress;
pub mod runtime;
pub mod scanner;
pub mod sweep;
