pub mod clash;
pub mod config;
pub mod forms;
pub mod service;
pub mod store;
pub mod watcher;
pub mod web;
