pub mod app;
pub mod auth;
pub mod cases;
pub mod cli;
pub mod config;
pub mod data;
pub mod logging;
pub mod reconcile;
pub mod services;
pub mod state;
pub mod status;
pub mod sync;
pub mod upstream;
pub mod utils;
pub mod web;
