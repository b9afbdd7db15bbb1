pub mod analytics;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;
pub mod store;
pub mod time_utils;
pub mod web;
