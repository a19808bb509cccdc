pub mod attributes;
pub mod config;
pub mod db;
pub mod documents;
pub mod error;
pub mod expenses;
pub mod models;
pub mod routes;
pub mod routing;
pub mod schedule;
pub mod scheduler;
pub mod schema;
pub mod spend;
pub mod state;
pub mod tasks;
