pub mod auth;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod flash;
pub mod inference;
pub mod routes;
pub mod storage;
pub mod views;
