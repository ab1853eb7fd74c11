pub mod db;
pub mod export;
pub mod insights;
pub mod models;
pub mod sample;
pub mod service;
