pub mod config;
pub mod wait;
