pub mod btle;
pub mod connection;
pub mod constants;
pub mod link;
pub mod mock;
pub mod scheduler;
pub mod state;
pub mod types;
