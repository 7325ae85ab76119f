pub mod config;
pub mod content;
pub mod error;
pub mod filter;
pub mod recording;
pub mod sample;
pub mod state;
