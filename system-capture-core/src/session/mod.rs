pub mod capturer;
pub mod engine;
pub mod sink;
