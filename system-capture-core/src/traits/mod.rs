pub mod capture_backend;
pub mod capture_observer;
pub mod sample_handler;
