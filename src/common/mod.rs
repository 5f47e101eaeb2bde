// Common utilities and shared types used across the application

pub mod address;
pub mod constants;
pub mod dates;
pub mod error;
pub mod text;
pub mod types;
