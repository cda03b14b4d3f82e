pub mod health;
pub mod trace_api;
