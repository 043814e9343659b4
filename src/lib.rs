pub mod app;
pub mod capture;
pub mod config;
pub mod engine;
pub mod errors;
pub mod gate;
pub mod handlers;
pub mod live;
pub mod report;
pub mod roster;
pub mod session;
pub mod templates_structs;
