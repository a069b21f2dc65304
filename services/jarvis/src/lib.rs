pub mod config;
pub mod console;
pub mod desktop;
pub mod speech;
pub mod transcriber;
pub mod youtube;
