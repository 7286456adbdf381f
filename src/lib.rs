//! XKeen UI - Web control panel for XKeen proxy routers.

pub mod config;
pub mod engine;
pub mod live;
pub mod logs;
pub mod server;
pub mod settings;
