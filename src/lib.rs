pub mod commands;
pub mod config;
pub mod http;
pub mod logger;
pub mod mode;
pub mod response;
pub mod retry;
pub mod runtime;
