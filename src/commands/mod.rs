mod config;
mod request;

pub use config::{config, is_sensitive, render_config};
pub use request::{RequestParams, parse_header, request, success_message};
