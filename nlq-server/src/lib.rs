//! `nlq-server` wires `nlq-rag` and `nlq-sources` into an HTTP API and an
//! interactive chat loop, configured from a JSON file and the environment.

pub mod bootstrap;
pub mod config;
pub mod http;
pub mod repl;

pub use bootstrap::build_service;
pub use config::AppConfig;
pub use http::{app_router, run_server};
pub use repl::run_chat;
