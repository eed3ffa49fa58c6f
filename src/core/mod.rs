pub mod config;
pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod llm;
pub mod store;
pub mod terminal;
pub mod vault;
