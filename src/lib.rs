//! MirrorMe — persisted state stores and a reflective coach.

pub mod app;
pub mod capabilities;
pub mod coach;
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod state;
pub mod store;
