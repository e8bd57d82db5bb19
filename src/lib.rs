//! Repair advisor chat: streams replies from a generative model and extracts
//! structured service proposals from them as they arrive.

pub mod chat;
pub mod cli;
pub mod config;
pub mod extract;
pub mod llm;
pub mod logging;
pub mod ui;
pub mod usage;
