//! Todo app — an ordered todo store with filtered views, backup reminders,
//! a REST/WebSocket server and a terminal client.

pub mod cli;
pub mod config;
pub mod error;
pub mod storage;
pub mod todos;
