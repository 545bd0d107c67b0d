//! Hiroba chat relay library.
//!
//! Clients join rooms over WebSocket, send text messages and receive the messages
//! of the other members plus a replay of recent history. Room state lives in a
//! single broadcast coordinator task.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

// wiring
pub mod app;
pub mod config;
