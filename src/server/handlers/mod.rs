//! Request handlers for the HTTP and WebSocket endpoints.

pub mod health;
pub mod mcp;
