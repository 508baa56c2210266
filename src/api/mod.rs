// Renderer-facing HTTP + WebSocket API.

pub mod rest;
pub mod ws;
