//! HTTP and WebSocket surface of the document capture service.

pub mod capture;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod service;
pub mod state;
pub mod ws;
