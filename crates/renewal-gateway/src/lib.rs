//! HTTP host for the reminder service: shared state, router and handlers.
//! `main.rs` builds the services from config and serves [`app::build_router`].

pub mod app;
pub mod http;
