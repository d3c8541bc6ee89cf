//! REST API server: start and cancel scrape runs, browse run history and
//! collected offers.

pub mod auth;
pub mod dto;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;
