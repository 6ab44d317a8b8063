//! Session credentials: paired short-lived access tokens and one-time-use
//! refresh tokens, with rotation, reuse detection, family revocation and a
//! per-user generation counter for "log out everywhere".

pub mod auth;
pub mod cache;
pub mod config;
pub mod dto;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod password;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;
