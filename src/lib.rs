//! Library crate for soiree-poll, exposing modules for the binaries and tests.

pub mod config;
pub mod dao;
pub mod discord;
mod dto;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;

#[cfg(test)]
mod test_support;
