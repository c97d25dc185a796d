//! Core crate modules

pub mod config;
