//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the crate:
//! - Math types and the cached transform
//! - Frame timing
//! - Logging utilities

pub mod math;
pub mod time;
pub mod logging;
