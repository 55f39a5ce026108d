//! Library exports for the gift page service
//!
//! This module exposes internal components for the binary, the tests and
//! potential library usage.

pub mod blob;
pub mod config;
pub mod database;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod model;
pub mod rewrite;
pub mod route;
pub mod service;
