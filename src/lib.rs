#![allow(clippy::multiple_crate_versions)]

pub mod cache;
pub mod config;
pub mod errors;
pub mod heavy_queue;
pub mod models;
pub mod render;
pub mod services;
pub mod utils;
pub mod web;
