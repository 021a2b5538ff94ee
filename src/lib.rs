// lib.rs
//
// Query-driven map dashboard: filters, traffic layers, ad-hoc query plots.

pub mod backend;
pub mod colorscale;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod grid;
pub mod logging;
pub mod map_layers;
pub mod overlay;
pub mod plotter;
pub mod queries;
pub mod render;
pub mod stations;
pub mod tabular;

pub use error::{DashError, Result};
