//! RUTA dashboard core
//!
//! Keeps a live, deduplicated collection of ERC-20 transfers fed by an
//! indexer (snapshot + event stream) and derives filtered views and chart
//! aggregates from it for the terminal dashboard.


pub mod aggregation;
pub mod bridge;
pub mod config;
pub mod error;
pub mod model;
pub mod projection;
pub mod replay;
pub mod store;
pub mod ui;

pub use {
    bridge::{Bridge, ChannelBridge, HttpBridge},
    config::Config,
    model::Transfer,
    store::{StoreHandle, StoreRuntime, TransferStore},
};
