//! Terminal dashboard (ratatui + crossterm)
//!
//! `app` holds interaction state and derives frames; `layout` and
//! `renderer` only draw what a frame contains.

pub mod app;
pub mod layout;
pub mod renderer;
pub mod terminal;

pub use {
    app::{Action, DashboardApp, DashboardFrame},
    terminal::run_ui,
};
