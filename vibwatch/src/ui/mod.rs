//! UI module root: exposes drawing functions for individual panels.

pub mod chart;
pub mod header;
pub mod history;
pub mod status;
pub mod theme;
