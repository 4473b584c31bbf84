//! TUI Widget components
//!
//! Modular widgets for the dashboard display.

pub mod alerts;
pub mod detail;
pub mod footer;
pub mod header;
pub mod sources;

pub use alerts::render_alerts;
pub use detail::render_detail;
pub use footer::render_footer;
pub use header::render_header;
pub use sources::render_sources;
