//! Staging of a runnable installation in the placeholder root.
//!
//! - [`archive`] - stale-installation removal, extraction, runtime root lookup
//! - [`link`] - projection of the runtime root into the placeholder root
//! - [`flow`] - edited flow definition preparation and installation
//! - [`sweep`] - removal of everything staged, keeping the sentinel file

pub mod archive;
pub mod flow;
mod io;
pub mod link;
pub mod sweep;

pub use archive::{extract_archive, locate_runtime_root, remove_stale_installations};
pub use flow::{install_flow, prepare_installable_flow};
pub use link::link_runtime_entries;
pub use sweep::sweep_placeholder;
