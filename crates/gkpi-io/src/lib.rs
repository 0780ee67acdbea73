//! # gkpi-io: Episode Directory I/O
//!
//! Reads recorded episodes from disk:
//!
//! - [`frame`] - Parquet/CSV tables through polars
//! - [`store`] - [`DirectoryEpisodeStore`], the on-disk [`gkpi_core::EpisodeStore`]
//! - [`metadata`] - `env.json` grid-sizing constants
//! - [`grid`] - grid topology file resolution and import

pub mod frame;
pub mod grid;
pub mod metadata;
pub mod store;

pub use grid::{import_grid, resolve_grid_file, GridImport};
pub use metadata::{load_metadata, METADATA_FILE};
pub use store::DirectoryEpisodeStore;
