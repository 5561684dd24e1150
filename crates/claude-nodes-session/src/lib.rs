//! Output-folder sessions and the nodes that produce or consume them.
//!
//! Provides:
//! - `OutputFolders` - Allocate and resolve session folders
//! - `ExecuteNode` - Run one prompt through the CLI inside a fresh folder
//! - `ScraperNode` - Browser-driven scraping into a fresh folder
//! - `ReaderNode` / `ContextNode` - Re-open a folder for a later session

#[macro_use]
mod macros;

pub mod context;
pub mod execute;
pub mod folder;
pub mod metadata;
pub mod reader;
pub mod scraper;

#[cfg(test)]
mod testing;

pub use context::{ContextMode, ContextNode, ContextOutput, ContextRequest};
pub use execute::{CommandSource, ExecuteError, ExecuteNode, ExecuteOutput, ExecuteRequest};
pub use folder::{FolderError, OutputFolders, SessionFolder};
pub use reader::{FileInfo, ReadMode, ReadOutput, ReadRequest, ReaderNode};
pub use scraper::{
    ScrapeError, ScrapeMode, ScrapeOutput, ScrapeRequest, ScrapeSession, ScraperNode, SortBy,
    SourceType, TimeFilter,
};
