//! Spreadsheet-backed implementation of the engine's `EntryStore` seam,
//! plus an in-memory store for tests and local development.

pub mod adapter;
pub mod memory;
pub mod sheets;

pub use adapter::SheetStore;
pub use memory::InMemoryEntryStore;
pub use sheets::SheetsClient;
