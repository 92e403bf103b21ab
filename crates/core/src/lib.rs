pub mod config;
pub mod dialogs;
pub mod domain;
pub mod format;
pub mod insights;
pub mod outbound;
pub mod store;
