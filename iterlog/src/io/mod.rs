//! Filesystem side of the iteration log store.

pub mod cleanup;
pub mod config;
pub mod dirs;
pub mod init;
pub mod store;
