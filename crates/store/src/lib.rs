//! Outline asset storage implementations for Glyphsmith.

pub mod in_memory;
pub mod file_backend;

pub use in_memory::InMemoryOutlineStore;
pub use file_backend::FileOutlineStore;
