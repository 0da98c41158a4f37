//! Resource resolution over an EPUB's backing store.

mod resolver;

pub use resolver::{DirResolver, ResourceResolver, ZipResolver};
