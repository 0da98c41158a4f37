//! # epubmark
//!
//! Read EPUB packages and turn their chapters into Markdown.
//!
//! ## Features
//!
//! - Open EPUB 2/3 packages from a ZIP archive or an extracted directory
//! - Manifest, spine and chapter access with package-absolute paths
//! - Table of contents from the EPUB3 nav document or the EPUB2 NCX
//! - Dublin Core metadata with `refines` refinements, exportable as JSON
//! - Chapter to Markdown conversion that keeps the ids the TOC links to
//!
//! ## Quick Start
//!
//! ```no_run
//! use epubmark::EPub;
//!
//! let book = EPub::open("input.epub")?;
//! println!("{} by {}", book.metadata().get("title"), book.metadata().get("creator"));
//!
//! for (_, item) in book.spine_with_manifest(true) {
//!     if let Some(markdown) = book.chapter_markdown(&item.path) {
//!         println!("{markdown}");
//!     }
//! }
//! # Ok::<(), epubmark::Error>(())
//! ```
//!
//! ## Converting markup directly
//!
//! ```
//! use epubmark::{ConvertOptions, html_to_markdown};
//!
//! let options = ConvertOptions::default().with_keep_ids(["intro"]);
//! let markdown = html_to_markdown(r#"<h1 id="intro">Intro</h1><p>Hello</p>"#, &options);
//! assert_eq!(markdown, "<span id=\"intro\"></span># Intro\n\nHello");
//! ```

pub mod document;
pub mod dom;
pub mod epub;
pub mod error;
pub mod io;
pub mod markdown;
pub mod path;
pub(crate) mod util;

pub use document::{Dialect, ParsedDocument};
pub use epub::{EPub, FlatNavItem, ManifestItem, Metadata, NavItem, SpineItem, TableOfContents};
pub use error::{Error, Result};
pub use io::{DirResolver, ResourceResolver, ZipResolver};
pub use markdown::{ConvertOptions, html_to_markdown};
