use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::Result;
use crate::path::{normalize, split_fragment};
use crate::util::{decode_text, extract_xml_encoding};

/// Maps package hrefs to bytes.
///
/// A resolver carries a `base` directory used to resolve relative hrefs.
/// [`rebase`](ResourceResolver::rebase) produces a resolver over the same
/// backing store with a different base; it never copies or reopens the
/// store.
///
/// Absence is not an error: reading a missing entry returns `None`.
pub trait ResourceResolver: Clone {
    /// The absolute directory relative hrefs are resolved against.
    fn base(&self) -> &str;

    /// Read the raw bytes of `href`, or `None` if no such entry exists.
    fn read_bytes(&self, href: &str) -> Option<Vec<u8>>;

    /// Same backing store, new base.
    fn rebase(&self, base: &str) -> Self;

    /// Check whether two resolvers read from the same backing store.
    fn shares_store(&self, other: &Self) -> bool;

    /// Read `href` and decode it as text.
    fn read_text(&self, href: &str) -> Option<String> {
        let bytes = self.read_bytes(href)?;
        Some(decode_text(&bytes, extract_xml_encoding(&bytes)).into_owned())
    }

    /// Resolve `href` to an absolute package path using this resolver's base.
    fn resolve_href(&self, href: &str) -> String {
        normalize(self.base(), href)
    }
}

/// Turn an href into a store key: absolute path, no fragment, no leading `/`.
///
/// Returns `None` for hrefs that can never name a stored entry
/// (external URLs and bare fragments).
fn store_key<R: ResourceResolver>(resolver: &R, href: &str) -> Option<String> {
    let resolved = resolver.resolve_href(href);
    if !resolved.starts_with('/') {
        return None;
    }
    let (path, _) = split_fragment(&resolved);
    Some(path.trim_start_matches('/').to_string())
}

// --- Implementation: ZIP archive ---

type SharedArchive = Arc<ZipArchive<Cursor<Arc<[u8]>>>>;

/// Resolver backed by an in-memory ZIP archive.
///
/// Entries are keyed by their archive name, which is the absolute package
/// path without its leading `/`.
#[derive(Clone, Debug)]
pub struct ZipResolver {
    archive: SharedArchive,
    base: String,
}

impl ZipResolver {
    /// Open an archive held in memory. Only the central directory is read here.
    pub fn from_bytes(data: impl Into<Arc<[u8]>>) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(data.into()))?;
        Ok(Self {
            archive: Arc::new(archive),
            base: "/".to_string(),
        })
    }

    /// Read an `.epub` file from disk into memory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(data)
    }
}

impl ResourceResolver for ZipResolver {
    fn base(&self) -> &str {
        &self.base
    }

    fn read_bytes(&self, href: &str) -> Option<Vec<u8>> {
        let key = store_key(self, href)?;

        // Cloning shares the parsed central directory; only the cursor is copied.
        let mut archive = (*self.archive).clone();
        let mut file = match archive.by_name(&key) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return None,
            Err(e) => {
                log::warn!("Failed to open archive entry '{}': {}", key, e);
                return None;
            }
        };

        let mut data = Vec::with_capacity(file.size() as usize);
        if let Err(e) = file.read_to_end(&mut data) {
            log::warn!("Failed to read archive entry '{}': {}", key, e);
            return None;
        }
        Some(data)
    }

    fn rebase(&self, base: &str) -> Self {
        Self {
            archive: Arc::clone(&self.archive),
            base: normalize("/", base),
        }
    }

    fn shares_store(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.archive, &other.archive)
    }
}

// --- Implementation: Filesystem directory ---

/// Resolver backed by a directory holding an extracted EPUB.
#[derive(Clone, Debug)]
pub struct DirResolver {
    root: Arc<PathBuf>,
    base: String,
}

impl DirResolver {
    /// Use `root` as the package root. Fails if it is not a directory.
    pub fn new<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a directory", root.display()),
            )
            .into());
        }
        Ok(Self {
            root: Arc::new(root),
            base: "/".to_string(),
        })
    }

    /// The directory this resolver reads from.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ResourceResolver for DirResolver {
    fn base(&self) -> &str {
        &self.base
    }

    fn read_bytes(&self, href: &str) -> Option<Vec<u8>> {
        let key = store_key(self, href)?;
        let path = self.root.join(&key);
        match std::fs::read(&path) {
            Ok(data) => Some(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                log::warn!("Failed to read '{}': {}", path.display(), e);
                None
            }
        }
    }

    fn rebase(&self, base: &str) -> Self {
        Self {
            root: Arc::clone(&self.root),
            base: normalize("/", base),
        }
    }

    fn shares_store(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.root, &other.root)
    }
}
