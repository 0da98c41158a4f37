//! The EPUB package: container, package document, manifest and spine.
//!
//! [`EPub`] is generic over its [`ResourceResolver`], so the same code
//! reads a ZIP archive held in memory and a directory on disk.
//!
//! ```no_run
//! use epubmark::EPub;
//!
//! let book = EPub::open("book.epub")?;
//! println!("{}", book.metadata().get("title"));
//! for item in book.toc().flat_nav_items() {
//!     println!("{}{}", "  ".repeat(item.level), item.label);
//! }
//! let markdown = book.chapter_markdown("text/ch01.xhtml");
//! # Ok::<(), epubmark::Error>(())
//! ```

mod metadata;
mod package;
mod toc;

pub use metadata::{DcProperty, MetaProperty, Metadata};
pub use package::{CHAPTER_MEDIA_TYPES, ManifestItem, NCX_MEDIA_TYPE, OPF_MEDIA_TYPE, SpineItem};
pub use toc::{FlatNavItem, NavItem, TableOfContents, TocSource, ncx_to_html};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use sha2::{Digest, Sha256};

use crate::document::{Dialect, ParsedDocument};
use crate::error::{Error, Result};
use crate::io::{DirResolver, ResourceResolver, ZipResolver};
use crate::markdown::ConvertOptions;
use crate::path::{decode, normalize, split_fragment};

/// Location of the OCF container document.
pub const CONTAINER_PATH: &str = "/META-INF/container.xml";

/// An opened EPUB package.
///
/// Manifest indices, metadata and the table of contents are computed on
/// first use and cached for the lifetime of the value.
#[derive(Debug)]
pub struct EPub<R: ResourceResolver> {
    resolver: R,
    container: ParsedDocument<R>,
    opf: ParsedDocument<R>,
    manifest_by_path: OnceLock<HashMap<String, ManifestItem>>,
    manifest_by_id: OnceLock<HashMap<String, ManifestItem>>,
    metadata: OnceLock<Metadata>,
    toc: OnceLock<TableOfContents>,
}

impl EPub<ZipResolver> {
    /// Open an EPUB archive held in memory.
    pub fn from_bytes(data: impl Into<Arc<[u8]>>) -> Result<Self> {
        Self::init(ZipResolver::from_bytes(data)?)
    }

    /// Read an `.epub` file into memory and open it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::init(ZipResolver::open(path)?)
    }
}

impl EPub<DirResolver> {
    /// Open a package extracted into a directory.
    pub fn open_dir<P: Into<PathBuf>>(root: P) -> Result<Self> {
        Self::init(DirResolver::new(root)?)
    }
}

impl<R: ResourceResolver> EPub<R> {
    /// Read `container.xml`, then the package document it points to.
    pub fn init(resolver: R) -> Result<Self> {
        let container = ParsedDocument::load(CONTAINER_PATH, &resolver, Some(Dialect::Xml))
            .ok_or(Error::MissingContainer)?;

        let selector = format!(r#"rootfile[media-type="{}"]"#, OPF_MEDIA_TYPE);
        let rootfile = container
            .query_first(&selector)
            .ok_or(Error::MissingRootfile)?;
        let tree = container.tree();
        let full_path = tree
            .get_plain_attr(rootfile, "full-path")
            .filter(|p| !p.is_empty())
            .ok_or(Error::MissingFullPath)?;
        let opf_path = normalize("/", full_path);

        let dialect = tree
            .get_plain_attr(rootfile, "media-type")
            .and_then(Dialect::from_media_type)
            .unwrap_or(Dialect::Xml);
        let opf = ParsedDocument::load(&opf_path, &resolver, Some(dialect))
            .ok_or_else(|| Error::MissingPackageDocument(opf_path.clone()))?;
        log::debug!("Opened package document {}", opf_path);

        Ok(Self {
            resolver,
            container,
            opf,
            manifest_by_path: OnceLock::new(),
            manifest_by_id: OnceLock::new(),
            metadata: OnceLock::new(),
            toc: OnceLock::new(),
        })
    }

    /// Resolver rooted at the package root.
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn container(&self) -> &ParsedDocument<R> {
        &self.container
    }

    /// The package (OPF) document.
    pub fn opf(&self) -> &ParsedDocument<R> {
        &self.opf
    }

    /// The `version` attribute of `<package>`.
    pub fn version(&self) -> Option<&str> {
        let tree = self.opf.tree();
        let package = tree
            .element_children(tree.document())
            .find(|&id| tree.is_tag(id, "package"))?;
        tree.get_plain_attr(package, "version")
    }

    /// Every `<manifest><item>`, in document order.
    ///
    /// Hrefs are percent-decoded and resolved against the OPF directory.
    pub fn manifest(&self) -> Vec<ManifestItem> {
        let tree = self.opf.tree();
        self.opf
            .query("manifest > item")
            .into_iter()
            .filter_map(|item| {
                let href = tree.get_plain_attr(item, "href")?;
                let resolved = self.opf.resolve_href(&decode(href));
                let (path, _) = split_fragment(&resolved);
                Some(ManifestItem {
                    id: tree.get_plain_attr(item, "id").unwrap_or_default().to_string(),
                    href: href.to_string(),
                    path: path.to_string(),
                    media_type: tree
                        .get_plain_attr(item, "media-type")
                        .unwrap_or_default()
                        .to_string(),
                    properties: tree.get_plain_attr(item, "properties").map(String::from),
                })
            })
            .collect()
    }

    /// Manifest items keyed by absolute path. Built once.
    pub fn manifest_by_path(&self) -> &HashMap<String, ManifestItem> {
        self.manifest_by_path.get_or_init(|| {
            self.manifest()
                .into_iter()
                .map(|item| (item.path.clone(), item))
                .collect()
        })
    }

    /// Manifest items keyed by id. Built once.
    pub fn manifest_by_id(&self) -> &HashMap<String, ManifestItem> {
        self.manifest_by_id.get_or_init(|| {
            self.manifest()
                .into_iter()
                .map(|item| (item.id.clone(), item))
                .collect()
        })
    }

    /// Manifest item for an absolute path; any fragment is ignored.
    pub fn manifest_item(&self, path: &str) -> Option<&ManifestItem> {
        let (path, _) = split_fragment(path);
        self.manifest_by_path().get(path)
    }

    /// `<spine><itemref>` entries, optionally without `linear="no"` ones.
    pub fn spine(&self, linear_only: bool) -> Vec<SpineItem> {
        let tree = self.opf.tree();
        self.opf
            .query("spine > itemref")
            .into_iter()
            .filter_map(|itemref| {
                let idref = tree.get_plain_attr(itemref, "idref")?;
                Some(SpineItem {
                    idref: idref.to_string(),
                    linear: tree.get_plain_attr(itemref, "linear") != Some("no"),
                    properties: tree.get_plain_attr(itemref, "properties").map(String::from),
                })
            })
            .filter(|item| item.linear || !linear_only)
            .collect()
    }

    /// Spine entries joined with their manifest items.
    ///
    /// An itemref naming no manifest item is skipped.
    pub fn spine_with_manifest(&self, linear_only: bool) -> Vec<(SpineItem, ManifestItem)> {
        let by_id = self.manifest_by_id();
        self.spine(linear_only)
            .into_iter()
            .filter_map(|spine_item| match by_id.get(&spine_item.idref) {
                Some(item) => Some((spine_item, item.clone())),
                None => {
                    log::warn!("Skipping spine itemref '{}': not in manifest", spine_item.idref);
                    None
                }
            })
            .collect()
    }

    /// Load a chapter by absolute path, parsed per its manifest media type.
    ///
    /// Relative paths are rejected; resolve them first. Returns `Ok(None)`
    /// if the resource cannot be read.
    pub fn get_chapter(&self, path: &str) -> Result<Option<ParsedDocument<R>>> {
        self.read_dom_file(path, None)
    }

    /// Load any package file by absolute path.
    ///
    /// With no `dialect`, the manifest media type decides, then the file
    /// extension. A XHTML file that fails strict parsing is parsed again as
    /// HTML.
    pub fn read_dom_file(&self, path: &str, dialect: Option<Dialect>) -> Result<Option<ParsedDocument<R>>> {
        if !path.starts_with('/') {
            return Err(Error::RelativePath(path.to_string()));
        }

        let dialect = dialect.or_else(|| {
            self.manifest_item(path)
                .and_then(|item| Dialect::from_media_type(&item.media_type))
        });
        let Some(doc) = ParsedDocument::load(path, &self.resolver, dialect) else {
            return Ok(None);
        };

        if doc.dialect() == Dialect::Xhtml && doc.has_parse_error() {
            log::warn!("{} is not well-formed XHTML, parsing as HTML", path);
            return Ok(Some(doc.reparse(Dialect::Html)));
        }
        Ok(Some(doc))
    }

    /// Chapters in spine order, loaded one at a time.
    ///
    /// Only XHTML and HTML items are yielded. Unreadable chapters are
    /// skipped.
    pub fn chapters(&self, linear_only: bool) -> Chapters<'_, R> {
        let items: Vec<ManifestItem> = self
            .spine_with_manifest(linear_only)
            .into_iter()
            .map(|(_, item)| item)
            .filter(ManifestItem::is_chapter)
            .collect();
        Chapters {
            epub: self,
            items: items.into_iter(),
        }
    }

    /// Convert one chapter to Markdown.
    ///
    /// `reference` may be absolute or relative to the OPF directory; a
    /// fragment is ignored. Ids the table of contents links to are kept as
    /// anchors. Returns `None` if the chapter cannot be read.
    pub fn chapter_markdown(&self, reference: &str) -> Option<String> {
        let resolved = self.opf.resolve_href(reference);
        let (path, _) = split_fragment(&resolved);
        let doc = self.get_chapter(path).ok()??;

        let keep_ids = self
            .toc()
            .anchor_links()
            .get(path)
            .cloned()
            .unwrap_or_default();
        let options = ConvertOptions::default()
            .with_preserve_ids(true)
            .with_keep_ids(keep_ids)
            .with_base_path(doc.base());
        Some(doc.into_markdown(&options))
    }

    /// Bibliographic metadata. Built once.
    ///
    /// An OPF without `<metadata>` yields empty metadata; use
    /// [`Metadata::from_xml`] to treat that as an error.
    pub fn metadata(&self) -> &Metadata {
        self.metadata.get_or_init(|| {
            let tree = self.opf.tree();
            let metadata = tree
                .element_children(tree.document())
                .find(|&id| tree.is_tag(id, "package"))
                .and_then(|package| {
                    tree.element_children(package)
                        .find(|&id| tree.is_tag(id, "metadata"))
                });
            match metadata {
                Some(element) => Metadata::from_dom(tree, element),
                None => {
                    log::warn!("Package document {} has no <metadata>", self.opf.path());
                    Metadata::default()
                }
            }
        })
    }

    /// Table of contents. Built once.
    pub fn toc(&self) -> &TableOfContents {
        self.toc.get_or_init(|| TableOfContents::from_epub(self))
    }

    /// Hex SHA-256 of the package document text.
    pub fn opfhash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.opf.content().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// The cover image item.
    ///
    /// EPUB3 marks it with the `cover-image` property; EPUB2 names its id
    /// in `<meta name="cover" content="..">`.
    pub fn cover_image(&self) -> Option<ManifestItem> {
        if let Some(item) = self
            .manifest()
            .into_iter()
            .find(|item| item.has_property("cover-image"))
        {
            return Some(item);
        }

        let tree = self.opf.tree();
        let cover_id = self
            .opf
            .query(r#"metadata > meta[name="cover"]"#)
            .into_iter()
            .find_map(|meta| tree.get_plain_attr(meta, "content"))?;
        self.manifest_by_id().get(cover_id).cloned()
    }

    /// Raw bytes of a package resource by absolute path.
    pub fn read_resource(&self, path: &str) -> Option<Vec<u8>> {
        self.resolver.read_bytes(path)
    }
}

/// Iterator returned by [`EPub::chapters`].
pub struct Chapters<'a, R: ResourceResolver> {
    epub: &'a EPub<R>,
    items: std::vec::IntoIter<ManifestItem>,
}

impl<R: ResourceResolver> Iterator for Chapters<'_, R> {
    type Item = ParsedDocument<R>;

    fn next(&mut self) -> Option<Self::Item> {
        for item in self.items.by_ref() {
            match self.epub.get_chapter(&item.path) {
                Ok(Some(doc)) => return Some(doc),
                Ok(None) => log::debug!("Skipping unreadable chapter {}", item.path),
                Err(e) => log::debug!("Skipping chapter {}: {}", item.path, e),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    use super::*;

    const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

    const OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Sample</dc:title>
    <meta name="cover" content="cover"/>
  </metadata>
  <manifest>
    <item id="ch1" href="text/chapter%201.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch2" href="text/ch2.html" media-type="text/html"/>
    <item id="notes" href="text/notes.xhtml" media-type="application/xhtml+xml"/>
    <item id="gone" href="text/gone.xhtml" media-type="application/xhtml+xml"/>
    <item id="cover" href="images/cover.jpg" media-type="image/jpeg"/>
  </manifest>
  <spine>
    <itemref idref="ch1"/>
    <itemref idref="missing"/>
    <itemref idref="gone"/>
    <itemref idref="notes" linear="no"/>
    <itemref idref="ch2" properties="page-spread-left"/>
  </spine>
</package>"#;

    fn build(files: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, content) in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn sample() -> EPub<ZipResolver> {
        EPub::from_bytes(build(&[
            ("mimetype", "application/epub+zip"),
            ("META-INF/container.xml", CONTAINER),
            ("OEBPS/content.opf", OPF),
            ("OEBPS/text/chapter 1.xhtml", "<html><body><p>One</p></body></html>"),
            ("OEBPS/text/ch2.html", "<p>Two<p>Three"),
            ("OEBPS/text/notes.xhtml", "<html><body><p>Notes</body></html>"),
            ("OEBPS/images/cover.jpg", "JPEG"),
        ]))
        .unwrap()
    }

    #[test]
    fn test_manifest_paths_are_decoded_and_absolute() {
        let epub = sample();
        let manifest = epub.manifest();
        assert_eq!(manifest.len(), 5);
        assert_eq!(manifest[0].path, "/OEBPS/text/chapter 1.xhtml");
        assert_eq!(manifest[0].href, "text/chapter%201.xhtml");
        assert!(epub.manifest_item("/OEBPS/images/cover.jpg#x").is_some());
        assert_eq!(epub.manifest_by_id()["ch2"].media_type, "text/html");
    }

    #[test]
    fn test_manifest_by_path_is_memoized() {
        let epub = sample();
        assert!(std::ptr::eq(epub.manifest_by_path(), epub.manifest_by_path()));
    }

    #[test]
    fn test_spine_linear_filtering() {
        let epub = sample();
        let linear: Vec<_> = epub.spine(true).into_iter().map(|s| s.idref).collect();
        assert_eq!(linear, vec!["ch1", "missing", "gone", "ch2"]);
        assert_eq!(epub.spine(false).len(), 5);
        assert_eq!(
            epub.spine(true)[3].properties.as_deref(),
            Some("page-spread-left")
        );
    }

    #[test]
    fn test_spine_with_manifest_skips_dangling() {
        let epub = sample();
        let ids: Vec<_> = epub
            .spine_with_manifest(true)
            .into_iter()
            .map(|(_, item)| item.id)
            .collect();
        assert_eq!(ids, vec!["ch1", "gone", "ch2"]);
    }

    #[test]
    fn test_chapters_skip_unreadable() {
        let epub = sample();
        let paths: Vec<_> = epub.chapters(true).map(|doc| doc.path()).collect();
        assert_eq!(paths, vec!["/OEBPS/text/chapter 1.xhtml", "/OEBPS/text/ch2.html"]);
        assert_eq!(epub.chapters(false).count(), 3);
    }

    #[test]
    fn test_get_chapter_requires_absolute_path() {
        let epub = sample();
        assert!(matches!(
            epub.get_chapter("text/ch2.html"),
            Err(Error::RelativePath(_))
        ));
        let doc = epub.get_chapter("/OEBPS/text/ch2.html").unwrap().unwrap();
        assert_eq!(doc.dialect(), Dialect::Html);
        assert!(epub.get_chapter("/OEBPS/text/gone.xhtml").unwrap().is_none());
    }

    #[test]
    fn test_malformed_xhtml_falls_back_to_html() {
        let epub = sample();
        let doc = epub.get_chapter("/OEBPS/text/notes.xhtml").unwrap().unwrap();
        assert_eq!(doc.dialect(), Dialect::Html);
        assert!(!doc.has_parse_error());
        assert_eq!(doc.query("p").len(), 1);
    }

    #[test]
    fn test_cover_image_from_epub2_meta() {
        let epub = sample();
        assert_eq!(epub.cover_image().unwrap().path, "/OEBPS/images/cover.jpg");
        assert_eq!(epub.read_resource("/OEBPS/images/cover.jpg").as_deref(), Some(&b"JPEG"[..]));
    }

    #[test]
    fn test_opfhash_is_sha256_hex() {
        let epub = sample();
        let hash = epub.opfhash();
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, sample().opfhash());
        assert_eq!(epub.version(), Some("3.0"));
    }

    #[test]
    fn test_missing_structure_errors() {
        let no_container = EPub::from_bytes(build(&[("mimetype", "application/epub+zip")]));
        assert!(matches!(no_container, Err(Error::MissingContainer)));

        let no_rootfile = EPub::from_bytes(build(&[(
            "META-INF/container.xml",
            r#"<container><rootfiles><rootfile full-path="a.opf" media-type="text/plain"/></rootfiles></container>"#,
        )]));
        assert!(matches!(no_rootfile, Err(Error::MissingRootfile)));

        let no_full_path = EPub::from_bytes(build(&[(
            "META-INF/container.xml",
            r#"<container><rootfiles><rootfile media-type="application/oebps-package+xml"/></rootfiles></container>"#,
        )]));
        assert!(matches!(no_full_path, Err(Error::MissingFullPath)));

        let no_opf = EPub::from_bytes(build(&[("META-INF/container.xml", CONTAINER)]));
        assert!(matches!(no_opf, Err(Error::MissingPackageDocument(p)) if p == "/OEBPS/content.opf"));
    }
}
