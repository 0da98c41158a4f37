//! Error types for epubmark operations.
//!
//! Only structural failures are errors. A missing navigation document, a
//! dangling spine itemref or an unreadable chapter is reported as `None`
//! by the operation that looked for it.

use thiserror::Error;

/// Errors that can occur while opening a package or parsing its metadata.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Invalid EPUB: META-INF/container.xml not found")]
    MissingContainer,

    #[error("Invalid EPUB: container.xml has no rootfile with media-type application/oebps-package+xml")]
    MissingRootfile,

    #[error("Invalid EPUB: rootfile element has no full-path attribute")]
    MissingFullPath,

    #[error("Invalid EPUB: package document {0} could not be loaded")]
    MissingPackageDocument(String),

    #[error("Expected an absolute path, got {0}")]
    RelativePath(String),

    #[error("Invalid package document: no <package> root element")]
    MissingPackageElement,

    #[error("Invalid package document: no <metadata> element under <package>")]
    MissingMetadataElement,
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_errors_are_descriptive() {
        let msg = Error::MissingRootfile.to_string();
        assert!(msg.contains("rootfile"));
        assert!(msg.contains("application/oebps-package+xml"));

        let msg = Error::RelativePath("text/ch1.xhtml".into()).to_string();
        assert!(msg.contains("text/ch1.xhtml"));
    }
}
