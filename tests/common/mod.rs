//! Fixture packages shared by the integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::Path;

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

pub const CONTAINER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

/// EPUB3 package with a nav document.
pub const OPF3: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="uid">urn:uuid:1234</dc:identifier>
    <dc:title id="t1">The Sample Book</dc:title>
    <dc:creator id="c1">Jane Doe</dc:creator>
    <dc:creator id="c2">John Roe</dc:creator>
    <dc:language>en</dc:language>
    <meta refines="#c1" property="role" scheme="marc:relators">aut</meta>
    <meta refines="#c1" property="file-as">Doe, Jane</meta>
    <meta refines="c2" property="role">ill</meta>
    <meta refines="#nobody" property="role">edt</meta>
    <meta property="dcterms:modified">2024-01-01T00:00:00Z</meta>
    <meta name="generator" content="ignored"/>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="cover" href="text/cover.xhtml" media-type="application/xhtml+xml" properties="svg"/>
    <item id="ch1" href="text/ch1.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch2" href="text/ch2.xhtml" media-type="application/xhtml+xml"/>
    <item id="img" href="images/cover.jpg" media-type="image/jpeg" properties="cover-image"/>
    <item id="css" href="style.css" media-type="text/css"/>
  </manifest>
  <spine>
    <itemref idref="cover" linear="no"/>
    <itemref idref="ch1"/>
    <itemref idref="ch2"/>
  </spine>
</package>"##;

pub const NAV: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>Contents</title></head>
<body>
  <nav epub:type="toc" id="toc">
    <ol>
      <li><a href="text/ch1.xhtml">Chapter One</a>
        <ol>
          <li><a href="text/ch1.xhtml#sec1">First Section</a></li>
          <li><a href="text/ch1.xhtml#sec2">Second Section</a></li>
        </ol>
      </li>
      <li><a href="text/ch2.xhtml#start">Chapter Two</a></li>
    </ol>
  </nav>
  <nav epub:type="landmarks" hidden="">
    <ol><li><a href="text/ch1.xhtml#unused" epub:type="bodymatter">Start</a></li></ol>
  </nav>
</body>
</html>"#;

pub const COVER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:xlink="http://www.w3.org/1999/xlink">
<head><title>Cover</title><link rel="stylesheet" href="../style.css" type="text/css"/></head>
<body>
  <div class="cover">
    <svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 600 800">
      <image width="600" height="800" xlink:href="../images/cover.jpg"/>
    </svg>
  </div>
</body>
</html>"#;

pub const CH1: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>Chapter One</title><meta charset="utf-8"/></head>
<body>
  <h1>Chapter One</h1>
  <h2 id="sec1">First Section</h2>
  <p id="p1">It was a <em>dark</em> and <strong>stormy</strong> night.</p>
  <h2 id="sec2">Second Section</h2>
  <p>See <a href="ch2.xhtml#start">the next chapter</a>.</p>
  <p id="unused">Nothing links here.</p>
</body>
</html>"#;

/// Not well-formed: the chapter is recovered with the HTML parser.
pub const CH2: &str = r#"<html xmlns="http://www.w3.org/1999/xhtml">
<body>
  <div class="calibre1" id="start"><p>Chapter Two begins&nbsp;here.</div>
  <p><img src="../images/cover.jpg"/></p>
</body>
</html>"#;

/// EPUB2 package with only an NCX.
pub const OPF2: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
    <dc:title>Old Book</dc:title>
    <dc:creator opf:role="aut" opf:file-as="Writer, Old">Old Writer</dc:creator>
    <meta name="cover" content="img"/>
  </metadata>
  <manifest>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="ch1" href="text/ch1.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch2" href="text/ch2.xhtml" media-type="application/xhtml+xml"/>
    <item id="img" href="images/cover.jpg" media-type="image/jpeg"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="ch1"/>
    <itemref idref="ch2"/>
  </spine>
</package>"#;

pub const NCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head><meta name="dtb:uid" content="x"/></head>
  <docTitle><text>Old Book</text></docTitle>
  <navMap>
    <navPoint id="n1" playOrder="1">
      <navLabel><text>Chapter One</text></navLabel>
      <content src="text/ch1.xhtml"/>
      <navPoint id="n2" playOrder="2">
        <navLabel><text>First Section</text></navLabel>
        <content src="text/ch1.xhtml#sec1"/>
      </navPoint>
    </navPoint>
    <navPoint id="n3" playOrder="3">
      <navLabel><text> Chapter Two </text></navLabel>
      <content src="text/ch2.xhtml#start"/>
    </navPoint>
  </navMap>
</ncx>"#;

pub fn epub3_files() -> Vec<(&'static str, &'static str)> {
    vec![
        ("mimetype", "application/epub+zip"),
        ("META-INF/container.xml", CONTAINER),
        ("OEBPS/content.opf", OPF3),
        ("OEBPS/nav.xhtml", NAV),
        ("OEBPS/text/cover.xhtml", COVER),
        ("OEBPS/text/ch1.xhtml", CH1),
        ("OEBPS/text/ch2.xhtml", CH2),
        ("OEBPS/images/cover.jpg", "JPEG"),
        ("OEBPS/style.css", "p { margin: 0 }"),
    ]
}

pub fn epub2_files() -> Vec<(&'static str, &'static str)> {
    vec![
        ("mimetype", "application/epub+zip"),
        ("META-INF/container.xml", CONTAINER),
        ("OEBPS/content.opf", OPF2),
        ("OEBPS/toc.ncx", NCX),
        ("OEBPS/text/ch1.xhtml", CH1),
        ("OEBPS/text/ch2.xhtml", CH2),
        ("OEBPS/images/cover.jpg", "JPEG"),
    ]
}

/// Pack files into an in-memory ZIP archive.
pub fn build_zip(files: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, content) in files {
        zip.start_file(*name, options).expect("Failed to start zip entry");
        zip.write_all(content.as_bytes()).expect("Failed to write zip entry");
    }
    zip.finish().expect("Failed to finish zip").into_inner()
}

/// Write files under `root` as an extracted package.
pub fn write_dir(root: &Path, files: &[(&str, &str)]) {
    for (name, content) in files {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create directory");
        }
        std::fs::write(&path, content).expect("Failed to write file");
    }
}
