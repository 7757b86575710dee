use std::fs;
use std::sync::{Arc, Mutex};

use zpk_core::read::opened::PackageEvent;
use zpk_core::{
    LoadEvent, OpenRequest, PackOptions, PackageLoader, PackageWriter, StorageFormat, ZpkError,
    extract, pack,
};

fn odf_like() -> Vec<u8> {
    let mut w = PackageWriter::new(Vec::new(), StorageFormat::Package, true);
    w.add_entry("mimetype", b"application/vnd.oasis.opendocument.text")
        .unwrap();
    w.add_directory("META-INF").unwrap();
    w.add_entry("META-INF/manifest.xml", &b"<manifest:manifest/>".repeat(20))
        .unwrap();
    w.add_entry("content.xml", &b"<office:document-content/>".repeat(50))
        .unwrap();
    w.add_entry("Pictures/p\u{e9}.png", &[0x89, b'P', b'N', b'G'])
        .unwrap();
    w.finish().unwrap()
}

#[test]
fn writer_output_opens_under_every_format() {
    let bytes: Arc<[u8]> = odf_like().into();
    let loader = PackageLoader::default();
    for format in [StorageFormat::Zip, StorageFormat::OfOpXml, StorageFormat::Package] {
        let pkg = loader
            .open_bytes("odf".into(), bytes.clone(), format, false)
            .unwrap();
        assert!(!pkg.is_repaired());
        assert_eq!(pkg.len(), 5);
        assert_eq!(
            pkg.read_entry("content.xml").unwrap(),
            b"<office:document-content/>".repeat(50)
        );
        assert_eq!(
            pkg.read_entry("Pictures/p\u{e9}.png").unwrap(),
            [0x89, b'P', b'N', b'G']
        );
        let report = pkg.verify().unwrap();
        assert_eq!(report.entries.len(), 5);
        assert_eq!(report.entries[0].name, "mimetype");
    }
}

#[test]
fn verify_digest_is_deterministic() {
    let loader = PackageLoader::default();
    let a = loader
        .open_bytes("a".into(), odf_like().into(), StorageFormat::Package, false)
        .unwrap()
        .verify()
        .unwrap();
    let b = loader
        .open_bytes("b".into(), odf_like().into(), StorageFormat::Package, false)
        .unwrap()
        .verify()
        .unwrap();
    assert_eq!(a.package_digest, b.package_digest);
    assert_eq!(a.entries[1].blake3.len(), 64);
}

#[test]
fn pack_then_extract_round_trips_files() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("src");
    fs::create_dir_all(src.join("word/_rels")).unwrap();
    fs::write(src.join("[Content_Types].xml"), b"<Types/>").unwrap();
    fs::write(src.join("word/document.xml"), b"<w:document/>".repeat(64)).unwrap();
    fs::write(src.join("word/_rels/document.xml.rels"), b"<Relationships/>").unwrap();

    let out = tmp.path().join("doc.docx");
    let opts = PackOptions {
        deterministic: true,
        format: StorageFormat::OfOpXml,
        ..PackOptions::default()
    };
    pack(&[src.as_path()], &out, Some(&opts)).unwrap();

    let loader = PackageLoader::default();
    let req = OpenRequest::new(out.to_str().unwrap(), StorageFormat::OfOpXml);
    let pkg = loader.open(&req).unwrap();
    assert!(pkg.contains("word/document.xml"));
    assert!(pkg.contains("word/_rels/"));

    let dest = tmp.path().join("out");
    extract(&pkg, &dest).unwrap();
    assert_eq!(
        fs::read(dest.join("word/document.xml")).unwrap(),
        b"<w:document/>".repeat(64)
    );
    assert_eq!(fs::read(dest.join("[Content_Types].xml")).unwrap(), b"<Types/>");
}

#[test]
fn deterministic_pack_is_byte_identical() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("a.txt"), b"alpha ".repeat(30)).unwrap();
    fs::write(src.join("b.bin"), [1u8, 2, 3, 4]).unwrap();

    let opts = PackOptions {
        deterministic: true,
        ..PackOptions::default()
    };
    let one = tmp.path().join("one.zip");
    let two = tmp.path().join("two.zip");
    pack(&[src.as_path()], &one, Some(&opts)).unwrap();
    pack(&[src.as_path()], &two, Some(&opts)).unwrap();
    assert_eq!(fs::read(one).unwrap(), fs::read(two).unwrap());
}

#[test]
fn loader_and_package_listeners() {
    let loader = PackageLoader::default();
    let events = Arc::new(Mutex::new(Vec::new()));
    let e = events.clone();
    loader.add_listener(Arc::new(move |ev: &LoadEvent| {
        e.lock().unwrap().push(ev.clone());
    }));
    // a listener that panics must not stop delivery to the recorder
    loader.add_listener(Arc::new(|_: &LoadEvent| {
        if true {
            panic!("listener failure");
        }
    }));

    let pkg = loader
        .open_bytes("odf".into(), odf_like().into(), StorageFormat::Package, false)
        .unwrap();
    assert_eq!(events.lock().unwrap().len(), 1);

    let disposed = Arc::new(Mutex::new(0));
    let d = disposed.clone();
    pkg.add_listener(Arc::new(move |ev: &PackageEvent| {
        if matches!(ev, PackageEvent::Disposed { .. }) {
            *d.lock().unwrap() += 1;
        }
    }));
    let handle = pkg.handle("content.xml").unwrap();
    assert!(handle.is_alive());
    drop(pkg);
    assert_eq!(*disposed.lock().unwrap(), 1);
    assert!(matches!(handle.read(), Err(ZpkError::Disposed)));
}
