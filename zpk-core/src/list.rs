use crate::error::Result;
use crate::format::StorageFormat;
use crate::loader::{OpenRequest, PackageLoader};

pub fn list(loader: &PackageLoader, url: &str, format: StorageFormat, repair: bool) -> Result<()> {
    let pkg = loader.open(&OpenRequest::new(url, format).with_repair(repair))?;
    if !pkg.comment().is_empty() {
        println!("# {}", String::from_utf8_lossy(pkg.comment()));
    }
    for e in pkg.entries() {
        println!(
            "{}  {} bytes  {}  off={}",
            e.name,
            e.uncompressed_size,
            e.method.as_str(),
            e.header_offset
        );
    }
    Ok(())
}
