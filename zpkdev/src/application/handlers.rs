use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use tracing_subscriber::EnvFilter;
use zpk_core::error::{Result, ZpkError};
use zpk_core::{
    LoaderConfig, OpenRequest, PackOptions, Package, PackageLoader, StorageFormat, extract, list,
    pack,
};

use crate::presentation::cli::OpenArgs;

/// Logs go to stderr so `cat` output stays clean.
pub fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

pub struct Context {
    loader: PackageLoader,
    default_format: StorageFormat,
}

impl Context {
    pub fn load(config: Option<&Path>) -> Result<Self> {
        let cfg = match config {
            Some(p) => LoaderConfig::from_file(p)?,
            None => LoaderConfig::default(),
        };
        debug!(?cfg, "loader configuration");
        Ok(Self {
            loader: PackageLoader::from_config(&cfg),
            default_format: cfg.default_format,
        })
    }

    fn format(&self, open: &OpenArgs) -> StorageFormat {
        open.format.unwrap_or(self.default_format)
    }

    fn open(&self, open: &OpenArgs) -> Result<Package> {
        let req = OpenRequest::new(open.url.clone(), self.format(open)).with_repair(open.repair);
        self.loader.open(&req)
    }
}

pub fn handle_check(ctx: &Context, open: OpenArgs) -> Result<()> {
    let pkg = ctx.open(&open)?;
    let stats = pkg.stats();
    println!(
        "ok  {}  {}  {} files  {} dirs{}",
        pkg.source(),
        pkg.format(),
        stats.files,
        stats.dirs,
        if pkg.is_repaired() { "  (repaired)" } else { "" }
    );
    Ok(())
}

pub fn handle_list(ctx: &Context, open: OpenArgs) -> Result<()> {
    list(&ctx.loader, &open.url, ctx.format(&open), open.repair)
}

pub fn handle_verify(ctx: &Context, open: OpenArgs) -> Result<()> {
    let pkg = ctx.open(&open)?;
    let report = pkg.verify()?;
    for d in &report.entries {
        println!("{}  {:>10}  {}", d.blake3, d.size, d.name);
    }
    println!(
        "{} entries  {} bytes ({} compressed)  package {}",
        report.entries.len(),
        report.total_uncompressed,
        report.total_compressed,
        report.package_digest
    );
    Ok(())
}

pub fn handle_cat(ctx: &Context, open: OpenArgs, entry: String) -> Result<()> {
    let pkg = ctx.open(&open)?;
    let mut r = pkg.open_reader(&entry)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    io::copy(&mut r, &mut out).map_err(ZpkError::from_read_error)?;
    out.flush()?;
    Ok(())
}

pub fn handle_extract(ctx: &Context, open: OpenArgs, dest: PathBuf) -> Result<()> {
    let pkg = ctx.open(&open)?;
    let n = extract(&pkg, &dest)?;
    println!("extracted {} entries ({n} bytes) to {}", pkg.len(), dest.display());
    Ok(())
}

pub fn handle_pack(
    out: PathBuf,
    inputs: Vec<PathBuf>,
    format: StorageFormat,
    deterministic: bool,
    min_gain: f32,
    level: u32,
    mimetype: Option<String>,
) -> Result<()> {
    let refs: Vec<_> = inputs.iter().map(|p| p.as_path()).collect();
    let opts = PackOptions {
        deterministic,
        min_gain,
        format,
        level,
        mimetype,
    };
    let n = pack(&refs, &out, Some(&opts))?;
    println!("wrote {n} entries to {}", out.display());
    Ok(())
}
