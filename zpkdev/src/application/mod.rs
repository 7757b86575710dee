pub mod handlers;

use crate::presentation::cli::{Cli, Commands};
use clap::Parser;
use zpk_core::error::Result;

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    handlers::init_tracing(cli.verbose);
    let ctx = handlers::Context::load(cli.config.as_deref())?;
    match cli.command {
        Commands::Check { open } => handlers::handle_check(&ctx, open),
        Commands::List { open } => handlers::handle_list(&ctx, open),
        Commands::Verify { open } => handlers::handle_verify(&ctx, open),
        Commands::Cat { open, entry } => handlers::handle_cat(&ctx, open, entry),
        Commands::Extract { open, dest } => handlers::handle_extract(&ctx, open, dest),
        Commands::Pack {
            out,
            inputs,
            format,
            deterministic,
            min_gain,
            level,
            mimetype,
        } => handlers::handle_pack(out, inputs, format, deterministic, min_gain, level, mimetype),
    }
}
