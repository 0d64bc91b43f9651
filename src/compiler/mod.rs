//! The compiler: lexing, value folding, include/template expansion, label
//! resolution, and binary emission.

pub mod config;
pub mod context;
pub mod emit;
pub mod io;
pub mod label;
pub mod lexer;
pub mod process;
pub mod token;
pub mod value;

use std::path::Path;

use crate::logging;

use config::CompilerConfig;
use context::ParserContext;
use io::{BlobReader, SourceResolver};
use process::process_entry;

/// Compile `config.main` (and everything it includes) into `config.output_file`.
/// Returns `Ok(())` on success, having already printed diagnostics for every
/// file with errors; returns `Err(())` if compilation failed.
pub fn compile(
    config: &CompilerConfig,
    sources: &dyn SourceResolver,
    blobs: &dyn BlobReader,
) -> Result<(), ()> {
    let mut ctx = ParserContext::new(config.working_directory.clone());
    context::ParserContext::register_assets(&mut ctx.music, &config.music);
    context::ParserContext::register_assets(&mut ctx.sounds, &config.sounds);
    context::ParserContext::register_assets(&mut ctx.sprites, &config.sprites);

    let entry = config.working_directory.join(&config.main);
    let result = process_entry(&entry, &mut ctx, sources);

    if !result.success {
        logging::report_errors(&result.errors_by_file);
        return Err(());
    }

    let resolved = match label::resolve_labels(result.items, config.code_address, &ctx.source_lines) {
        Ok(resolved) => resolved,
        Err(errors_by_file) => {
            logging::report_errors(&errors_by_file);
            return Err(());
        }
    };

    let binary = match emit::emit(config, &resolved, blobs) {
        Ok(binary) => binary,
        Err(message) => {
            logging::error(message);
            return Err(());
        }
    };

    let output_path = config.working_directory.join(&config.output_file);
    write_output(&output_path, &binary).map_err(|err| {
        logging::error(format!("failed to write {}: {}", output_path.display(), err));
    })
}

fn write_output(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, bytes)
}
