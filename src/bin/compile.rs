use std::{env, fs};

use simpleos::compiler::config::CompilerConfig;
use simpleos::compiler::io::{FsBlobReader, FsSourceResolver};
use simpleos::compiler::compile;
use simpleos::logging::error;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <project.json>", args[0]);
        std::process::exit(1);
    }

    let config_path = std::path::Path::new(&args[1]);
    let text = fs::read_to_string(config_path).unwrap_or_else(|e| {
        error(format!("failed to read {}: {}", config_path.display(), e));
        std::process::exit(2);
    });

    let config = CompilerConfig::load(config_path, &text).unwrap_or_else(|e| {
        error(e);
        std::process::exit(2);
    });

    let sources = FsSourceResolver;
    let blobs = FsBlobReader;

    if compile(&config, &sources, &blobs).is_err() {
        std::process::exit(3);
    }
}
