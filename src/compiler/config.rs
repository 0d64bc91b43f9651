//! Compiler configuration, loaded from a JSON project file. Recognised
//! fields establish the screen, memory and asset layout; `music`, `sounds`
//! and `sprites` also fix the index assignments the `music()`/`sound()`/
//! `sprite()` builtins resolve against.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// The raw, as-deserialised shape of a configuration file. Every field is
/// optional; [`CompilerConfig::load`] fills in the documented defaults.
#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    fps: Option<i64>,
    screen_width: Option<i64>,
    screen_height: Option<i64>,
    memory: Option<i64>,
    code_address: Option<i64>,
    #[serde(default)]
    music: Vec<String>,
    #[serde(default)]
    sounds: Vec<String>,
    #[serde(default)]
    sprites: Vec<String>,
    main: Option<String>,
    output_file: Option<String>,
    working_directory: Option<String>,
    pixel_perfect: Option<bool>,
}

/// A fully resolved compiler configuration: every defaulting rule has
/// already been applied.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    pub fps: i64,
    pub screen_width: i64,
    pub screen_height: i64,
    pub memory: i64,
    pub code_address: i64,
    pub music: Vec<String>,
    pub sounds: Vec<String>,
    pub sprites: Vec<String>,
    pub main: PathBuf,
    pub output_file: PathBuf,
    pub working_directory: PathBuf,
    pub pixel_perfect: bool,
}

const DEFAULT_FPS: i64 = 60;
const DEFAULT_SCREEN_WIDTH: i64 = 320;
const DEFAULT_SCREEN_HEIGHT: i64 = 240;
const DEFAULT_MEMORY: i64 = 4096;
const DEFAULT_CODE_ADDRESS: i64 = 4096;

impl CompilerConfig {
    /// Parse a configuration file's JSON text and apply the defaulting
    /// rules that are relative to `config_path` (`main`, `output_file`,
    /// `working_directory`).
    pub fn load(config_path: &Path, text: &str) -> Result<CompilerConfig, String> {
        let raw: RawConfig = serde_json::from_str(text).map_err(|err| format!("malformed configuration: {}", err))?;

        let working_directory = raw
            .working_directory
            .map(PathBuf::from)
            .unwrap_or_else(|| config_path.parent().map(Path::to_path_buf).unwrap_or_default());

        let main = raw.main.map(PathBuf::from).unwrap_or_else(|| default_main(config_path));

        let output_file = raw
            .output_file
            .map(PathBuf::from)
            .unwrap_or_else(|| main.with_extension("sox"));

        Ok(CompilerConfig {
            fps: raw.fps.unwrap_or(DEFAULT_FPS),
            screen_width: raw.screen_width.unwrap_or(DEFAULT_SCREEN_WIDTH),
            screen_height: raw.screen_height.unwrap_or(DEFAULT_SCREEN_HEIGHT),
            memory: raw.memory.unwrap_or(DEFAULT_MEMORY),
            code_address: raw.code_address.unwrap_or(DEFAULT_CODE_ADDRESS),
            music: raw.music,
            sounds: raw.sounds,
            sprites: raw.sprites,
            main,
            output_file,
            working_directory,
            pixel_perfect: raw.pixel_perfect.unwrap_or(false),
        })
    }
}

/// The default `main`, relative to `working_directory` (as every `main`
/// value is joined onto `working_directory` by the caller): the config
/// file's own name with its `.json` extension stripped.
fn default_main(config_path: &Path) -> PathBuf {
    let stem_path = if config_path.extension().and_then(|e| e.to_str()) == Some("json") {
        config_path.with_extension("")
    } else {
        config_path.to_path_buf()
    };
    stem_path.file_name().map(PathBuf::from).unwrap_or(stem_path)
}
