use std::collections::VecDeque;

use simpleos::compiler::config::CompilerConfig;
use simpleos::compiler::io::{FsBlobReader, FsSourceResolver};
use simpleos::vm::{Colour, Event, InputSource, Mixer, RandomSource, Rect, Renderer, VmError};

/// Writes `source` as `main.sos` alongside a generated `game.json` in a
/// fresh temp directory, compiles it, and returns the compiled binary's
/// bytes. Panics (failing the test) if compilation does not succeed.
pub fn compile_source(source: &str, extra_config: &str) -> Vec<u8> {
    let dir = tempfile::tempdir().expect("tempdir");
    let main_path = dir.path().join("main.sos");
    std::fs::write(&main_path, source).expect("write source");

    let config_text = format!(
        r#"{{"main": "main.sos", "output_file": "main.sox"{}}}"#,
        if extra_config.is_empty() { String::new() } else { format!(", {}", extra_config) }
    );
    let config_path = dir.path().join("game.json");
    std::fs::write(&config_path, &config_text).expect("write config");

    let config = CompilerConfig::load(&config_path, &config_text).expect("config parses");
    let sources = FsSourceResolver;
    let blobs = FsBlobReader;

    let result = simpleos::compiler::compile(&config, &sources, &blobs);
    assert!(result.is_ok(), "expected compilation to succeed");

    std::fs::read(dir.path().join("main.sox")).expect("read compiled binary")
}

/// Attempts to compile `source` but does not assert success; returns
/// `Ok(())`/`Err(())` so callers can assert on compile-time failure.
pub fn try_compile_source(source: &str, extra_config: &str) -> Result<(), ()> {
    let dir = tempfile::tempdir().expect("tempdir");
    let main_path = dir.path().join("main.sos");
    std::fs::write(&main_path, source).expect("write source");

    let config_text = format!(
        r#"{{"main": "main.sos", "output_file": "main.sox"{}}}"#,
        if extra_config.is_empty() { String::new() } else { format!(", {}", extra_config) }
    );
    let config_path = dir.path().join("game.json");

    let config = CompilerConfig::load(&config_path, &config_text).expect("config parses");
    let sources = FsSourceResolver;
    let blobs = FsBlobReader;
    simpleos::compiler::compile(&config, &sources, &blobs)
}

/// Compiles a multi-file project: `files` maps relative paths to their
/// source text. `main` names the entry file.
pub fn compile_project(main: &str, files: &[(&str, &str)], extra_config: &str) -> Result<(), ()> {
    let dir = tempfile::tempdir().expect("tempdir");
    for (name, text) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("mkdir");
        }
        std::fs::write(&path, text).expect("write source");
    }

    let config_text = format!(
        r#"{{"main": "{}", "output_file": "main.sox"{}}}"#,
        main,
        if extra_config.is_empty() { String::new() } else { format!(", {}", extra_config) }
    );
    let config_path = dir.path().join("game.json");

    let config = CompilerConfig::load(&config_path, &config_text).expect("config parses");
    let sources = FsSourceResolver;
    let blobs = FsBlobReader;
    simpleos::compiler::compile(&config, &sources, &blobs)
}

fn read_i64(bytes: &[u8], offset: usize) -> i64 {
    i64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap())
}

/// Reads back the `n`th instruction record from a compiled binary with an
/// empty asset table, returning `(opcode, arg1, arg2)`. Mirrors the wire
/// layout `emit`/`loader` agree on, independent of both.
pub fn nth_instruction(binary: &[u8], n: usize) -> (u16, i64, i64) {
    let header_size = 64;
    let terminator_size = 16;
    let offset = header_size + terminator_size + n * 16;
    let opcode = u16::from_le_bytes(binary[offset..offset + 2].try_into().unwrap());
    let mut arg1_bytes = [0u8; 8];
    arg1_bytes[..6].copy_from_slice(&binary[offset + 2..offset + 8]);
    let arg1 = (i64::from_le_bytes(arg1_bytes) << 16) >> 16;
    let arg2 = read_i64(binary, offset + 8);
    (opcode, arg1, arg2)
}

pub struct RecordingRenderer;
impl Renderer for RecordingRenderer {
    fn load_sprite(&mut self, _: u32, _: &str, _: &[u8]) -> Result<(), VmError> {
        Ok(())
    }
    fn draw_fill(&mut self, _: Rect, _: Colour) {}
    fn draw_sprite(&mut self, _: Rect, _: u32) -> Result<(), VmError> {
        Ok(())
    }
    fn clear(&mut self, _: Rect, _: Colour) {}
}

pub struct NullMixer;
impl Mixer for NullMixer {
    fn load_music(&mut self, _: u32, _: &str, _: &[u8]) -> Result<(), VmError> {
        Ok(())
    }
    fn load_sound(&mut self, _: u32, _: &str, _: &[u8]) -> Result<(), VmError> {
        Ok(())
    }
    fn play_music(&mut self, _: u32, _: f64) -> Result<(), VmError> {
        Ok(())
    }
    fn stop_music(&mut self) {}
    fn play_sound(&mut self, _: u32, _: f64) -> Result<(), VmError> {
        Ok(())
    }
}

/// A deterministic, scripted [`InputSource`]: fixed clock ticks and a
/// prepared event queue, for reproducing a single run exactly.
pub struct ScriptedInput {
    pub ticks: VecDeque<u64>,
    pub events: VecDeque<Event>,
    pub mouse: (u16, u16),
}

impl ScriptedInput {
    pub fn with_ticks(ticks: Vec<u64>) -> ScriptedInput {
        ScriptedInput { ticks: VecDeque::from(ticks), events: VecDeque::new(), mouse: (0, 0) }
    }
}

impl InputSource for ScriptedInput {
    fn poll_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }
    fn mouse_position(&mut self) -> (u16, u16) {
        self.mouse
    }
    fn now_ticks_ms(&mut self) -> u64 {
        self.ticks.pop_front().unwrap_or_else(|| *self.ticks.back().unwrap_or(&0))
    }
}

pub struct FixedRandom(pub u64);
impl RandomSource for FixedRandom {
    fn next_u64(&mut self) -> u64 {
        self.0
    }
}
