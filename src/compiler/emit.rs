//! The binary emitter: packs the header, asset table, and resolved
//! instruction list into the on-wire byte layout the VM loader expects.

use std::path::Path;

use super::config::CompilerConfig;
use super::io::BlobReader;
use super::label::ResolvedInstruction;

const MAGIC: i64 = 0xFEEDC0FFEE;
const HEADER_SIZE: usize = 64;
const ALIGNMENT: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AssetKind {
    Sprite = 1,
    Music = 2,
    Sound = 3,
}

struct Asset {
    kind: AssetKind,
    extension: String,
    bytes: Vec<u8>,
}

/// Assemble the full binary for `config`, reading asset bytes through
/// `blobs` and packing `instructions` (already label-resolved) after them.
pub fn emit(config: &CompilerConfig, instructions: &[ResolvedInstruction], blobs: &dyn BlobReader) -> Result<Vec<u8>, String> {
    let mut assets = Vec::new();
    load_assets(&config.sprites, AssetKind::Sprite, config, blobs, &mut assets)?;
    load_assets(&config.music, AssetKind::Music, config, blobs, &mut assets)?;
    load_assets(&config.sounds, AssetKind::Sound, config, blobs, &mut assets)?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + instructions.len() * ALIGNMENT);
    write_header(&mut buf, config);
    write_assets(&mut buf, &assets);
    pad_to(&mut buf, ALIGNMENT);
    write_instructions(&mut buf, instructions);
    Ok(buf)
}

fn load_assets(
    names: &[String],
    kind: AssetKind,
    config: &CompilerConfig,
    blobs: &dyn BlobReader,
    out: &mut Vec<Asset>,
) -> Result<(), String> {
    for name in names {
        let path = config.working_directory.join(name);
        let bytes = blobs
            .read_bytes(&path)
            .map_err(|err| format!("failed to read asset \"{}\": {}", path.display(), err))?;
        let extension = extension_of(&path);
        out.push(Asset { kind, extension, bytes });
    }
    Ok(())
}

fn extension_of(path: &Path) -> String {
    path.extension().and_then(|ext| ext.to_str()).unwrap_or("").to_string()
}

fn write_header(buf: &mut Vec<u8>, config: &CompilerConfig) {
    buf.extend_from_slice(&MAGIC.to_le_bytes());
    buf.extend_from_slice(&config.screen_width.to_le_bytes());
    buf.extend_from_slice(&config.screen_height.to_le_bytes());
    buf.extend_from_slice(&config.fps.to_le_bytes());
    buf.extend_from_slice(&config.code_address.to_le_bytes());
    buf.extend_from_slice(&config.memory.to_le_bytes());
    buf.extend_from_slice(&(config.pixel_perfect as i64).to_le_bytes());
    buf.extend_from_slice(&0i64.to_le_bytes()); // reserved, keeps the header a round 64 bytes
    debug_assert_eq!(buf.len(), HEADER_SIZE);
}

fn write_assets(buf: &mut Vec<u8>, assets: &[Asset]) {
    for asset in assets {
        write_asset_record(buf, asset);
    }
    // 16-byte zero terminator record.
    buf.extend_from_slice(&[0u8; 16]);
}

fn write_asset_record(buf: &mut Vec<u8>, asset: &Asset) {
    let kind = asset.kind as u16;
    buf.extend_from_slice(&kind.to_le_bytes());

    let length = asset.bytes.len() as u64;
    let length_bytes = length.to_le_bytes();
    buf.extend_from_slice(&length_bytes[..6]);

    let ext_start = buf.len();
    buf.extend_from_slice(asset.extension.as_bytes());
    buf.push(0);
    pad_record_to(buf, ext_start, 8);

    let bytes_start = buf.len();
    buf.extend_from_slice(&asset.bytes);
    pad_record_to(buf, bytes_start, 8);
}

fn write_instructions(buf: &mut Vec<u8>, instructions: &[ResolvedInstruction]) {
    for instr in instructions {
        let opcode = instr.op as u16;
        buf.extend_from_slice(&opcode.to_le_bytes());

        let arg1 = instr.operands.first().copied().unwrap_or(0);
        let arg1_bytes = arg1.to_le_bytes();
        buf.extend_from_slice(&arg1_bytes[..6]);

        let arg2 = instr.operands.get(1).copied().unwrap_or(0);
        buf.extend_from_slice(&arg2.to_le_bytes());
    }
}

fn pad_to(buf: &mut Vec<u8>, boundary: usize) {
    while buf.len() % boundary != 0 {
        buf.push(0);
    }
}

fn pad_record_to(buf: &mut Vec<u8>, start: usize, boundary: usize) {
    let written = buf.len() - start;
    let padded = written.div_ceil(boundary) * boundary;
    buf.resize(start + padded, 0);
}
