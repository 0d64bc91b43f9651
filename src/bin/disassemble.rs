use std::{env, fs};

use simpleos::isa::Opcode;
use simpleos::logging::error;

const MAGIC: i64 = 0xFEEDC0FFEE;
const HEADER_SIZE: usize = 64;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <input.sox> <output.txt>", args[0]);
        std::process::exit(1);
    }

    let input_path = &args[1];
    let output_path = &args[2];

    let bytes = fs::read(input_path).unwrap_or_else(|e| {
        error(format!("failed to read input file: {}", e));
        std::process::exit(2);
    });

    let listing = disassemble(&bytes).unwrap_or_else(|message| {
        error(message);
        std::process::exit(3);
    });

    fs::write(output_path, listing).unwrap_or_else(|e| {
        error(format!("failed to write to output file: {}", e));
        std::process::exit(4);
    });
}

fn disassemble(bytes: &[u8]) -> Result<String, String> {
    if bytes.len() < HEADER_SIZE || read_i64(bytes, 0) != MAGIC {
        return Err("not a simpleos binary: bad magic".to_string());
    }

    let code_address = read_i64(bytes, 32);

    let mut offset = HEADER_SIZE;
    loop {
        if offset + 2 > bytes.len() {
            return Err("truncated asset table".to_string());
        }
        let kind = u16::from_le_bytes(bytes[offset..offset + 2].try_into().unwrap());
        if kind == 0 {
            offset += 16;
            break;
        }
        offset = skip_asset_record(bytes, offset)?;
    }
    offset = align_up(offset, 16);

    let mut listing = String::new();
    let mut addr = code_address;
    while offset + 16 <= bytes.len() {
        let opcode = u16::from_le_bytes(bytes[offset..offset + 2].try_into().unwrap());

        let mut arg1_bytes = [0u8; 8];
        arg1_bytes[..6].copy_from_slice(&bytes[offset + 2..offset + 8]);
        let arg1 = (i64::from_le_bytes(arg1_bytes) << 16) >> 16;
        let arg2 = i64::from_le_bytes(bytes[offset + 8..offset + 16].try_into().unwrap());

        listing.push_str(&format!("{:>6}: {}\n", addr, decode_instruction(opcode, arg1, arg2)));

        addr += 2;
        offset += 16;
    }

    Ok(listing)
}

fn decode_instruction(opcode: u16, arg1: i64, arg2: i64) -> String {
    match Opcode::from_u16(opcode) {
        Some(op) => format!("{} {} {}", op.mnemonic(), arg1, arg2),
        None => format!(".word 0x{:04X} {} {}", opcode, arg1, arg2),
    }
}

fn skip_asset_record(bytes: &[u8], offset: usize) -> Result<usize, String> {
    let mut length_bytes = [0u8; 8];
    length_bytes[..6].copy_from_slice(
        bytes.get(offset + 2..offset + 8).ok_or("truncated asset record")?,
    );
    let length = u64::from_le_bytes(length_bytes) as usize;

    let ext_start = offset + 8;
    let ext_end = bytes[ext_start..]
        .iter()
        .position(|&b| b == 0)
        .map(|pos| ext_start + pos)
        .ok_or("asset extension missing its null terminator")?;
    let ext_record_len = align_up(ext_end + 1 - ext_start, 8);

    let bytes_start = ext_start + ext_record_len;
    let bytes_record_len = align_up(length, 8);
    Ok(bytes_start + bytes_record_len)
}

fn align_up(value: usize, boundary: usize) -> usize {
    value.div_ceil(boundary) * boundary
}

fn read_i64(bytes: &[u8], offset: usize) -> i64 {
    i64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap())
}
