//! Positional length-prefixed binary codec for store values, plus the
//! canonical key encoding for `Position`.
//!
//! Each record is its fields written back to back as length-prefixed
//! strings/integers, in a fixed order, with no per-field tag. Forward
//! compatibility only covers appending a new field at the end of a record
//! (an older reader simply never reads the trailing bytes); inserting a
//! field in the middle, or removing one, is a breaking change to the
//! encoding and requires a store migration.

use crate::model::{Coverage, FuncInfo, LogPattern, LogPatternRule, Position, UnknownLogPattern};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("truncated record")]
    Truncated,
    #[error("invalid utf-8 in field")]
    InvalidUtf8,
}

type Result<T> = std::result::Result<T, CodecError>;

// --- primitive writers/readers --------------------------------------------

fn write_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn write_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn write_str(buf: &mut Vec<u8>, s: &str) {
    write_u32(buf, s.len() as u32);
    buf.extend_from_slice(s.as_bytes());
}

fn write_str_vec(buf: &mut Vec<u8>, items: &[String]) {
    write_u32(buf, items.len() as u32);
    for item in items {
        write_str(buf, item);
    }
}

fn write_map(buf: &mut Vec<u8>, map: &HashMap<String, u64>) {
    write_u32(buf, map.len() as u32);
    for (k, v) in map {
        write_str(buf, k);
        write_u64(buf, *v);
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn u32(&mut self) -> Result<u32> {
        if self.pos + 4 > self.buf.len() {
            return Err(CodecError::Truncated);
        }
        let v = u32::from_be_bytes(self.buf[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        Ok(v)
    }

    fn u64(&mut self) -> Result<u64> {
        if self.pos + 8 > self.buf.len() {
            return Err(CodecError::Truncated);
        }
        let v = u64::from_be_bytes(self.buf[self.pos..self.pos + 8].try_into().unwrap());
        self.pos += 8;
        Ok(v)
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        if self.pos + len > self.buf.len() {
            return Err(CodecError::Truncated);
        }
        let s = std::str::from_utf8(&self.buf[self.pos..self.pos + len])
            .map_err(|_| CodecError::InvalidUtf8)?
            .to_string();
        self.pos += len;
        Ok(s)
    }

    fn string_vec(&mut self) -> Result<Vec<String>> {
        let len = self.u32()? as usize;
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(self.string()?);
        }
        Ok(out)
    }

    fn map(&mut self) -> Result<HashMap<String, u64>> {
        let len = self.u32()? as usize;
        let mut out = HashMap::with_capacity(len);
        for _ in 0..len {
            let k = self.string()?;
            let v = self.u64()?;
            out.insert(k, v);
        }
        Ok(out)
    }
}

// --- Position ---------------------------------------------------------------

pub fn encode_position(pos: &Position) -> Vec<u8> {
    let mut buf = Vec::new();
    write_str(&mut buf, &pos.repo);
    write_str(&mut buf, &pos.file_path);
    write_u32(&mut buf, pos.line_number);
    write_u32(&mut buf, pos.column_offset);
    buf
}

pub fn decode_position(bytes: &[u8]) -> Result<Position> {
    let mut r = Reader::new(bytes);
    let repo = r.string()?;
    let file_path = r.string()?;
    let line_number = r.u32()?;
    let column_offset = r.u32()?;
    Ok(Position {
        repo,
        file_path,
        line_number,
        column_offset,
    })
}

/// Hex-rendered position bytes, used as the stable pattern identity string.
pub fn position_id(pos: &Position) -> String {
    let bytes = encode_position(pos);
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

// --- LogPattern ---------------------------------------------------------------

pub fn encode_log_pattern(p: &LogPattern) -> Vec<u8> {
    let mut buf = Vec::new();
    let pos_bytes = encode_position(&p.position);
    write_u32(&mut buf, pos_bytes.len() as u32);
    buf.extend_from_slice(&pos_bytes);

    write_str(&mut buf, &p.func.name);
    let func_pos_bytes = encode_position(&p.func.position);
    write_u32(&mut buf, func_pos_bytes.len() as u32);
    buf.extend_from_slice(&func_pos_bytes);

    write_str(&mut buf, &p.level);
    write_str_vec(&mut buf, &p.signatures);
    buf
}

pub fn decode_log_pattern(bytes: &[u8]) -> Result<LogPattern> {
    let mut r = Reader::new(bytes);
    let pos_len = r.u32()? as usize;
    if r.pos + pos_len > r.buf.len() {
        return Err(CodecError::Truncated);
    }
    let position = decode_position(&r.buf[r.pos..r.pos + pos_len])?;
    r.pos += pos_len;

    let func_name = r.string()?;
    let func_pos_len = r.u32()? as usize;
    if r.pos + func_pos_len > r.buf.len() {
        return Err(CodecError::Truncated);
    }
    let func_position = decode_position(&r.buf[r.pos..r.pos + func_pos_len])?;
    r.pos += func_pos_len;

    let level = r.string()?;
    let signatures = r.string_vec()?;

    Ok(LogPattern {
        position,
        func: FuncInfo {
            name: func_name,
            position: func_position,
        },
        level,
        signatures,
    })
}

// --- Coverage ---------------------------------------------------------------

pub fn encode_coverage(c: &Coverage) -> Vec<u8> {
    let mut buf = Vec::new();
    let pos_bytes = encode_position(&c.position);
    write_u32(&mut buf, pos_bytes.len() as u32);
    buf.extend_from_slice(&pos_bytes);
    write_u64(&mut buf, c.total);
    write_map(&mut buf, &c.by_log_file);
    buf
}

pub fn decode_coverage(bytes: &[u8]) -> Result<Coverage> {
    let mut r = Reader::new(bytes);
    let pos_len = r.u32()? as usize;
    if r.pos + pos_len > r.buf.len() {
        return Err(CodecError::Truncated);
    }
    let position = decode_position(&r.buf[r.pos..r.pos + pos_len])?;
    r.pos += pos_len;
    let total = r.u64()?;
    let by_log_file = r.map()?;
    Ok(Coverage {
        position,
        total,
        by_log_file,
    })
}

// --- UnknownLogPattern -------------------------------------------------------

pub fn encode_unknown(u: &UnknownLogPattern) -> Vec<u8> {
    let mut buf = Vec::new();
    write_str(&mut buf, &u.short_position);
    write_str(&mut buf, &u.level);
    write_u64(&mut buf, u.total);
    write_map(&mut buf, &u.by_log_file);
    buf
}

pub fn decode_unknown(bytes: &[u8]) -> Result<UnknownLogPattern> {
    let mut r = Reader::new(bytes);
    let short_position = r.string()?;
    let level = r.string()?;
    let total = r.u64()?;
    let by_log_file = r.map()?;
    Ok(UnknownLogPattern {
        short_position,
        level,
        total,
        by_log_file,
    })
}

// --- LogPatternRule -----------------------------------------------------------

pub fn encode_rule(r: &LogPatternRule) -> Vec<u8> {
    let mut buf = Vec::new();
    write_str_vec(&mut buf, &r.log_level);
    write_str_vec(&mut buf, &r.log_signature);
    buf
}

pub fn decode_rule(bytes: &[u8]) -> Result<LogPatternRule> {
    let mut r = Reader::new(bytes);
    let log_level = r.string_vec()?;
    let log_signature = r.string_vec()?;
    Ok(LogPatternRule {
        log_level,
        log_signature,
    })
}
