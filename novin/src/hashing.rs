// novin/src/hashing.rs
//
// Deterministic hashing for audit reproducibility.
//
//   murmur3_32     — feature-name → vector slot (x86 32-bit variant, seed 0).
//                    Must stay bit-identical across platforms; test vectors
//                    below pin the reference outputs.
//   canonical_json — lexicographically sorted keys, minimal whitespace.
//   input_hash     — SHA-256 hex over the canonical encoding. Two requests
//                    differing only in whitespace or key order hash equal.

use serde_json::Value;
use sha2::{Digest, Sha256};

// ── MurmurHash3 x86/32 ────────────────────────────────────────────────────────

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

pub fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    let mut h = seed;
    let mut chunks = data.chunks_exact(4);

    for chunk in &mut chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(C1);
        k = k.rotate_left(15);
        k = k.wrapping_mul(C2);
        h ^= k;
        h = h.rotate_left(13);
        h = h.wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        let mut k = 0u32;
        for (i, &b) in tail.iter().enumerate() {
            k |= (b as u32) << (8 * i);
        }
        k = k.wrapping_mul(C1);
        k = k.rotate_left(15);
        k = k.wrapping_mul(C2);
        h ^= k;
    }

    h ^= data.len() as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// Vector slot for a named feature: murmur3_32(name, 0) mod table size.
pub fn feature_slot(name: &str, table_size: u32) -> usize {
    (murmur3_32(name.as_bytes(), 0) % table_size) as usize
}

// ── Canonical JSON ────────────────────────────────────────────────────────────

/// Serialize with keys sorted lexicographically and no insignificant
/// whitespace. Number and string formatting are delegated to serde_json so
/// the encoding is identical wherever this crate runs.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => {
            // serde_json escaping of a bare string is already canonical
            out.push_str(&serde_json::to_string(s).unwrap_or_else(|_| "\"\"".into()));
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).unwrap_or_else(|_| "\"\"".into()));
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
    }
}

/// Privacy-safe request identifier: SHA-256 hex of the canonical encoding.
pub fn input_hash(value: &Value) -> String {
    let canonical = canonical_json(value);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}
