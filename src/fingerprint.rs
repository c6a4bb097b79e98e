//! Deterministic hashing and parameterized node identity.
//!
//! Provides domain-separated SHA-256 hashing with length prefixing, the
//! canonical byte encoding of argument maps, and the derivation of
//! parameterized node ids from `(container, path, arguments)`. Two calls with
//! equivalent inputs always yield the same id; the id format is part of the
//! crate's external contract.
//!
//! # Citations
//! - SHA-256: NIST FIPS 180-4 (2015)
//! - Domain separation & length prefixing: Bernstein et al., "How to hash
//!   into elliptic curves" (2009)
//! - Canonical serialization: [Protocol Buffers Deterministic Serialization,
//!   Google]

use crate::core::{NodeId, Path, PathStep};
use crate::value::GraphValue;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

// ----------------------------------------------------------------------------
// Domain separation constants
// ----------------------------------------------------------------------------

/// Domain for parameterized node ids (version 0).
pub const DOMAIN_PARAM_NODE_V0: &[u8] = b"PARAM_NODE_V0";

// Canonical value encoding discriminants.
const TAG_HOLE: u8 = 0;
const TAG_NULL: u8 = 1;
const TAG_BOOL: u8 = 2;
const TAG_INT: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_STRING: u8 = 5;
const TAG_ARRAY: u8 = 6;
const TAG_OBJECT: u8 = 7;

/// A 256-bit hash value.
///
/// Wraps a byte array for type safety; all hashing goes through
/// [`HashValue::hash_with_domain`] so every digest in the crate is
/// domain-separated and length-prefixed.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashValue(pub [u8; 32]);

impl HashValue {
    /// Creates a zero hash (all zeros).
    #[inline]
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Creates a hash from a raw byte array.
    #[inline]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw byte array.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Computes SHA-256 of the given data with domain separation.
    ///
    /// The digest input is `b"PMP:<domain>:v1" || length_prefix(data) || data`
    /// where the length prefix is a 64-bit little-endian byte count.
    pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"PMP:");
        hasher.update(domain);
        hasher.update(b":v1");
        let len = data.len() as u64;
        hasher.update(len.to_le_bytes());
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Returns the full lowercase hex form.
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(64);
        for byte in self.0 {
            out.push(char::from_digit((byte >> 4) as u32, 16).unwrap_or('0'));
            out.push(char::from_digit((byte & 0x0f) as u32, 16).unwrap_or('0'));
        }
        out
    }
}

impl std::fmt::Display for HashValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 4 bytes in hex for readability
        write!(
            f,
            "HashValue({:02x}{:02x}{:02x}{:02x}…)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// Resolved arguments of a field: variable references substituted, defaults
/// applied, absent optionals materialized as null. Key order is the sorted
/// order of `BTreeMap`, which is also the canonical order for hashing.
pub type FieldArguments = BTreeMap<String, GraphValue>;

/// Types with a deterministic canonical byte representation.
///
/// Canonical bytes are stable across processes and platforms: collections are
/// encoded in sorted order, every variable-length run is length-prefixed, and
/// type discrimination is explicit, so `1`, `"1"` and `true` never collide.
pub trait Canonicalizable {
    /// Returns the canonical byte representation.
    fn to_canonical_bytes(&self) -> Vec<u8>;
}

impl Canonicalizable for GraphValue {
    /// Encodes with a leading discriminant byte per variant.
    ///
    /// # Float normalization
    /// A float whose value is integral and representable as `i64` encodes
    /// identically to that integer, so `1.0` and `1` produce the same bytes.
    /// All other floats encode by IEEE-754 bit pattern. Integers and strings
    /// remain distinct (`1` never collides with `"1"`).
    fn to_canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        write_value(self, &mut out);
        out
    }
}

fn write_value(value: &GraphValue, out: &mut Vec<u8>) {
    match value {
        GraphValue::Hole => out.push(TAG_HOLE),
        GraphValue::Null => out.push(TAG_NULL),
        GraphValue::Bool(b) => {
            out.push(TAG_BOOL);
            out.push(u8::from(*b));
        }
        GraphValue::Number(n) => write_number(n, out),
        GraphValue::String(s) => {
            out.push(TAG_STRING);
            write_bytes(s.as_bytes(), out);
        }
        GraphValue::Array(items) => {
            out.push(TAG_ARRAY);
            out.extend_from_slice(&(items.len() as u64).to_le_bytes());
            for item in items {
                write_value(item, out);
            }
        }
        GraphValue::Object(map) => {
            out.push(TAG_OBJECT);
            out.extend_from_slice(&(map.len() as u64).to_le_bytes());
            // BTreeMap iterates in sorted key order.
            for (key, entry) in map {
                write_bytes(key.as_bytes(), out);
                write_value(entry, out);
            }
        }
    }
}

fn write_number(n: &serde_json::Number, out: &mut Vec<u8>) {
    if let Some(i) = n.as_i64() {
        write_int(i128::from(i), out);
    } else if let Some(u) = n.as_u64() {
        write_int(i128::from(u), out);
    } else if let Some(f) = n.as_f64() {
        // Integral floats within i64 range normalize to the integer form.
        if f.is_finite() && f.fract() == 0.0 && f >= -9_223_372_036_854_775_808.0 && f < 9_223_372_036_854_775_808.0 {
            write_int(i128::from(f as i64), out);
        } else {
            out.push(TAG_FLOAT);
            out.extend_from_slice(&f.to_bits().to_le_bytes());
        }
    } else {
        out.push(TAG_NULL);
    }
}

fn write_int(i: i128, out: &mut Vec<u8>) {
    out.push(TAG_INT);
    out.extend_from_slice(&i.to_le_bytes());
}

fn write_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
    out.extend_from_slice(bytes);
}

impl Canonicalizable for Path {
    /// Step count, then each step with a field/index discriminant.
    fn to_canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + self.len() * 16);
        out.extend_from_slice(&(self.len() as u64).to_le_bytes());
        for step in self.steps() {
            match step {
                PathStep::Field(name) => {
                    out.push(0);
                    write_bytes(name.as_bytes(), &mut out);
                }
                PathStep::Index(index) => {
                    out.push(1);
                    out.extend_from_slice(&(*index as u64).to_le_bytes());
                }
            }
        }
        out
    }
}

/// Derives the id of a parameterized value node.
///
/// Pure and deterministic: the id depends only on the container id, the
/// array-index-qualified field path inside the container, and the resolved
/// argument map. The textual form is `param:` followed by the full hex
/// digest; this format, including the canonicalization rules above, is an
/// external contract.
pub fn parameterized_id(container: &NodeId, path: &Path, arguments: &FieldArguments) -> NodeId {
    let mut data = Vec::with_capacity(256);
    write_bytes(container.as_str().as_bytes(), &mut data);
    data.extend_from_slice(&path.to_canonical_bytes());
    data.extend_from_slice(&(arguments.len() as u64).to_le_bytes());
    for (name, value) in arguments {
        write_bytes(name.as_bytes(), &mut data);
        write_value(value, &mut data);
    }
    let hash = HashValue::hash_with_domain(DOMAIN_PARAM_NODE_V0, &data);
    NodeId::new(format!("param:{}", hash.to_hex()))
}
