//! # Spatial Key Module
//!
//! Chunks and generation zones are identified by the x/z coordinates of their minimum
//! corner. `SpatialKey` packs such a pair into one 64-bit integer so it can be used as a
//! cheap, hashable map key: `x` occupies the upper 32 bits and `z` the lower 32 bits.
//!
//! Keys are only meaningful for aligned origins (multiples of [`CHUNK_WIDTH`] for chunks,
//! [`ZONE_WIDTH`] for zones). The alignment helpers use floor division so that negative
//! world coordinates map to the chunk or zone that actually contains them:
//! `chunk_origin(-1, -1) == (-16, -16)`, not `(0, 0)`.

use std::fmt;

use super::chunk::CHUNK_WIDTH;

/// Side length of a generation zone in blocks (4 × 4 chunks).
pub const ZONE_WIDTH: i32 = 64;

/// A packed `(x, z)` origin.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpatialKey(i64);

impl SpatialKey {
    /// Packs `x` into the upper and `z` into the lower 32 bits.
    #[inline]
    pub fn encode(x: i32, z: i32) -> Self {
        SpatialKey(((x as i64) << 32) | (z as u32 as i64))
    }

    /// Unpacks the `(x, z)` pair, sign-extending both halves.
    #[inline]
    pub fn decode(self) -> (i32, i32) {
        ((self.0 >> 32) as i32, self.0 as i32)
    }

    /// The raw packed value.
    pub fn raw(self) -> i64 {
        self.0
    }

    /// Reinterprets a raw packed value as a key.
    pub fn from_raw(raw: i64) -> Self {
        SpatialKey(raw)
    }

    /// Key of the chunk origin `dx` chunks along X and `dz` chunks along Z from this one,
    /// or `None` when that origin lies outside the `i32` range.
    pub fn offset_by_chunks(self, dx: i32, dz: i32) -> Option<Self> {
        let (x, z) = self.decode();
        let x = x.checked_add(dx.checked_mul(CHUNK_WIDTH)?)?;
        let z = z.checked_add(dz.checked_mul(CHUNK_WIDTH)?)?;
        Some(SpatialKey::encode(x, z))
    }
}

impl fmt::Debug for SpatialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (x, z) = self.decode();
        write!(f, "SpatialKey({x}, {z})")
    }
}

/// Rounds `n` down to the nearest multiple of `m` (floor semantics for negatives).
#[inline]
pub fn floor_align(n: i32, m: i32) -> i32 {
    n.div_euclid(m) * m
}

/// Origin of the chunk containing world column `(x, z)`.
pub fn chunk_origin(x: i32, z: i32) -> (i32, i32) {
    (floor_align(x, CHUNK_WIDTH), floor_align(z, CHUNK_WIDTH))
}

/// Origin of the zone containing world column `(x, z)`.
pub fn zone_origin(x: i32, z: i32) -> (i32, i32) {
    (floor_align(x, ZONE_WIDTH), floor_align(z, ZONE_WIDTH))
}

/// Key of the chunk containing world column `(x, z)`.
pub fn chunk_key_at(x: i32, z: i32) -> SpatialKey {
    let (cx, cz) = chunk_origin(x, z);
    SpatialKey::encode(cx, cz)
}
