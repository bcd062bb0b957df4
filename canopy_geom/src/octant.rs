// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Octant addressing around a cube center.

use glam::DVec3;

/// One of the eight sectors around a cube center, encoded as a three-bit
/// mask: bit 0 = +X, bit 1 = +Y, bit 2 = +Z.
///
/// A coordinate exactly on the center plane falls to the negative side
/// (the test is a strict `>`), so every point maps to exactly one octant.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Octant(u8);

impl Octant {
    /// All eight octants in index order.
    pub const ALL: [Octant; 8] = [
        Octant(0),
        Octant(1),
        Octant(2),
        Octant(3),
        Octant(4),
        Octant(5),
        Octant(6),
        Octant(7),
    ];

    /// Octant from a raw index.
    ///
    /// # Panics
    /// Debug-asserts `index < 8`.
    pub fn from_index(index: usize) -> Self {
        debug_assert!(index < 8, "octant index out of range");
        Octant((index & 7) as u8)
    }

    /// Octant of an offset vector relative to the cube center.
    #[inline]
    pub fn from_offset(v: DVec3) -> Self {
        let mut bits = 0u8;
        if v.x > 0.0 {
            bits |= 1;
        }
        if v.y > 0.0 {
            bits |= 2;
        }
        if v.z > 0.0 {
            bits |= 4;
        }
        Octant(bits)
    }

    /// Index in `0..8`, usable for child-array addressing.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// The diagonally opposite octant (bitwise complement).
    #[inline]
    pub const fn opposite(self) -> Octant {
        Octant(!self.0 & 7)
    }

    /// Unit direction toward this octant, components in {-1, +1}.
    #[inline]
    pub fn direction(self) -> DVec3 {
        DVec3::new(
            if self.0 & 1 != 0 { 1.0 } else { -1.0 },
            if self.0 & 2 != 0 { 1.0 } else { -1.0 },
            if self.0 & 4 != 0 { 1.0 } else { -1.0 },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_signs_map_to_bits() {
        assert_eq!(Octant::from_offset(DVec3::new(1.0, 1.0, 1.0)).index(), 7);
        assert_eq!(Octant::from_offset(DVec3::new(-1.0, -1.0, -1.0)).index(), 0);
        assert_eq!(Octant::from_offset(DVec3::new(1.0, -1.0, -1.0)).index(), 1);
        assert_eq!(Octant::from_offset(DVec3::new(-1.0, 1.0, -1.0)).index(), 2);
        assert_eq!(Octant::from_offset(DVec3::new(-1.0, -1.0, 1.0)).index(), 4);
    }

    #[test]
    fn zero_falls_to_negative_side() {
        assert_eq!(Octant::from_offset(DVec3::ZERO).index(), 0);
        assert_eq!(Octant::from_offset(DVec3::new(0.0, 2.0, 0.0)).index(), 2);
    }

    #[test]
    fn opposite_is_complement() {
        for oct in Octant::ALL {
            let opp = oct.opposite();
            assert_eq!(oct.index() ^ opp.index(), 7);
            assert_eq!(opp.opposite(), oct);
        }
    }

    #[test]
    fn direction_round_trips() {
        for oct in Octant::ALL {
            assert_eq!(Octant::from_offset(oct.direction()), oct);
        }
    }
}
