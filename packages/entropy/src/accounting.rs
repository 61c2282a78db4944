//! Attribution of coded bits to the parts of the bitstream that spent them.
//!
//! [`Accounting`] samples a coder's [`Tell::tell_frac`] and charges each
//! increase to the current `(technique, plane)` pair. It only reads the coder
//! and never changes coder or model state.

use std::fmt;

use strum::{EnumCount as _, IntoEnumIterator as _};
use strum_macros::{AsRefStr, EnumCount, EnumIter};

use crate::range::{BITRES, Tell};

/// Coding tool a bit was spent on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, AsRefStr, EnumIter, EnumCount)]
#[strum(serialize_all = "kebab-case")]
pub enum Technique {
    #[default]
    Unknown,
    Frame,
    BlockSize,
    IntraMode,
    DcCoeff,
    AcCoeffs,
    MotionVectors,
}

/// Image plane a bit was spent on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, AsRefStr, EnumIter, EnumCount)]
#[strum(serialize_all = "kebab-case")]
pub enum Plane {
    #[default]
    Unknown,
    Frame,
    Luma,
    Cb,
    Cr,
    Alpha,
}

/// A change of the current category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Technique(Technique),
    Plane(Plane),
}

/// Fractional bit counts per `(technique, plane)`, in `1 / 2^BITRES` bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accounting {
    last_frac_bits: u32,
    technique: Technique,
    plane: Plane,
    frac_bits: [[u32; Plane::COUNT]; Technique::COUNT],
}

impl Default for Accounting {
    fn default() -> Self {
        Self::new()
    }
}

impl Accounting {
    /// Creates an empty table matching a freshly created coder.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            // What `tell_frac` reports before anything is coded.
            last_frac_bits: 1 << BITRES,
            technique: Technique::Unknown,
            plane: Plane::Unknown,
            frac_bits: [[0; Plane::COUNT]; Technique::COUNT],
        }
    }

    /// Clears all counts and returns to the unknown category.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Technique that receives the next charge.
    #[must_use]
    pub const fn technique(&self) -> Technique {
        self.technique
    }

    /// Plane that receives the next charge.
    #[must_use]
    pub const fn plane(&self) -> Plane {
        self.plane
    }

    /// Charges everything coded since the last update to the current
    /// category.
    pub fn update_frac_bits(&mut self, frac_bits: u32) {
        let diff = frac_bits.wrapping_sub(self.last_frac_bits);
        let slot = &mut self.frac_bits[self.technique as usize][self.plane as usize];
        *slot = slot.wrapping_add(diff);
        self.last_frac_bits = frac_bits;
    }

    /// Same as [`Self::update_frac_bits`] with the coder's current count.
    pub fn record<T: Tell>(&mut self, coder: &T) {
        self.update_frac_bits(coder.tell_frac());
    }

    /// Switches technique without charging anything.
    pub const fn set_technique(&mut self, technique: Technique) {
        self.technique = technique;
    }

    /// Switches plane without charging anything.
    pub const fn set_plane(&mut self, plane: Plane) {
        self.plane = plane;
    }

    /// Applies a category change without charging anything.
    pub const fn set(&mut self, category: Category) {
        match category {
            Category::Technique(technique) => self.technique = technique,
            Category::Plane(plane) => self.plane = plane,
        }
    }

    /// Charges the bits coded so far to the old category, then switches.
    pub fn update(&mut self, frac_bits: u32, category: Category) {
        self.update_frac_bits(frac_bits);
        self.set(category);
    }

    /// Bits charged to one `(technique, plane)` pair.
    #[must_use]
    pub const fn get(&self, technique: Technique, plane: Plane) -> u32 {
        self.frac_bits[technique as usize][plane as usize]
    }

    /// Bits charged to `technique` across all planes.
    #[must_use]
    pub fn technique_total(&self, technique: Technique) -> u32 {
        self.frac_bits[technique as usize].iter().sum()
    }

    /// Bits charged to `plane` across all techniques.
    #[must_use]
    pub fn plane_total(&self, plane: Plane) -> u32 {
        self.frac_bits.iter().map(|row| row[plane as usize]).sum()
    }

    /// Bits charged to every category.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.frac_bits.iter().flatten().sum()
    }
}

impl fmt::Display for Accounting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for technique in Technique::iter() {
            for plane in Plane::iter() {
                let index = technique as usize * Plane::COUNT + plane as usize;
                writeln!(
                    f,
                    "{},{} ({index}): {}",
                    technique.as_ref(),
                    plane.as_ref(),
                    self.get(technique, plane)
                )?;
            }
        }
        Ok(())
    }
}
