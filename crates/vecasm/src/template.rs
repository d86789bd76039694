//! Declarative encoding templates for fixed-width instruction words.
//!
//! A [`WordTemplate`] is a base opcode plus a table of named bit-fields.
//! [`WordTemplate::new`] is a `const fn` that rejects overlapping fields,
//! fields that run past bit 31, and base bits set inside a field. Templates
//! are declared as `const` items, so a malformed table fails the build.
//! [`WordTemplate::encode`] range-checks every value and never truncates.

use crate::error::EncodeError;

/// One bit-field of a word template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Field name, reported in `FieldOverflow`.
    pub name: &'static str,
    /// Bit offset of the least-significant bit.
    pub offset: u8,
    /// Width in bits.
    pub width: u8,
    /// Whether the field is two's complement.
    pub signed: bool,
}

impl Field {
    /// Unsigned field.
    pub const fn u(name: &'static str, offset: u8, width: u8) -> Self {
        Self {
            name,
            offset,
            width,
            signed: false,
        }
    }

    /// Signed field.
    pub const fn s(name: &'static str, offset: u8, width: u8) -> Self {
        Self {
            name,
            offset,
            width,
            signed: true,
        }
    }

    /// Smallest accepted value.
    pub const fn min(&self) -> i64 {
        if self.signed {
            -(1i64 << (self.width - 1))
        } else {
            0
        }
    }

    /// Largest accepted value.
    pub const fn max(&self) -> i64 {
        if self.signed {
            (1i64 << (self.width - 1)) - 1
        } else {
            (1i64 << self.width) - 1
        }
    }

    /// Mask of the bits this field occupies within the word.
    pub const fn mask(&self) -> u32 {
        (((1u64 << self.width) - 1) << self.offset) as u32
    }
}

/// Base opcode plus field table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordTemplate {
    /// Template name (the native mnemonic).
    pub name: &'static str,
    /// Fixed opcode bits.
    pub base: u32,
    /// Variable fields, in the order values are passed to `encode`.
    pub fields: &'static [Field],
}

impl WordTemplate {
    /// Declare a template.
    ///
    /// # Panics
    ///
    /// Panics (at compile time when used in a `const`) if a field is empty,
    /// extends past bit 31, overlaps another field, or if `base` has bits
    /// set inside any field.
    pub const fn new(name: &'static str, base: u32, fields: &'static [Field]) -> Self {
        let mut seen: u32 = 0;
        let mut i = 0;
        while i < fields.len() {
            let f = &fields[i];
            if f.width == 0 || f.offset as u32 + f.width as u32 > 32 {
                panic!("template field exceeds the 32-bit word");
            }
            let mask = f.mask();
            if seen & mask != 0 {
                panic!("template fields overlap");
            }
            if base & mask != 0 {
                panic!("template base has bits set inside a field");
            }
            seen |= mask;
            i += 1;
        }
        Self { name, base, fields }
    }

    /// Insert `values` (one per field, in declaration order) into the base.
    ///
    /// # Errors
    ///
    /// `FieldOverflow` if a value does not fit its field; `InvalidOperands`
    /// if the number of values does not match the number of fields.
    pub fn encode(&self, values: &[i64]) -> Result<u32, EncodeError> {
        if values.len() != self.fields.len() {
            return Err(EncodeError::invalid(
                self.name,
                "template value count does not match its field table",
            ));
        }
        let mut word = self.base;
        for (f, &v) in self.fields.iter().zip(values) {
            if v < f.min() || v > f.max() {
                return Err(EncodeError::FieldOverflow {
                    field: f.name,
                    value: v,
                    min: f.min(),
                    max: f.max(),
                });
            }
            let raw = (v as u64) & ((1u64 << f.width) - 1);
            word |= (raw << f.offset) as u32;
        }
        Ok(word)
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}
