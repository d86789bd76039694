//! Operand and addressing model: register tokens, memory descriptors,
//! immediates, and displacement tiers.
//!
//! Everything in this module is target-independent. Tokens are logical:
//! they are resolved against a [`TargetProfile`](crate::profile::TargetProfile)
//! only at encode time and never own a physical register.

use core::fmt;

// ── Register tokens ──────────────────────────────────────────

/// Role a register token plays in an operation's arity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Role {
    /// Destination only; never read.
    Dst,
    /// Destination that is also the first source.
    DstSrc,
    /// Read-only source.
    Src,
    /// Read-only second/third source.
    Src2,
}

impl Role {
    /// Whether a token with this role may be read.
    #[inline]
    pub fn readable(self) -> bool {
        !matches!(self, Role::Dst)
    }

    /// Whether a token with this role may be written.
    #[inline]
    pub fn writable(self) -> bool {
        matches!(self, Role::Dst | Role::DstSrc)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Dst => "dst",
            Role::DstSrc => "dst/src",
            Role::Src => "src",
            Role::Src2 => "src2",
        })
    }
}

/// Logical vector register token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VReg {
    /// Position role.
    pub role: Role,
    /// Logical index, `0..profile.vreg_count`.
    pub index: u8,
}

impl VReg {
    /// Destination-only token.
    #[inline]
    pub const fn dst(index: u8) -> Self {
        Self {
            role: Role::Dst,
            index,
        }
    }

    /// Destination + first source token.
    #[inline]
    pub const fn dst_src(index: u8) -> Self {
        Self {
            role: Role::DstSrc,
            index,
        }
    }

    /// Source token.
    #[inline]
    pub const fn src(index: u8) -> Self {
        Self {
            role: Role::Src,
            index,
        }
    }

    /// Second/third source token.
    #[inline]
    pub const fn src2(index: u8) -> Self {
        Self {
            role: Role::Src2,
            index,
        }
    }
}

impl fmt::Display for VReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.index)
    }
}

/// Logical general-purpose register token (memory base or index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GReg(pub u8);

impl fmt::Display for GReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

// ── Memory ───────────────────────────────────────────────────

/// Index scale factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Scale {
    /// ×1
    S1,
    /// ×2
    S2,
    /// ×4
    S4,
    /// ×8
    S8,
}

impl Scale {
    /// Scale from a multiplier (1, 2, 4 or 8).
    pub fn from_factor(factor: u8) -> Option<Self> {
        match factor {
            1 => Some(Scale::S1),
            2 => Some(Scale::S2),
            4 => Some(Scale::S4),
            8 => Some(Scale::S8),
            _ => None,
        }
    }

    /// The multiplier.
    #[inline]
    pub fn factor(self) -> u8 {
        1 << self.log2()
    }

    /// Shift amount equivalent to this scale.
    #[inline]
    pub fn log2(self) -> u8 {
        match self {
            Scale::S1 => 0,
            Scale::S2 => 1,
            Scale::S4 => 2,
            Scale::S8 => 3,
        }
    }
}

/// Addressing-mode descriptor: `[base + index*scale + disp]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mem {
    /// Base register.
    pub base: GReg,
    /// Optional scaled index register.
    pub index: Option<(GReg, Scale)>,
    /// Byte displacement.
    pub disp: i64,
}

impl Mem {
    /// `[base + disp]`.
    #[inline]
    pub const fn new(base: GReg, disp: i64) -> Self {
        Self {
            base,
            index: None,
            disp,
        }
    }

    /// `[base + index*scale + disp]`.
    #[inline]
    pub const fn indexed(base: GReg, index: GReg, scale: Scale, disp: i64) -> Self {
        Self {
            base,
            index: Some((index, scale)),
            disp,
        }
    }

    /// The same address moved by `delta` bytes, or `None` when the
    /// displacement overflows.
    #[inline]
    pub fn checked_offset(self, delta: i64) -> Option<Self> {
        Some(Self {
            disp: self.disp.checked_add(delta)?,
            ..self
        })
    }
}

impl fmt::Display for Mem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}", self.base)?;
        if let Some((index, scale)) = self.index {
            write!(f, " + {}*{}", index, scale.factor())?;
        }
        match self.disp {
            0 => {}
            d if d < 0 => write!(f, " - {}", d.unsigned_abs())?,
            d => write!(f, " + {}", d)?,
        }
        f.write_str("]")
    }
}

// ── Operand ──────────────────────────────────────────────────

/// One operand of an instruction macro.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand {
    /// Vector register token.
    V(VReg),
    /// Memory operand.
    M(Mem),
    /// Immediate.
    Imm(i64),
}

impl Default for Operand {
    fn default() -> Self {
        Operand::Imm(0)
    }
}

impl From<VReg> for Operand {
    fn from(v: VReg) -> Self {
        Operand::V(v)
    }
}

impl From<Mem> for Operand {
    fn from(m: Mem) -> Self {
        Operand::M(m)
    }
}

impl From<i64> for Operand {
    fn from(i: i64) -> Self {
        Operand::Imm(i)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::V(v) => write!(f, "{}", v),
            Operand::M(m) => write!(f, "{}", m),
            Operand::Imm(i) => write!(f, "#{}", i),
        }
    }
}

// ── Displacement tiers ───────────────────────────────────────

/// A displacement-encoding size class.
///
/// A tier holds a value when the value is a multiple of `scale` and
/// `value / scale` fits a `bits`-wide field of the given signedness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tier {
    /// Width of the encoded field.
    pub bits: u8,
    /// Whether the field is two's complement.
    pub signed: bool,
    /// Implicit multiplier applied by the hardware.
    pub scale: u8,
}

impl Tier {
    /// Signed tier with unit scale.
    pub const fn signed(bits: u8) -> Self {
        Self {
            bits,
            signed: true,
            scale: 1,
        }
    }

    /// Tier with an explicit scale.
    pub const fn scaled(bits: u8, signed: bool, scale: u8) -> Self {
        Self {
            bits,
            signed,
            scale,
        }
    }

    /// Smallest representable displacement.
    pub fn min(self) -> i64 {
        if self.signed {
            -(1i64 << (self.bits - 1)) * self.scale as i64
        } else {
            0
        }
    }

    /// Largest representable displacement.
    pub fn max(self) -> i64 {
        let field_max = if self.signed {
            (1i64 << (self.bits - 1)) - 1
        } else {
            (1i64 << self.bits) - 1
        };
        field_max * self.scale as i64
    }

    /// Whether `value` is losslessly representable in this tier.
    pub fn holds(self, value: i64) -> bool {
        let scale = self.scale as i64;
        value % scale == 0 && value >= self.min() && value <= self.max()
    }

    /// Encoded field bits for a value this tier holds.
    pub fn field_bits(self, value: i64) -> u32 {
        let mask = (1u64 << self.bits) - 1;
        ((value / self.scale as i64) as u64 & mask) as u32
    }

    /// The same tier with its scale replaced.
    pub(crate) fn with_scale(self, scale: u8) -> Self {
        Self { scale, ..self }
    }
}

/// Outcome of classifying a displacement against a profile's tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DispResolution {
    /// The value fits tier `tier_index`; `bits` is the encoded field value.
    Direct {
        /// Position of the selected tier in the profile's tier list.
        tier_index: usize,
        /// The selected tier (scale adjusted to the access size).
        tier: Tier,
        /// Field bits to insert.
        bits: u32,
    },
    /// No tier holds the value; the address must be synthesised in a
    /// scratch register and accessed with zero displacement.
    RequiresScratchAddress,
}

impl DispResolution {
    /// Selected tier index, if any.
    pub fn tier_index(&self) -> Option<usize> {
        match self {
            DispResolution::Direct { tier_index, .. } => Some(*tier_index),
            DispResolution::RequiresScratchAddress => None,
        }
    }
}

/// Classify `value` into the first of `tiers` that holds it.
pub(crate) fn classify(tiers: impl IntoIterator<Item = Tier>, value: i64) -> DispResolution {
    for (tier_index, tier) in tiers.into_iter().enumerate() {
        if tier.holds(value) {
            return DispResolution::Direct {
                tier_index,
                tier,
                bits: tier.field_bits(value),
            };
        }
    }
    DispResolution::RequiresScratchAddress
}
