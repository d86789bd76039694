//! Target profiles: per-architecture register capacity, displacement tiers,
//! feature flags, and compatibility modes.
//!
//! A [`TargetProfile`] is a `const` table. Code selects one at build time
//! through a zero-sized [`Target`] marker (`A64Neon`, `X64Avx256`, …), so a
//! build only ever contains the encoder paths of its own profile.

use core::fmt;

use crate::error::EncodeError;
use crate::ir::Elem;
use crate::operand::{classify, DispResolution, GReg, Role, Tier, VReg};

// ── Identity ─────────────────────────────────────────────────

/// Target profile identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TargetId {
    /// AArch64 AdvSIMD, 128-bit.
    A64Neon,
    /// POWER8 VMX/VSX, little-endian.
    Power8,
    /// POWER10 VMX/VSX, little-endian.
    Power10,
    /// x86-64 AVX, 128-bit vectors.
    X64Avx128,
    /// x86-64 AVX2 + FMA, 256-bit vectors.
    X64Avx256,
    /// x86-64 AVX-512 (F, DQ, VL), 512-bit vectors.
    X64Avx512,
}

impl TargetId {
    /// All profile ids.
    pub const ALL: [TargetId; 6] = [
        TargetId::A64Neon,
        TargetId::Power8,
        TargetId::Power10,
        TargetId::X64Avx128,
        TargetId::X64Avx256,
        TargetId::X64Avx512,
    ];

    /// Canonical lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            TargetId::A64Neon => "a64-neon",
            TargetId::Power8 => "power8",
            TargetId::Power10 => "power10",
            TargetId::X64Avx128 => "x64-avx128",
            TargetId::X64Avx256 => "x64-avx256",
            TargetId::X64Avx512 => "x64-avx512",
        }
    }

    /// Look up an id by its canonical name.
    pub fn from_name(name: &str) -> Option<Self> {
        TargetId::ALL.into_iter().find(|t| t.name() == name)
    }

    /// The profile table for this id.
    pub fn profile(self) -> &'static TargetProfile {
        match self {
            TargetId::A64Neon => &A64_NEON,
            TargetId::Power8 => &POWER8,
            TargetId::Power10 => &POWER10,
            TargetId::X64Avx128 => &X64_AVX128,
            TargetId::X64Avx256 => &X64_AVX256,
            TargetId::X64Avx512 => &X64_AVX512,
        }
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Instruction-set family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Family {
    /// 64-bit ARM, fixed 32-bit words.
    Aarch64,
    /// POWER, fixed 32-bit words (little-endian).
    Power,
    /// x86-64, variable-length bytes.
    X86,
}

impl Family {
    /// Whether the family emits fixed 32-bit instruction words.
    pub fn word_oriented(self) -> bool {
        !matches!(self, Family::X86)
    }
}

// ── Register layout ──────────────────────────────────────────

/// How a physical register code is split across instruction fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Ext {
    /// The whole code fits the base field.
    None,
    /// VSX: low five bits in the base field, bit 5 in a separate
    /// per-operand extension bit (TX/AX/BX).
    HighBitSplit,
    /// x86: low three bits in ModRM/opcode, bit 3 in REX/VEX/EVEX R/X/B,
    /// bit 4 in EVEX R'/V'/X.
    RexEvex,
}

/// Register-index bit layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegLayout {
    /// Width of the primary register field.
    pub base_bits: u8,
    /// Extension scheme for bits above the base field.
    pub ext: Ext,
}

impl RegLayout {
    /// Split a physical code into `(base field, extension bits)`.
    pub fn split(self, code: u8) -> (u8, u8) {
        let mask = (1u8 << self.base_bits) - 1;
        (code & mask, code >> self.base_bits)
    }
}

// ── Features & compatibility modes ───────────────────────────

bitflags::bitflags! {
    /// Native capability flags queried by the compatibility composer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct Features: u32 {
        /// Fused multiply-add/subtract.
        const FMA = 1 << 0;
        /// Packed integer divide and remainder.
        const INT_DIV = 1 << 1;
        /// Packed 64-bit integer multiply.
        const I64_MUL = 1 << 2;
        /// Packed 64-bit integer min/max.
        const I64_MINMAX = 1 << 3;
        /// Packed 64-bit arithmetic right shift.
        const I64_SAR = 1 << 4;
        /// Packed 64-bit integer/float conversion.
        const I64_CVT = 1 << 5;
        /// Double-precision reciprocal (sqrt) estimate.
        const RCP_ESTIMATE_F64 = 1 << 6;
        /// Dedicated mask registers.
        const MASK_REGS = 1 << 7;
        /// Scaled 12-bit displacement vector loads/stores.
        const DQ_LOADS = 1 << 8;
    }
}

/// How a full-precision reciprocal (or reciprocal square root) is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Recip {
    /// The hardware estimate already delivers full precision.
    Native,
    /// Hardware estimate followed by this many Newton-Raphson steps.
    Refine(u8),
    /// `1.0 / x` (or `1.0 / sqrt(x)`) through the divider.
    Divide,
}

/// How `fma`/`fms` are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FmaMode {
    /// Single fused instruction.
    Native,
    /// Multiply then add/subtract (two roundings).
    Split,
    /// Rejected with `UnsupportedOperation`.
    Unsupported,
}

/// Per-profile compatibility choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Compat {
    /// Reciprocal strategy, indexed `[f32, f64]`.
    pub rcp: [Recip; 2],
    /// Reciprocal square-root strategy, indexed `[f32, f64]`.
    pub rsqrt: [Recip; 2],
    /// Fused multiply strategy.
    pub fma: FmaMode,
}

impl Compat {
    /// Reciprocal strategy for `elem`.
    pub fn rcp(&self, elem: Elem) -> Recip {
        self.rcp[elem.is_double() as usize]
    }

    /// Reciprocal square-root strategy for `elem`.
    pub fn rsqrt(&self, elem: Elem) -> Recip {
        self.rsqrt[elem.is_double() as usize]
    }
}

// ── TargetProfile ────────────────────────────────────────────

/// Static description of one target's encoding rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TargetProfile {
    /// Profile id.
    pub id: TargetId,
    /// Instruction-set family.
    pub family: Family,
    /// Native vector width in bits.
    pub native_width: u32,
    /// Encodable vector lengths, ascending, the last equal to `native_width`.
    pub lengths: &'static [u32],
    /// Logical vector registers addressable at native width.
    pub vreg_count: u8,
    /// Physical vector registers reserved for fallback sequences: s0..s2 are
    /// sequence temporaries, s3 stages memory operands.
    pub scratch_vregs: [u8; 4],
    /// Mask register reserved for compares and reductions, if the profile
    /// has mask registers.
    pub scratch_mask: Option<u8>,
    /// Logical general register → physical code.
    pub gpr_map: &'static [u8],
    /// Physical general registers reserved for address synthesis, lane
    /// loops, and reductions.
    pub scratch_gprs: [u8; 3],
    /// Stack pointer code.
    pub stack_gpr: u8,
    /// Register-index bit layout.
    pub reg_layout: RegLayout,
    /// Supported element types.
    pub elements: &'static [Elem],
    /// Displacement tiers for vector loads/stores, smallest first.
    pub tiers: &'static [Tier],
    /// Native capabilities.
    pub features: Features,
    /// Compatibility strategies.
    pub compat: Compat,
}

impl TargetProfile {
    /// Native vector width in bytes.
    #[inline]
    pub fn native_bytes(&self) -> u32 {
        self.native_width / 8
    }

    /// Whether `flag` is natively available.
    #[inline]
    pub fn feature(&self, flag: Features) -> bool {
        self.features.contains(flag)
    }

    /// Whether `elem` is supported.
    pub fn supports(&self, elem: Elem) -> bool {
        self.elements.contains(&elem)
    }

    /// Addressable logical vector registers when each token expands to
    /// `replicas` physical registers.
    #[inline]
    pub fn vreg_capacity(&self, replicas: u32) -> u8 {
        (self.vreg_count as u32 / replicas.max(1)) as u8
    }

    /// Resolve a vector token to the physical register of `replica`.
    ///
    /// Replica `r` of logical index `i` lives at `i + r * capacity`, so the
    /// low lane group of every token occupies the lowest registers.
    ///
    /// # Errors
    ///
    /// `UnsupportedRegister` if `token.index` exceeds the capacity at this
    /// replica count.
    pub fn resolve_vreg(&self, token: VReg, replicas: u32, replica: u32) -> Result<u8, EncodeError> {
        let capacity = self.vreg_capacity(replicas);
        if token.index >= capacity {
            return Err(EncodeError::UnsupportedRegister {
                kind: 'v',
                role: token.role,
                index: token.index,
                capacity,
                target: self.id,
            });
        }
        Ok(token.index + (replica as u8) * capacity)
    }

    /// Resolve a general-register token.
    ///
    /// # Errors
    ///
    /// `UnsupportedRegister` if the index is outside the profile's map.
    pub fn resolve_gpr(&self, token: GReg) -> Result<u8, EncodeError> {
        self.gpr_map
            .get(token.0 as usize)
            .copied()
            .ok_or(EncodeError::UnsupportedRegister {
                kind: 'r',
                role: Role::Src,
                index: token.0,
                capacity: self.gpr_map.len() as u8,
                target: self.id,
            })
    }

    /// Classify a full-native-width access displacement.
    pub fn resolve_displacement(&self, value: i64) -> DispResolution {
        self.resolve_displacement_at(value, self.native_bytes())
    }

    /// Classify a displacement for an access of `access_bytes`.
    ///
    /// Tiers whose scale equals the native vector size (compressed EVEX
    /// disp8) scale with the access size instead.
    pub fn resolve_displacement_at(&self, value: i64, access_bytes: u32) -> DispResolution {
        let native = self.native_bytes();
        classify(
            self.tiers.iter().map(|t| {
                if t.scale as u32 == native && native > 16 {
                    t.with_scale(access_bytes as u8)
                } else {
                    *t
                }
            }),
            value,
        )
    }
}

// ── Shipped profiles ─────────────────────────────────────────

const ALL_ELEMS: &[Elem] = &Elem::ALL;

/// x0..x14, x19..x28
const A64_GPRS: &[u8] = &[
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28,
];

/// r3..r10, r14..r31
const POWER_GPRS: &[u8] = &[
    3, 4, 5, 6, 7, 8, 9, 10, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30,
    31,
];

/// rdi, rsi, rdx, rcx, r8, r9, rbx, rbp, r12..r15
const X86_GPRS: &[u8] = &[7, 6, 2, 1, 8, 9, 3, 5, 12, 13, 14, 15];

const POWER_FEATURES: Features = Features::FMA
    .union(Features::I64_MINMAX)
    .union(Features::I64_SAR)
    .union(Features::I64_CVT)
    .union(Features::RCP_ESTIMATE_F64);

const POWER_COMPAT: Compat = Compat {
    rcp: [Recip::Refine(1), Recip::Refine(2)],
    rsqrt: [Recip::Refine(1), Recip::Divide],
    fma: FmaMode::Native,
};

const AVX_COMPAT: Compat = Compat {
    rcp: [Recip::Refine(1), Recip::Divide],
    rsqrt: [Recip::Divide, Recip::Divide],
    fma: FmaMode::Native,
};

/// AArch64 AdvSIMD.
pub const A64_NEON: TargetProfile = TargetProfile {
    id: TargetId::A64Neon,
    family: Family::Aarch64,
    native_width: 128,
    lengths: &[128],
    vreg_count: 28,
    scratch_vregs: [28, 29, 30, 31],
    scratch_mask: None,
    gpr_map: A64_GPRS,
    scratch_gprs: [15, 16, 17],
    stack_gpr: 31,
    reg_layout: RegLayout {
        base_bits: 5,
        ext: Ext::None,
    },
    elements: ALL_ELEMS,
    // LDUR simm9, then LDR uimm12 scaled by the access size.
    tiers: &[Tier::signed(9), Tier::scaled(12, false, 16)],
    features: Features::FMA
        .union(Features::I64_SAR)
        .union(Features::I64_CVT)
        .union(Features::RCP_ESTIMATE_F64),
    compat: Compat {
        rcp: [Recip::Refine(2), Recip::Refine(3)],
        rsqrt: [Recip::Refine(2), Recip::Refine(3)],
        fma: FmaMode::Native,
    },
};

/// POWER8 VMX/VSX.
pub const POWER8: TargetProfile = TargetProfile {
    id: TargetId::Power8,
    family: Family::Power,
    native_width: 128,
    lengths: &[128],
    vreg_count: 28,
    scratch_vregs: [28, 29, 30, 31],
    scratch_mask: None,
    gpr_map: POWER_GPRS,
    scratch_gprs: [11, 12, 0],
    stack_gpr: 1,
    reg_layout: RegLayout {
        base_bits: 5,
        ext: Ext::HighBitSplit,
    },
    elements: ALL_ELEMS,
    // li r11, disp + indexed access.
    tiers: &[Tier::signed(16)],
    features: POWER_FEATURES,
    compat: POWER_COMPAT,
};

/// POWER10 VMX/VSX.
pub const POWER10: TargetProfile = TargetProfile {
    id: TargetId::Power10,
    tiers: &[Tier::scaled(12, true, 16), Tier::signed(16)],
    features: POWER_FEATURES
        .union(Features::INT_DIV)
        .union(Features::I64_MUL)
        .union(Features::DQ_LOADS),
    ..POWER8
};

/// x86-64 AVX, 128-bit.
pub const X64_AVX128: TargetProfile = TargetProfile {
    id: TargetId::X64Avx128,
    family: Family::X86,
    native_width: 128,
    lengths: &[128],
    vreg_count: 12,
    scratch_vregs: [12, 13, 14, 15],
    scratch_mask: None,
    gpr_map: X86_GPRS,
    scratch_gprs: [10, 11, 0],
    stack_gpr: 4,
    reg_layout: RegLayout {
        base_bits: 3,
        ext: Ext::RexEvex,
    },
    elements: ALL_ELEMS,
    tiers: &[Tier::signed(8), Tier::signed(32)],
    features: Features::empty(),
    compat: Compat {
        fma: FmaMode::Split,
        ..AVX_COMPAT
    },
};

/// x86-64 AVX2 + FMA, 256-bit.
pub const X64_AVX256: TargetProfile = TargetProfile {
    id: TargetId::X64Avx256,
    native_width: 256,
    lengths: &[128, 256],
    features: Features::FMA,
    compat: AVX_COMPAT,
    ..X64_AVX128
};

/// x86-64 AVX-512 (F, DQ, VL), 512-bit.
pub const X64_AVX512: TargetProfile = TargetProfile {
    id: TargetId::X64Avx512,
    native_width: 512,
    lengths: &[128, 256, 512],
    vreg_count: 28,
    scratch_vregs: [28, 29, 30, 31],
    scratch_mask: Some(1),
    // Compressed disp8 scaled by the vector size, then disp32.
    tiers: &[Tier::scaled(8, true, 64), Tier::signed(32)],
    features: Features::FMA
        .union(Features::I64_MUL)
        .union(Features::I64_MINMAX)
        .union(Features::I64_SAR)
        .union(Features::I64_CVT)
        .union(Features::RCP_ESTIMATE_F64)
        .union(Features::MASK_REGS),
    compat: Compat {
        rcp: [Recip::Refine(1), Recip::Refine(2)],
        rsqrt: [Recip::Refine(1), Recip::Refine(2)],
        fma: FmaMode::Native,
    },
    ..X64_AVX128
};

// ── Compile-time selection ───────────────────────────────────

mod sealed {
    pub trait Sealed {}
}

/// A build-time target selection.
///
/// Implemented only by the zero-sized profile markers in this module.
pub trait Target: sealed::Sealed + Copy + Default + fmt::Debug + 'static {
    /// The profile table.
    const PROFILE: &'static TargetProfile;
    /// Family template encoder.
    type Isa: crate::isa::Isa;
}

macro_rules! target_marker {
    ($(#[$meta:meta])* $feature:literal, $name:ident, $profile:ident, $isa:ty) => {
        $(#[$meta])*
        #[cfg(feature = $feature)]
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
        pub struct $name;

        #[cfg(feature = $feature)]
        impl sealed::Sealed for $name {}

        #[cfg(feature = $feature)]
        impl Target for $name {
            const PROFILE: &'static TargetProfile = &$profile;
            type Isa = $isa;
        }
    };
}

target_marker!(
    /// AArch64 AdvSIMD target.
    "a64", A64Neon, A64_NEON, crate::aarch64::AdvSimd
);
target_marker!(
    /// POWER8 target.
    "power", Power8, POWER8, crate::power::Vsx
);
target_marker!(
    /// POWER10 target.
    "power", Power10, POWER10, crate::power::Vsx
);
target_marker!(
    /// x86-64 AVX 128-bit target.
    "x86", X64Avx128, X64_AVX128, crate::x86::Avx
);
target_marker!(
    /// x86-64 AVX2 256-bit target.
    "x86", X64Avx256, X64_AVX256, crate::x86::Avx
);
target_marker!(
    /// x86-64 AVX-512 target.
    "x86", X64Avx512, X64_AVX512, crate::x86::Avx
);

/// The profile matching the architecture and target features this crate
/// is compiled for.
#[cfg(all(
    feature = "x86",
    target_arch = "x86_64",
    target_feature = "avx512f",
    target_feature = "avx512dq",
    target_feature = "avx512vl"
))]
pub type Host = X64Avx512;

/// The profile matching the architecture and target features this crate
/// is compiled for.
#[cfg(all(
    feature = "x86",
    target_arch = "x86_64",
    target_feature = "avx2",
    target_feature = "fma",
    not(all(
        target_feature = "avx512f",
        target_feature = "avx512dq",
        target_feature = "avx512vl"
    ))
))]
pub type Host = X64Avx256;

/// The profile matching the architecture and target features this crate
/// is compiled for.
#[cfg(all(
    feature = "x86",
    target_arch = "x86_64",
    not(all(target_feature = "avx2", target_feature = "fma")),
    not(all(
        target_feature = "avx512f",
        target_feature = "avx512dq",
        target_feature = "avx512vl"
    ))
))]
pub type Host = X64Avx128;

/// The profile matching the architecture and target features this crate
/// is compiled for.
#[cfg(all(feature = "a64", target_arch = "aarch64"))]
pub type Host = A64Neon;

/// The profile matching the architecture and target features this crate
/// is compiled for.
#[cfg(all(
    feature = "power",
    target_arch = "powerpc64",
    target_endian = "little",
    target_feature = "power10-vector"
))]
pub type Host = Power10;

/// The profile matching the architecture and target features this crate
/// is compiled for.
#[cfg(all(
    feature = "power",
    target_arch = "powerpc64",
    target_endian = "little",
    not(target_feature = "power10-vector")
))]
pub type Host = Power8;
