//! # vecasm: Retargetable SIMD Instruction Encoder
//!
//! `vecasm` turns one portable vocabulary of vector operations into native
//! machine code for AArch64 AdvSIMD, POWER8/POWER10 VMX/VSX (ppc64le), and
//! x86-64 AVX/AVX2/AVX-512. The target is chosen at build time through a
//! zero-sized profile type; no dispatch happens inside the encoder.
//!
//! ## Quick Start
//!
//! ```rust
//! # #[cfg(feature = "x86")] {
//! use vecasm::{assemble, X64Avx256};
//!
//! let code = assemble::<X64Avx256>("add.f32 v0, v1, v2\nret").unwrap();
//! assert_eq!(code, [0xC5, 0xF4, 0x58, 0xC2, 0xC3]);
//! # }
//! ```
//!
//! ## Model
//!
//! - **Instruction macros** ([`Instr`]): an [`Op`], an element type, a
//!   logical [`Width`], and up to three operand tokens.
//! - **Logical registers** ([`VReg`], [`GReg`]) are resolved against the
//!   active [`TargetProfile`] only at encode time.
//! - **Width composition**: a macro wider than the native vector is issued
//!   as consecutive replicas over disjoint physical registers.
//! - **Fallbacks**: ops without a native form become short sequences
//!   (Newton-Raphson refinement, split FMA, per-lane scalar loops), each
//!   reporting its [`ClobberSet`].
//! - **Predicate reduction**: [`reduce_and_branch`] folds a compare mask
//!   into a conditional branch.
//!
//! ## Text syntax
//!
//! ```text
//! loop:
//!     ld.f32.w512   v0, [r0 + r2*4]
//!     cmplt.f32.w512 v1, v0, v2
//!     jnone.w512    v1, done      # no lane below the threshold
//!     add.f32.w512  v3, v0        // destructive two-operand form
//!     jmp loop
//! done:
//!     ret
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
// ── Pedantic lint policy ─────────────────────────────────────────────────
// An encoder packs register codes and displacements into bit-fields, so
// narrowing casts between integer widths and dense hex literals (0x4E20D400)
// are everywhere. The lints below are expected in this context.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::cast_possible_wrap,
    clippy::unreadable_literal,
    clippy::match_same_arms,
    clippy::redundant_closure_for_method_calls,
    clippy::bool_to_int_with_if,
    clippy::wildcard_imports,
    clippy::enum_glob_use,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args,
    clippy::doc_markdown,
    clippy::similar_names,
    clippy::too_many_lines,
    clippy::too_many_arguments,
    clippy::single_match_else,
    clippy::manual_let_else,
    clippy::unnecessary_wraps,
    clippy::many_single_char_names,
    clippy::return_self_not_must_use,
    clippy::missing_errors_doc,
    clippy::new_without_default
)]

extern crate alloc;

#[cfg(feature = "a64")]
pub(crate) mod aarch64;
/// Runtime check that the CPU can execute code for a profile.
#[cfg(feature = "std")]
pub mod capability;
/// Compatibility/fallback planning and composition.
pub mod compat;
/// Builder-pattern encoder with labels, branches, and resource limits.
pub mod encoder;
/// Error types and source-span diagnostics.
pub mod error;
/// Emitted fragments, clobber sets, labels, and the emission stream.
pub mod fragment;
/// Instruction macros: ops, element types, widths, operand forms.
pub mod ir;
/// Per-family encoder interface and encode context.
pub mod isa;
mod issue;
/// Lexer for the text front end.
pub mod lexer;
/// Operand and addressing model.
pub mod operand;
/// Parser for the text front end.
pub mod parser;
#[cfg(feature = "power")]
pub(crate) mod power;
/// Target profiles and compile-time target selection.
pub mod profile;
mod reduce;
/// Declarative fixed-width instruction-word templates.
pub mod template;
#[cfg(feature = "x86")]
pub(crate) mod x86;

// Re-exports
pub use compat::{plan, Plan};
pub use encoder::{self_check, Encoder, ResourceLimits};
pub use error::{EncodeError, Span};
pub use fragment::{
    ClobberSet, Displacement, Emission, EmissionStream, Fixup, FixupKind, Fragment, InstrBytes,
    Label,
};
pub use ir::{Arity, Class, Cond, Elem, Form, Instr, Mnemonic, Op, OperandList, Rm, Width};
pub use issue::{composition, issue};
pub use operand::{DispResolution, GReg, Mem, Operand, Role, Scale, Tier, VReg};
#[cfg(any(
    all(feature = "x86", target_arch = "x86_64"),
    all(feature = "a64", target_arch = "aarch64"),
    all(feature = "power", target_arch = "powerpc64", target_endian = "little")
))]
pub use profile::Host;
pub use profile::{
    Compat, Ext, Family, Features, FmaMode, Recip, RegLayout, Target, TargetId, TargetProfile,
    A64_NEON, POWER10, POWER8, X64_AVX128, X64_AVX256, X64_AVX512,
};
#[cfg(feature = "a64")]
pub use profile::A64Neon;
#[cfg(feature = "power")]
pub use profile::{Power10, Power8};
#[cfg(feature = "x86")]
pub use profile::{X64Avx128, X64Avx256, X64Avx512};
pub use reduce::reduce_and_branch;
pub use template::{Field, WordTemplate};

use alloc::vec::Vec;

/// Encode source text for target `T` into machine code.
///
/// Newlines or semicolons separate statements; labels are defined with a
/// trailing colon.
///
/// # Errors
///
/// Returns [`EncodeError`] for syntax errors, unknown mnemonics, invalid
/// operands, operations the target cannot express, and unbound labels.
///
/// # Examples
///
/// ```rust
/// # #[cfg(feature = "a64")] {
/// use vecasm::{assemble, A64Neon};
///
/// let code = assemble::<A64Neon>("ret").unwrap();
/// assert_eq!(code, [0xC0, 0x03, 0x5F, 0xD6]);
/// # }
/// ```
pub fn assemble<T: Target>(source: &str) -> Result<Vec<u8>, EncodeError> {
    let mut enc = Encoder::<T>::new();
    enc.emit_str(source)?;
    enc.finish()
}
