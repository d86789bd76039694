//! Width-composition issuer.
//!
//! A macro requested at a logical width above the native width is issued
//! as `logical / native` replicas. Replica `i` reads and writes the `i`-th
//! physical sub-register of every token and moves every memory operand by
//! `i` vector lengths. Replicas are emitted low lane group first.

use crate::compat::{self, Plan};
use crate::error::EncodeError;
use crate::fragment::Emission;
use crate::ir::Instr;
use crate::isa::{Addr, Cx};
use crate::operand::Mem;
use crate::profile::{Target, TargetProfile};

/// Split a logical width into `(encoded length, replica count)`.
///
/// # Errors
///
/// `WidthMismatch` if the logical width is not a whole multiple of an
/// encodable length.
pub fn composition(profile: &TargetProfile, logical: u32) -> Result<(u32, u32), EncodeError> {
    let len = logical.min(profile.native_width);
    if !profile.lengths.contains(&len) || logical % len != 0 {
        return Err(EncodeError::WidthMismatch {
            logical,
            native: profile.native_width,
            target: profile.id,
        });
    }
    Ok((len, logical / len))
}

pub(crate) fn resolve_mem(profile: &TargetProfile, mem: Mem, delta: i64) -> Result<Addr, EncodeError> {
    let index = match mem.index {
        Some((r, s)) => Some((profile.resolve_gpr(r)?, s)),
        None => None,
    };
    let moved = mem.checked_offset(delta).ok_or(EncodeError::FieldOverflow {
        field: "disp",
        value: mem.disp,
        min: i64::MIN,
        max: i64::MAX - delta,
    })?;
    Ok(Addr {
        base: profile.resolve_gpr(mem.base)?,
        index,
        disp: moved.disp,
    })
}

/// Encode one instruction macro for target `T`.
///
/// # Errors
///
/// Operand validation errors from [`Instr::form`], `WidthMismatch`,
/// `UnsupportedRegister`, `UnsupportedOperation`, and `FieldOverflow`.
///
/// # Examples
///
/// ```rust
/// # #[cfg(feature = "x86")] {
/// use vecasm::{issue, Elem, Instr, Op, VReg, Width, X64Avx256};
///
/// let add = Instr::new(
///     Op::Add,
///     Elem::F32,
///     &[VReg::dst(0).into(), VReg::src(1).into(), VReg::src2(2).into()],
/// );
/// let e = issue::<X64Avx256>(&add).unwrap();
/// assert_eq!(e.bytes(), [0xC5, 0xF4, 0x58, 0xC2]);
///
/// // 512 bits on a 256-bit target: two replicas.
/// let wide = issue::<X64Avx256>(&add.at(Width::W512)).unwrap();
/// assert_eq!(wide.len(), 2);
/// # }
/// ```
pub fn issue<T: Target>(instr: &Instr) -> Result<Emission, EncodeError> {
    issue_with::<T::Isa>(T::PROFILE, instr)
}

pub(crate) fn issue_with<I: crate::isa::Isa>(
    profile: &TargetProfile,
    instr: &Instr,
) -> Result<Emission, EncodeError> {
    let form = instr.form()?;
    let logical = instr.width.bits(profile.native_width);
    let (len, replicas) = composition(profile, logical)?;
    let plan = compat::plan(profile, instr.op, instr.elem);
    if plan == Plan::Unsupported {
        return Err(EncodeError::unsupported(instr.mnemonic(), profile.id));
    }
    if !plan.is_native() {
        log::debug!("{}: {} via {:?}", profile.id, instr.mnemonic(), plan);
    }

    let mut cx = Cx::new(profile, len);
    let step = i64::from(len / 8);
    for replica in 0..replicas {
        let resolved = form.try_map(
            |v| profile.resolve_vreg(v, replicas, replica),
            |m| resolve_mem(profile, m, i64::from(replica) * step),
        )?;
        compat::compose::<I>(&mut cx, plan, instr.op, instr.elem, &resolved)?;
    }
    let e = cx.finish();
    log::trace!(
        "{}: {} -> {} fragment(s), {} byte(s)",
        profile.id,
        instr,
        e.len(),
        e.fragments().iter().map(|f| f.bytes().len()).sum::<usize>()
    );
    Ok(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{A64_NEON, X64_AVX256, X64_AVX512};

    #[test]
    fn composition_counts() {
        assert_eq!(composition(&A64_NEON, 128), Ok((128, 1)));
        assert_eq!(composition(&A64_NEON, 512), Ok((128, 4)));
        assert_eq!(composition(&X64_AVX256, 128), Ok((128, 1)));
        assert_eq!(composition(&X64_AVX256, 1024), Ok((256, 4)));
        assert_eq!(composition(&X64_AVX512, 256), Ok((256, 1)));
        assert_eq!(
            composition(&A64_NEON, 64),
            Err(EncodeError::WidthMismatch {
                logical: 64,
                native: 128,
                target: crate::profile::TargetId::A64Neon,
            })
        );
    }

    #[test]
    fn memory_resolution_adds_delta() {
        let m = Mem::indexed(crate::operand::GReg(0), crate::operand::GReg(1), crate::operand::Scale::S4, 8);
        let a = resolve_mem(&X64_AVX256, m, 32).unwrap();
        assert_eq!(a.base, 7);
        assert_eq!(a.index, Some((6, crate::operand::Scale::S4)));
        assert_eq!(a.disp, 40);
    }

    #[test]
    fn replica_displacement_overflow_is_an_error() {
        let m = Mem::new(crate::operand::GReg(0), i64::MAX - 8);
        assert!(resolve_mem(&X64_AVX256, m, 8).is_ok());
        assert!(matches!(
            resolve_mem(&X64_AVX256, m, 32),
            Err(EncodeError::FieldOverflow { field: "disp", .. })
        ));
    }
}
