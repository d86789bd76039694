//! Predicate reduction: lane mask → conditional branch.
//!
//! A mask is the output of a compare macro: every lane is either all ones
//! or all zeros. Masks wider than the native width are first folded into
//! the s0 scratch register (AND for [`Cond::AllLanes`], OR for
//! [`Cond::NoLanes`]), then the family's native reduction sets a scalar
//! condition that the branch tests. A partially satisfied mask takes
//! neither branch.

use crate::error::EncodeError;
use crate::fragment::{ClobberSet, Emission, Label};
use crate::ir::{Cond, Elem, Form, Op, Rm, Width};
use crate::isa::{Cx, Isa};
use crate::issue::composition;
use crate::operand::VReg;
use crate::profile::{Target, TargetProfile};

/// Branch to `label` when every (or no) lane of `mask` is set.
///
/// # Errors
///
/// `RoleMismatch` if `mask` is a destination-only token, plus the
/// register and width errors of the issuer.
pub fn reduce_and_branch<T: Target>(
    mask: VReg,
    width: Width,
    cond: Cond,
    label: Label,
) -> Result<Emission, EncodeError> {
    reduce_with::<T::Isa>(T::PROFILE, mask, width, cond, label)
}

pub(crate) fn reduce_with<I: Isa>(
    profile: &TargetProfile,
    mask: VReg,
    width: Width,
    cond: Cond,
    label: Label,
) -> Result<Emission, EncodeError> {
    if !mask.role.readable() {
        return Err(EncodeError::RoleMismatch {
            mnemonic: alloc::format!("{:?}", cond),
            position: 0,
            expected: "source",
            found: mask.role,
        });
    }
    let logical = width.bits(profile.native_width);
    let (len, replicas) = composition(profile, logical)?;
    let mut cx = Cx::new(profile, len);
    let mut reg = profile.resolve_vreg(mask, replicas, 0)?;
    if replicas > 1 {
        let s0 = cx.scratch(0);
        let fold = match cond {
            Cond::AllLanes => Op::And,
            Cond::NoLanes => Op::Or,
        };
        let mut acc = reg;
        for r in 1..replicas {
            let next = profile.resolve_vreg(mask, replicas, r)?;
            cx.with_clobbers(ClobberSet::vreg(s0), |cx| {
                I::native(
                    cx,
                    fold,
                    Elem::I32,
                    &Form::Binary {
                        dst: s0,
                        a: acc,
                        b: Rm::Reg(next),
                    },
                )
            })?;
            acc = s0;
        }
        reg = s0;
    }
    I::reduce_branch(&mut cx, reg, cond, label)?;
    let e = cx.finish();
    log::trace!(
        "{}: branch on {:?} of v{} ({} bits) -> {} fragment(s)",
        profile.id,
        cond,
        mask.index,
        logical,
        e.len()
    );
    Ok(e)
}
