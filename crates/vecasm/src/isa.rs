//! Family encoder interface.
//!
//! Each instruction-set family implements [`Isa`] over physical register
//! codes. The issuer and the compatibility composer drive it through a
//! [`Cx`], which accumulates fragments and tags them with the clobbers of
//! the sequence currently being built.

use crate::error::EncodeError;
use crate::fragment::{ClobberSet, Emission, Fragment, Label};
use crate::ir::{Cond, Elem, Form, Op, Rm};
use crate::operand::Scale;
use crate::profile::TargetProfile;

/// Resolved memory operand: physical base/index codes and the final byte
/// displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Addr {
    /// Base register code.
    pub base: u8,
    /// Index register code and scale.
    pub index: Option<(u8, Scale)>,
    /// Byte displacement.
    pub disp: i64,
}

impl Addr {
    /// `[base + disp]`.
    pub fn new(base: u8, disp: i64) -> Self {
        Self {
            base,
            index: None,
            disp,
        }
    }
}

/// Operand form over physical registers.
pub type PForm = Form<u8, Addr>;

/// Register-or-memory source over physical registers.
pub type Src = Rm<u8, Addr>;

/// Splat constants used by fallback sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Konst {
    /// `1.0` in every lane.
    One,
    /// `0.5` in every lane.
    Half,
    /// Every bit set.
    AllOnes,
}

/// Which reciprocal a refinement sequence computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipKind {
    /// `1 / x`
    Rcp,
    /// `1 / sqrt(x)`
    Rsqrt,
}

impl RecipKind {
    /// Hardware estimate op for this kind.
    pub fn estimate(self) -> Op {
        match self {
            RecipKind::Rcp => Op::RcpEst,
            RecipKind::Rsqrt => Op::RsqrtEst,
        }
    }
}

/// Scalar operation applied per lane by a lane loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarOp {
    /// Truncating signed divide.
    Div,
    /// Signed remainder (sign of the dividend).
    Rem,
    /// Wrapping multiply.
    Mul,
}

// ── Encode context ───────────────────────────────────────────

/// Encode context for one macro call.
pub struct Cx<'p> {
    /// Active profile.
    pub profile: &'p TargetProfile,
    /// Encoded vector length in bits for this call (≤ native width).
    pub len: u32,
    out: Emission,
    clobbers: ClobberSet,
}

impl<'p> Cx<'p> {
    /// Fresh context.
    pub fn new(profile: &'p TargetProfile, len: u32) -> Self {
        Self {
            profile,
            len,
            out: Emission::new(),
            clobbers: ClobberSet::NONE,
        }
    }

    /// Vector length in bytes.
    #[inline]
    pub fn bytes(&self) -> u32 {
        self.len / 8
    }

    /// Scratch vector register `i` (s0..s3).
    #[inline]
    pub fn scratch(&self, i: usize) -> u8 {
        self.profile.scratch_vregs[i]
    }

    /// Scratch general register `i`.
    #[inline]
    pub fn sgpr(&self, i: usize) -> u8 {
        self.profile.scratch_gprs[i]
    }

    /// Append a fragment, tagged with the active sequence clobbers.
    pub fn push(&mut self, frag: Fragment) {
        self.out.push(frag.with_clobbers(self.clobbers));
    }

    /// Append a fragment with extra clobbers.
    pub fn push_with(&mut self, frag: Fragment, clobbers: ClobberSet) {
        self.push(frag.with_clobbers(clobbers));
    }

    /// Run `f` with `clobbers` added to every fragment it appends.
    pub fn with_clobbers<R>(&mut self, clobbers: ClobberSet, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = self.clobbers;
        self.clobbers = saved.union(clobbers);
        let r = f(self);
        self.clobbers = saved;
        r
    }

    /// Number of fragments appended so far.
    pub fn fragment_count(&self) -> usize {
        self.out.len()
    }

    /// The accumulated emission.
    pub fn finish(self) -> Emission {
        self.out
    }
}

// ── Family interface ─────────────────────────────────────────

/// Template encoder of one instruction-set family.
pub trait Isa {
    /// Whether [`Isa::refine_step`] consumes a materialised constant
    /// (`1.0` for reciprocal, `0.5` for rsqrt) in its `k` register.
    const REFINE_CONST: bool = true;

    /// Encode one op natively. Memory sources on load/store families are
    /// staged through the s3 scratch register.
    fn native(cx: &mut Cx<'_>, op: Op, elem: Elem, form: &PForm) -> Result<(), EncodeError>;

    /// Materialise a constant in every lane of `dst`.
    fn splat(cx: &mut Cx<'_>, elem: Elem, dst: u8, k: Konst) -> Result<(), EncodeError>;

    /// `dst = src` (full vector).
    fn vmove(cx: &mut Cx<'_>, dst: u8, src: u8) -> Result<(), EncodeError> {
        Self::native(cx, Op::Mov, Elem::F32, &Form::Mov { dst, src })
    }

    /// `dst = [mem]` (full vector).
    fn vload(cx: &mut Cx<'_>, elem: Elem, dst: u8, mem: Addr) -> Result<(), EncodeError> {
        Self::native(cx, Op::Load, elem, &Form::Load { dst, mem })
    }

    /// One Newton-Raphson step refining the estimate `x` of the reciprocal
    /// (square root) of `src`, with `t` as temporary and `k` holding the
    /// constant when [`Isa::REFINE_CONST`] is set.
    fn refine_step(
        cx: &mut Cx<'_>,
        kind: RecipKind,
        elem: Elem,
        x: u8,
        src: u8,
        t: u8,
        k: u8,
    ) -> Result<(), EncodeError> {
        let fma = cx.profile.feature(crate::profile::Features::FMA);
        let bin = |dst: u8, a: u8, b: u8| -> PForm {
            Form::Binary {
                dst,
                a,
                b: Rm::Reg(b),
            }
        };
        match kind {
            RecipKind::Rcp if fma => {
                // x += x * (1 - src*x)
                Self::vmove(cx, t, k)?;
                Self::native(cx, Op::Fms, elem, &Form::Fused { acc: t, a: src, b: Rm::Reg(x) })?;
                Self::native(cx, Op::Fma, elem, &Form::Fused { acc: x, a: x, b: Rm::Reg(t) })
            }
            RecipKind::Rcp => {
                Self::native(cx, Op::Mul, elem, &bin(t, src, x))?;
                Self::native(cx, Op::Sub, elem, &bin(t, k, t))?;
                Self::native(cx, Op::Mul, elem, &bin(t, x, t))?;
                Self::native(cx, Op::Add, elem, &bin(x, x, t))
            }
            RecipKind::Rsqrt => {
                // x += x * (0.5 - 0.5*src*x*x)
                Self::native(cx, Op::Mul, elem, &bin(t, x, x))?;
                Self::native(cx, Op::Mul, elem, &bin(t, t, src))?;
                Self::native(cx, Op::Mul, elem, &bin(t, t, k))?;
                Self::native(cx, Op::Sub, elem, &bin(t, k, t))?;
                if fma {
                    Self::native(cx, Op::Fma, elem, &Form::Fused { acc: x, a: x, b: Rm::Reg(t) })
                } else {
                    Self::native(cx, Op::Mul, elem, &bin(t, x, t))?;
                    Self::native(cx, Op::Add, elem, &bin(x, x, t))
                }
            }
        }
    }

    /// Per-lane scalar `dst = a op b` through scratch memory and general
    /// registers.
    fn lane_loop(
        cx: &mut Cx<'_>,
        op: ScalarOp,
        elem: Elem,
        dst: u8,
        a: u8,
        b: &Src,
    ) -> Result<(), EncodeError>;

    /// Reduce the lane mask in `mask` and branch to `label` when `cond`
    /// holds.
    fn reduce_branch(cx: &mut Cx<'_>, mask: u8, cond: Cond, label: Label) -> Result<(), EncodeError>;

    /// Unconditional branch to `label`.
    fn jump(cx: &mut Cx<'_>, label: Label) -> Result<(), EncodeError>;

    /// Return from the procedure.
    fn ret(cx: &mut Cx<'_>) -> Result<(), EncodeError>;
}

/// `UnsupportedOperation` for an op the family has no template for.
pub(crate) fn no_form(cx: &Cx<'_>, op: Op, elem: Elem) -> EncodeError {
    EncodeError::unsupported(
        crate::ir::Mnemonic {
            op,
            elem,
            width: crate::ir::Width::Native,
        },
        cx.profile.id,
    )
}

/// Load a memory source into the s3 staging register; registers pass
/// through unchanged.
pub(crate) fn stage<I: Isa + ?Sized>(cx: &mut Cx<'_>, elem: Elem, src: &Src) -> Result<u8, EncodeError> {
    match *src {
        Rm::Reg(r) => Ok(r),
        Rm::Mem(mem) => {
            let s3 = cx.scratch(3);
            cx.with_clobbers(ClobberSet::vreg(s3), |cx| I::vload(cx, elem, s3, mem))?;
            Ok(s3)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::A64_NEON;

    #[test]
    fn context_tags_clobbers() {
        let mut cx = Cx::new(&A64_NEON, 128);
        cx.push(Fragment::word(1));
        cx.with_clobbers(ClobberSet::vreg(28), |cx| {
            cx.push(Fragment::word(2));
            cx.push_with(Fragment::word(3), ClobberSet::gpr(16));
        });
        cx.push(Fragment::word(4));
        let e = cx.finish();
        let c: alloc::vec::Vec<_> = e.fragments().iter().map(|f| f.clobbers()).collect();
        assert!(c[0].is_empty());
        assert!(c[1].has_vreg(28));
        assert!(c[2].has_vreg(28) && c[2].has_gpr(16));
        assert!(c[3].is_empty());
        assert!(e.clobbers().has_gpr(16));
    }

    #[test]
    fn scratch_lookup() {
        let cx = Cx::new(&A64_NEON, 128);
        assert_eq!(cx.scratch(0), 28);
        assert_eq!(cx.scratch(3), 31);
        assert_eq!(cx.sgpr(1), 16);
        assert_eq!(cx.bytes(), 16);
    }
}
