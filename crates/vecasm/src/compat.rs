//! Compatibility/fallback composer.
//!
//! [`plan`] decides, from the profile's feature flags and compatibility
//! table alone, how an `(op, elem)` pair is produced. [`compose`] then runs
//! that plan against the family encoder for one replica.

use crate::error::EncodeError;
use crate::fragment::ClobberSet;
use crate::ir::{Elem, Form, Op, Rm};
use crate::isa::{no_form, stage, Cx, Isa, Konst, PForm, RecipKind, ScalarOp, Src};
use crate::profile::{Features, FmaMode, Recip, TargetProfile};

/// How one `(op, elem)` pair is produced on a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// A single native template.
    Native,
    /// Hardware estimate plus `steps` Newton-Raphson corrections.
    Refine {
        /// Reciprocal or reciprocal square root.
        kind: RecipKind,
        /// Number of correction steps.
        steps: u8,
    },
    /// Exact `1 / x` or `1 / sqrt(x)` through the divider.
    Divide {
        /// Reciprocal or reciprocal square root.
        kind: RecipKind,
    },
    /// Multiply then add/subtract.
    SplitFma,
    /// Per-lane scalar loop through general registers.
    LaneLoop(ScalarOp),
    /// No native form and no fallback.
    Unsupported,
}

impl Plan {
    /// Whether the plan is a single native template.
    pub fn is_native(self) -> bool {
        matches!(self, Plan::Native)
    }
}

fn recip(mode: Recip, kind: RecipKind) -> Plan {
    match mode {
        Recip::Native => Plan::Refine { kind, steps: 0 },
        Recip::Refine(steps) => Plan::Refine { kind, steps },
        Recip::Divide => Plan::Divide { kind },
    }
}

fn gated(profile: &TargetProfile, flag: Features, otherwise: Plan) -> Plan {
    if profile.feature(flag) {
        Plan::Native
    } else {
        otherwise
    }
}

/// Decide how `op` on `elem` is produced on `profile`.
pub fn plan(profile: &TargetProfile, op: Op, elem: Elem) -> Plan {
    if !op.accepts(elem) || !profile.supports(elem) {
        return Plan::Unsupported;
    }
    let quad = elem == Elem::I64;
    match op {
        Op::Rcp => recip(profile.compat.rcp(elem), RecipKind::Rcp),
        Op::Rsqrt => recip(profile.compat.rsqrt(elem), RecipKind::Rsqrt),
        Op::Fma | Op::Fms => match profile.compat.fma {
            FmaMode::Native if profile.feature(Features::FMA) => Plan::Native,
            FmaMode::Native | FmaMode::Split => Plan::SplitFma,
            FmaMode::Unsupported => Plan::Unsupported,
        },
        Op::Div if !elem.is_float() => gated(profile, Features::INT_DIV, Plan::LaneLoop(ScalarOp::Div)),
        Op::Rem => gated(profile, Features::INT_DIV, Plan::LaneLoop(ScalarOp::Rem)),
        Op::Mul if quad => gated(profile, Features::I64_MUL, Plan::LaneLoop(ScalarOp::Mul)),
        Op::Min | Op::Max if quad => gated(profile, Features::I64_MINMAX, Plan::Unsupported),
        Op::Sar if quad => gated(profile, Features::I64_SAR, Plan::Unsupported),
        Op::CvtToInt if quad => gated(profile, Features::I64_CVT, Plan::Unsupported),
        Op::CvtToFloat if elem == Elem::F64 => {
            gated(profile, Features::I64_CVT, Plan::Unsupported)
        }
        Op::RcpEst | Op::RsqrtEst if elem == Elem::F64 => {
            gated(profile, Features::RCP_ESTIMATE_F64, Plan::Unsupported)
        }
        _ => Plan::Native,
    }
}

/// Emit `plan` for one replica.
///
/// # Errors
///
/// `UnsupportedOperation` for [`Plan::Unsupported`], and any template
/// error from the family encoder.
pub(crate) fn compose<I: Isa>(
    cx: &mut Cx<'_>,
    plan: Plan,
    op: Op,
    elem: Elem,
    form: &PForm,
) -> Result<(), EncodeError> {
    match plan {
        Plan::Native => I::native(cx, op, elem, form),
        Plan::Refine { kind, steps } => match *form {
            Form::Unary { dst, src } => refine::<I>(cx, kind, steps, elem, dst, &src),
            _ => Err(EncodeError::invalid(op, "refinement expects a unary form")),
        },
        Plan::Divide { kind } => match *form {
            Form::Unary { dst, src } => divide::<I>(cx, kind, elem, dst, &src),
            _ => Err(EncodeError::invalid(op, "divide fallback expects a unary form")),
        },
        Plan::SplitFma => match *form {
            Form::Fused { acc, a, b } => split_fma::<I>(cx, op, elem, acc, a, &b),
            _ => Err(EncodeError::invalid(op, "split fma expects a fused form")),
        },
        Plan::LaneLoop(sop) => match *form {
            Form::Binary { dst, a, b } => I::lane_loop(cx, sop, elem, dst, a, &b),
            _ => Err(EncodeError::invalid(op, "lane loop expects a binary form")),
        },
        Plan::Unsupported => Err(no_form(cx, op, elem)),
    }
}

fn seq_clobbers(cx: &Cx<'_>, n: usize) -> ClobberSet {
    (0..n).fold(ClobberSet::NONE, |c, i| c | ClobberSet::vreg(cx.scratch(i)))
}

fn refine<I: Isa>(
    cx: &mut Cx<'_>,
    kind: RecipKind,
    steps: u8,
    elem: Elem,
    dst: u8,
    src: &Src,
) -> Result<(), EncodeError> {
    let (s0, s1, s2) = (cx.scratch(0), cx.scratch(1), cx.scratch(2));
    let clobbers = seq_clobbers(cx, if I::REFINE_CONST { 3 } else { 2 });
    cx.with_clobbers(clobbers, |cx| {
        let s = stage::<I>(cx, elem, src)?;
        I::native(
            cx,
            kind.estimate(),
            elem,
            &Form::Unary {
                dst: s0,
                src: Rm::Reg(s),
            },
        )?;
        if I::REFINE_CONST {
            let k = match kind {
                RecipKind::Rcp => Konst::One,
                RecipKind::Rsqrt => Konst::Half,
            };
            I::splat(cx, elem, s2, k)?;
        }
        for _ in 0..steps {
            I::refine_step(cx, kind, elem, s0, s, s1, s2)?;
        }
        I::vmove(cx, dst, s0)
    })
}

fn divide<I: Isa>(
    cx: &mut Cx<'_>,
    kind: RecipKind,
    elem: Elem,
    dst: u8,
    src: &Src,
) -> Result<(), EncodeError> {
    let (s0, s1) = (cx.scratch(0), cx.scratch(1));
    let clobbers = seq_clobbers(cx, 2);
    cx.with_clobbers(clobbers, |cx| {
        let divisor = match kind {
            RecipKind::Rcp => *src,
            RecipKind::Rsqrt => {
                I::native(cx, Op::Sqrt, elem, &Form::Unary { dst: s1, src: *src })?;
                Rm::Reg(s1)
            }
        };
        I::splat(cx, elem, s0, Konst::One)?;
        I::native(
            cx,
            Op::Div,
            elem,
            &Form::Binary {
                dst,
                a: s0,
                b: divisor,
            },
        )
    })
}

fn split_fma<I: Isa>(
    cx: &mut Cx<'_>,
    op: Op,
    elem: Elem,
    acc: u8,
    a: u8,
    b: &Src,
) -> Result<(), EncodeError> {
    let s0 = cx.scratch(0);
    let combine = if op == Op::Fms { Op::Sub } else { Op::Add };
    cx.with_clobbers(ClobberSet::vreg(s0), |cx| {
        I::native(cx, Op::Mul, elem, &Form::Binary { dst: s0, a, b: *b })?;
        I::native(
            cx,
            combine,
            elem,
            &Form::Binary {
                dst: acc,
                a: acc,
                b: Rm::Reg(s0),
            },
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{A64_NEON, POWER10, POWER8, X64_AVX128, X64_AVX256, X64_AVX512};

    #[test]
    fn integer_divide_plans() {
        assert_eq!(
            plan(&A64_NEON, Op::Div, Elem::I32),
            Plan::LaneLoop(ScalarOp::Div)
        );
        assert_eq!(plan(&POWER10, Op::Div, Elem::I32), Plan::Native);
        assert_eq!(
            plan(&POWER8, Op::Rem, Elem::I64),
            Plan::LaneLoop(ScalarOp::Rem)
        );
        assert_eq!(
            plan(&X64_AVX512, Op::Div, Elem::I64),
            Plan::LaneLoop(ScalarOp::Div)
        );
        assert_eq!(plan(&X64_AVX256, Op::Div, Elem::F32), Plan::Native);
    }

    #[test]
    fn i64_multiply_plans() {
        assert_eq!(plan(&X64_AVX512, Op::Mul, Elem::I64), Plan::Native);
        assert_eq!(
            plan(&X64_AVX256, Op::Mul, Elem::I64),
            Plan::LaneLoop(ScalarOp::Mul)
        );
        assert_eq!(plan(&A64_NEON, Op::Mul, Elem::I32), Plan::Native);
    }

    #[test]
    fn reciprocal_plans_follow_compat_table() {
        assert_eq!(
            plan(&A64_NEON, Op::Rcp, Elem::F32),
            Plan::Refine {
                kind: RecipKind::Rcp,
                steps: 2
            }
        );
        assert_eq!(
            plan(&POWER8, Op::Rsqrt, Elem::F64),
            Plan::Divide {
                kind: RecipKind::Rsqrt
            }
        );
        assert_eq!(
            plan(&X64_AVX256, Op::Rcp, Elem::F64),
            Plan::Divide {
                kind: RecipKind::Rcp
            }
        );
    }

    #[test]
    fn fma_plans() {
        assert_eq!(plan(&X64_AVX128, Op::Fma, Elem::F32), Plan::SplitFma);
        assert_eq!(plan(&X64_AVX256, Op::Fms, Elem::F64), Plan::Native);
        assert_eq!(plan(&POWER8, Op::Fma, Elem::F32), Plan::Native);
    }

    #[test]
    fn unsupported_gaps() {
        assert_eq!(plan(&X64_AVX256, Op::Min, Elem::I64), Plan::Unsupported);
        assert_eq!(plan(&X64_AVX256, Op::Sar, Elem::I64), Plan::Unsupported);
        assert_eq!(plan(&X64_AVX256, Op::CvtToInt, Elem::I64), Plan::Unsupported);
        assert_eq!(plan(&X64_AVX256, Op::CvtToFloat, Elem::F64), Plan::Unsupported);
        assert_eq!(plan(&X64_AVX256, Op::RcpEst, Elem::F64), Plan::Unsupported);
        assert_eq!(plan(&A64_NEON, Op::Max, Elem::I64), Plan::Unsupported);
        assert_eq!(plan(&X64_AVX512, Op::Min, Elem::I64), Plan::Native);
        assert_eq!(plan(&POWER8, Op::Max, Elem::I64), Plan::Native);
    }

    #[test]
    fn element_mismatch_is_unsupported() {
        assert_eq!(plan(&A64_NEON, Op::Sqrt, Elem::I32), Plan::Unsupported);
        assert_eq!(plan(&A64_NEON, Op::Shl, Elem::F32), Plan::Unsupported);
    }

    #[test]
    fn plain_arithmetic_is_native_everywhere() {
        for id in crate::profile::TargetId::ALL {
            let p = id.profile();
            for op in [Op::Add, Op::Sub, Op::Mul, Op::And, Op::Xor, Op::CmpLt] {
                assert_eq!(plan(p, op, Elem::F32), Plan::Native, "{} {}", id, op);
                assert_eq!(plan(p, op, Elem::I32), Plan::Native, "{} {}", id, op);
            }
        }
    }
}
