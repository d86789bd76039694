//! AArch64 AdvSIMD template encoder.
//!
//! Every instruction is one 32-bit little-endian word built from a
//! [`WordTemplate`]. Vector operations use the 128-bit arrangements only
//! (`.4s` for 32-bit lanes, `.2d` for 64-bit lanes, `.16b` for bitwise).
//!
//! ## Encoding classes
//!
//! - **Three-same**: FADD/ADD/… with `Rd`, `Rn`, `Rm` and a size field
//!   (`sz` at bit 22 for float, `size` at bits 22–23 for integer)
//! - **Two-register misc**: FSQRT, FRECPE, FCVTZS, SCVTF, MVN
//! - **Shift by immediate**: SHL/USHR/SSHR with `immh:immb` at bit 16
//! - **Load/store**: LDUR/STUR (simm9), LDR/STR (uimm12 × 16), register
//!   offset for synthesised addresses
//! - **Scalar**: MOVZ/MOVN/MOVK, ADD (shifted), SDIV/MUL/MSUB, B/B.cond/CBZ

use crate::error::EncodeError;
use crate::fragment::{ClobberSet, Displacement, Fixup, FixupKind, Fragment, Label};
use crate::ir::{Cond, Elem, Form, Op, Rm};
use crate::isa::{no_form, stage, Addr, Cx, Isa, Konst, PForm, RecipKind, ScalarOp, Src};
use crate::operand::DispResolution;
use crate::template::{Field, WordTemplate};

// ── Field tables ─────────────────────────────────────────────────────────

const RD: Field = Field::u("rd", 0, 5);
const RN: Field = Field::u("rn", 5, 5);
const RM: Field = Field::u("rm", 16, 5);
const SZ: Field = Field::u("sz", 22, 1);
const SIZE: Field = Field::u("size", 22, 2);

const FP3: &[Field] = &[RD, RN, RM, SZ];
const INT3: &[Field] = &[RD, RN, RM, SIZE];
const BIT3: &[Field] = &[RD, RN, RM];
const FP2: &[Field] = &[RD, RN, SZ];
const BIT2: &[Field] = &[RD, RN];
const SHIFT: &[Field] = &[RD, RN, Field::u("immhb", 16, 7)];
const ONLY_RD: &[Field] = &[RD];
const UIMM12: &[Field] = &[RD, RN, Field::u("imm12", 10, 12)];
const SIMM9: &[Field] = &[RD, RN, Field::s("imm9", 12, 9)];
const ADD_LSL: &[Field] = &[RD, RN, Field::u("imm6", 10, 6), RM];
const MOVW: &[Field] = &[RD, Field::u("imm16", 5, 16), Field::u("hw", 21, 2)];
const DP3: &[Field] = &[RD, RN, Field::u("ra", 10, 5), RM];
const BCOND: &[Field] = &[Field::u("cond", 0, 4)];

// ── Vector templates ─────────────────────────────────────────────────────

const FADD: WordTemplate = WordTemplate::new("fadd", 0x4E20D400, FP3);
const FSUB: WordTemplate = WordTemplate::new("fsub", 0x4EA0D400, FP3);
const FMUL: WordTemplate = WordTemplate::new("fmul", 0x6E20DC00, FP3);
const FDIV: WordTemplate = WordTemplate::new("fdiv", 0x6E20FC00, FP3);
const FMAX: WordTemplate = WordTemplate::new("fmax", 0x4E20F400, FP3);
const FMIN: WordTemplate = WordTemplate::new("fmin", 0x4EA0F400, FP3);
const FMLA: WordTemplate = WordTemplate::new("fmla", 0x4E20CC00, FP3);
const FMLS: WordTemplate = WordTemplate::new("fmls", 0x4EA0CC00, FP3);
const FCMEQ: WordTemplate = WordTemplate::new("fcmeq", 0x4E20E400, FP3);
const FCMGE: WordTemplate = WordTemplate::new("fcmge", 0x6E20E400, FP3);
const FCMGT: WordTemplate = WordTemplate::new("fcmgt", 0x6EA0E400, FP3);
const FRECPS: WordTemplate = WordTemplate::new("frecps", 0x4E20FC00, FP3);
const FRSQRTS: WordTemplate = WordTemplate::new("frsqrts", 0x4EA0FC00, FP3);

const ADD: WordTemplate = WordTemplate::new("add", 0x4E208400, INT3);
const SUB: WordTemplate = WordTemplate::new("sub", 0x6E208400, INT3);
const MUL: WordTemplate = WordTemplate::new("mul", 0x4E209C00, INT3);
const SMAX: WordTemplate = WordTemplate::new("smax", 0x4E206400, INT3);
const SMIN: WordTemplate = WordTemplate::new("smin", 0x4E206C00, INT3);
const CMEQ: WordTemplate = WordTemplate::new("cmeq", 0x6E208C00, INT3);
const CMGT: WordTemplate = WordTemplate::new("cmgt", 0x4E203400, INT3);
const CMGE: WordTemplate = WordTemplate::new("cmge", 0x4E203C00, INT3);

const AND: WordTemplate = WordTemplate::new("and", 0x4E201C00, BIT3);
const ORR: WordTemplate = WordTemplate::new("orr", 0x4EA01C00, BIT3);
const EOR: WordTemplate = WordTemplate::new("eor", 0x6E201C00, BIT3);
const BIC: WordTemplate = WordTemplate::new("bic", 0x4E601C00, BIT3);

const FSQRT: WordTemplate = WordTemplate::new("fsqrt", 0x6EA1F800, FP2);
const FRECPE: WordTemplate = WordTemplate::new("frecpe", 0x4EA1D800, FP2);
const FRSQRTE: WordTemplate = WordTemplate::new("frsqrte", 0x6EA1D800, FP2);
const FCVTZS: WordTemplate = WordTemplate::new("fcvtzs", 0x4EA1B800, FP2);
const SCVTF: WordTemplate = WordTemplate::new("scvtf", 0x4E21D800, FP2);
const MVN: WordTemplate = WordTemplate::new("mvn", 0x6E205800, BIT2);
const UMINV: WordTemplate = WordTemplate::new("uminv", 0x6EB1A800, BIT2);
const UMAXV: WordTemplate = WordTemplate::new("umaxv", 0x6EB0A800, BIT2);

const SHL: WordTemplate = WordTemplate::new("shl", 0x4F005400, SHIFT);
const USHR: WordTemplate = WordTemplate::new("ushr", 0x6F000400, SHIFT);
const SSHR: WordTemplate = WordTemplate::new("sshr", 0x4F000400, SHIFT);

const FMOV_ONE_S: WordTemplate = WordTemplate::new("fmov", 0x4F03F600, ONLY_RD);
const FMOV_ONE_D: WordTemplate = WordTemplate::new("fmov", 0x6F03F600, ONLY_RD);
const FMOV_HALF_S: WordTemplate = WordTemplate::new("fmov", 0x4F03F400, ONLY_RD);
const FMOV_HALF_D: WordTemplate = WordTemplate::new("fmov", 0x6F03F400, ONLY_RD);
const MOVI_ONES: WordTemplate = WordTemplate::new("movi", 0x6F07E7E0, ONLY_RD);

// ── Load/store templates ─────────────────────────────────────────────────

const LDR_Q: WordTemplate = WordTemplate::new("ldr", 0x3DC00000, UIMM12);
const STR_Q: WordTemplate = WordTemplate::new("str", 0x3D800000, UIMM12);
const LDUR_Q: WordTemplate = WordTemplate::new("ldur", 0x3CC00000, SIMM9);
const STUR_Q: WordTemplate = WordTemplate::new("stur", 0x3C800000, SIMM9);
const LDR_Q_REG: WordTemplate = WordTemplate::new("ldr", 0x3CE06800, BIT3);
const STR_Q_REG: WordTemplate = WordTemplate::new("str", 0x3CA06800, BIT3);
const LDR_W: WordTemplate = WordTemplate::new("ldr", 0xB9400000, UIMM12);
const STR_W: WordTemplate = WordTemplate::new("str", 0xB9000000, UIMM12);
const LDR_X: WordTemplate = WordTemplate::new("ldr", 0xF9400000, UIMM12);
const STR_X: WordTemplate = WordTemplate::new("str", 0xF9000000, UIMM12);

// ── Scalar templates ─────────────────────────────────────────────────────

const ADD_X_LSL: WordTemplate = WordTemplate::new("add", 0x8B000000, ADD_LSL);
const ADD_X_IMM: WordTemplate = WordTemplate::new("add", 0x91000000, UIMM12);
const SUB_X_IMM: WordTemplate = WordTemplate::new("sub", 0xD1000000, UIMM12);
const ADDS_W_IMM: WordTemplate = WordTemplate::new("adds", 0x31000000, UIMM12);
const MOVZ: WordTemplate = WordTemplate::new("movz", 0xD2800000, MOVW);
const MOVN: WordTemplate = WordTemplate::new("movn", 0x92800000, MOVW);
const MOVK: WordTemplate = WordTemplate::new("movk", 0xF2800000, MOVW);
const SDIV_W: WordTemplate = WordTemplate::new("sdiv", 0x1AC00C00, BIT3);
const SDIV_X: WordTemplate = WordTemplate::new("sdiv", 0x9AC00C00, BIT3);
const MUL_W: WordTemplate = WordTemplate::new("mul", 0x1B007C00, BIT3);
const MUL_X: WordTemplate = WordTemplate::new("mul", 0x9B007C00, BIT3);
const MSUB_W: WordTemplate = WordTemplate::new("msub", 0x1B008000, DP3);
const MSUB_X: WordTemplate = WordTemplate::new("msub", 0x9B008000, DP3);
const FMOV_WS: WordTemplate = WordTemplate::new("fmov", 0x1E260000, BIT2);
const CBZ_W: WordTemplate = WordTemplate::new("cbz", 0x34000000, ONLY_RD);
const B_COND: WordTemplate = WordTemplate::new("b.cond", 0x54000000, BCOND);
const B: WordTemplate = WordTemplate::new("b", 0x14000000, &[]);
const RET: u32 = 0xD65F03C0;

/// `eq` condition code.
const EQ: i64 = 0;
/// The zero register in the `Rd` position of flag-setting ops.
const ZR: u8 = 31;

// ── Helpers ──────────────────────────────────────────────────────────────

#[inline]
fn r(code: u8) -> i64 {
    i64::from(code)
}

/// `sz` field: 0 for 32-bit lanes, 1 for 64-bit lanes.
#[inline]
fn sz(elem: Elem) -> i64 {
    i64::from(elem.is_double())
}

/// Integer `size` field: 2 for `.4s`, 3 for `.2d`.
#[inline]
fn size(elem: Elem) -> i64 {
    if elem.is_double() {
        3
    } else {
        2
    }
}

fn put(cx: &mut Cx<'_>, t: &WordTemplate, values: &[i64]) -> Result<(), EncodeError> {
    let word = t.encode(values)?;
    cx.push(Fragment::word(word));
    Ok(())
}

fn put_with(
    cx: &mut Cx<'_>,
    t: &WordTemplate,
    values: &[i64],
    clobbers: ClobberSet,
) -> Result<(), EncodeError> {
    let word = t.encode(values)?;
    cx.push_with(Fragment::word(word), clobbers);
    Ok(())
}

/// Materialise a 64-bit constant with MOVZ/MOVN + MOVK, one fragment per
/// instruction.
fn load_imm(cx: &mut Cx<'_>, rd: u8, value: i64) -> Result<(), EncodeError> {
    let bits = value as u64;
    let halves: [u16; 4] = core::array::from_fn(|i| (bits >> (16 * i)) as u16);
    let ones = halves.iter().filter(|&&h| h == 0xFFFF).count();
    let zeros = halves.iter().filter(|&&h| h == 0).count();
    let invert = ones > zeros;
    let filler = if invert { 0xFFFF } else { 0 };
    let first = halves.iter().position(|&h| h != filler).unwrap_or(0);
    let clob = ClobberSet::gpr(rd);
    if invert {
        let imm = i64::from(!halves[first]);
        put_with(cx, &MOVN, &[r(rd), imm, first as i64], clob)?;
    } else {
        put_with(cx, &MOVZ, &[r(rd), i64::from(halves[first]), first as i64], clob)?;
    }
    for (i, &h) in halves.iter().enumerate() {
        if i != first && h != filler {
            put_with(cx, &MOVK, &[r(rd), i64::from(h), i as i64], clob)?;
        }
    }
    Ok(())
}

// ── Load / Store ─────────────────────────────────────────────────────────

/// Vector load or store of `vt` at `addr`.
///
/// An index register is folded into the x17 scratch first. The remaining
/// displacement goes to LDUR/STUR (simm9) or LDR/STR (uimm12 × 16); beyond
/// that it is built in x16 and used as a register offset.
fn access(cx: &mut Cx<'_>, store: bool, vt: u8, addr: Addr) -> Result<(), EncodeError> {
    let mut base = addr.base;
    if let Some((index, scale)) = addr.index {
        let x17 = cx.sgpr(2);
        put_with(
            cx,
            &ADD_X_LSL,
            &[r(x17), r(base), i64::from(scale.log2()), r(index)],
            ClobberSet::gpr(x17),
        )?;
        base = x17;
    }
    let resolution = cx.profile.resolve_displacement_at(addr.disp, cx.bytes());
    let (word, extra) = match resolution {
        DispResolution::Direct { tier, .. } if tier.scale == 1 => {
            let t = if store { &STUR_Q } else { &LDUR_Q };
            (t.encode(&[r(vt), r(base), addr.disp])?, ClobberSet::NONE)
        }
        DispResolution::Direct { tier, .. } => {
            let t = if store { &STR_Q } else { &LDR_Q };
            let imm = addr.disp / i64::from(tier.scale);
            (t.encode(&[r(vt), r(base), imm])?, ClobberSet::NONE)
        }
        DispResolution::RequiresScratchAddress => {
            let x16 = cx.sgpr(1);
            log::debug!("a64: displacement {} synthesised in x{}", addr.disp, x16);
            load_imm(cx, x16, addr.disp)?;
            let t = if store { &STR_Q_REG } else { &LDR_Q_REG };
            (t.encode(&[r(vt), r(base), r(x16)])?, ClobberSet::gpr(x16))
        }
    };
    cx.push_with(
        Fragment::word(word).with_disp(Displacement {
            value: addr.disp,
            resolution,
        }),
        extra,
    );
    Ok(())
}

// ── Arithmetic ───────────────────────────────────────────────────────────

fn binary(cx: &mut Cx<'_>, op: Op, elem: Elem, dst: u8, a: u8, b: &Src) -> Result<(), EncodeError> {
    let b = stage::<AdvSimd>(cx, elem, b)?;
    let f = elem.is_float();
    let narrow = elem == Elem::I32;
    let fp = [r(dst), r(a), r(b), sz(elem)];
    let int = [r(dst), r(a), r(b), size(elem)];
    let bit = [r(dst), r(a), r(b)];
    match op {
        Op::Add if f => put(cx, &FADD, &fp),
        Op::Add => put(cx, &ADD, &int),
        Op::Sub if f => put(cx, &FSUB, &fp),
        Op::Sub => put(cx, &SUB, &int),
        Op::Mul if f => put(cx, &FMUL, &fp),
        Op::Mul if narrow => put(cx, &MUL, &int),
        Op::Div if f => put(cx, &FDIV, &fp),
        Op::Min if f => put(cx, &FMIN, &fp),
        Op::Min if narrow => put(cx, &SMIN, &int),
        Op::Max if f => put(cx, &FMAX, &fp),
        Op::Max if narrow => put(cx, &SMAX, &int),
        Op::And => put(cx, &AND, &bit),
        Op::Or => put(cx, &ORR, &bit),
        Op::Xor => put(cx, &EOR, &bit),
        Op::AndNot => put(cx, &BIC, &bit),
        Op::CmpEq | Op::CmpNe | Op::CmpLt | Op::CmpLe | Op::CmpGt | Op::CmpGe => {
            compare(cx, op, elem, dst, a, b)
        }
        _ => Err(no_form(cx, op, elem)),
    }
}

/// Compares map onto EQ/GT/GE with swapped sources for LT/LE; NE is EQ
/// followed by MVN.
fn compare(cx: &mut Cx<'_>, op: Op, elem: Elem, dst: u8, a: u8, b: u8) -> Result<(), EncodeError> {
    let (eq, gt, ge, size) = if elem.is_float() {
        (&FCMEQ, &FCMGT, &FCMGE, sz(elem))
    } else {
        (&CMEQ, &CMGT, &CMGE, size(elem))
    };
    let (t, n, m) = match op {
        Op::CmpEq | Op::CmpNe => (eq, a, b),
        Op::CmpGt => (gt, a, b),
        Op::CmpGe => (ge, a, b),
        Op::CmpLt => (gt, b, a),
        Op::CmpLe => (ge, b, a),
        _ => return Err(no_form(cx, op, elem)),
    };
    put(cx, t, &[r(dst), r(n), r(m), size])?;
    if op == Op::CmpNe {
        put(cx, &MVN, &[r(dst), r(dst)])?;
    }
    Ok(())
}

fn unary(cx: &mut Cx<'_>, op: Op, elem: Elem, dst: u8, src: &Src) -> Result<(), EncodeError> {
    let src = stage::<AdvSimd>(cx, elem, src)?;
    let t = match op {
        Op::Sqrt => &FSQRT,
        Op::RcpEst => &FRECPE,
        Op::RsqrtEst => &FRSQRTE,
        Op::CvtToInt => &FCVTZS,
        Op::CvtToFloat => &SCVTF,
        _ => return Err(no_form(cx, op, elem)),
    };
    put(cx, t, &[r(dst), r(src), sz(elem)])
}

fn shift(cx: &mut Cx<'_>, op: Op, elem: Elem, dst: u8, src: u8, amount: u8) -> Result<(), EncodeError> {
    let esize = i64::from(elem.bits());
    let amount = i64::from(amount);
    match op {
        Op::Shl => put(cx, &SHL, &[r(dst), r(src), esize + amount]),
        // USHR/SSHR cannot encode a zero shift.
        Op::Shr | Op::Sar if amount == 0 => AdvSimd::vmove(cx, dst, src),
        Op::Shr => put(cx, &USHR, &[r(dst), r(src), 2 * esize - amount]),
        Op::Sar => put(cx, &SSHR, &[r(dst), r(src), 2 * esize - amount]),
        _ => Err(no_form(cx, op, elem)),
    }
}

// ── AdvSimd ──────────────────────────────────────────────────────────────

/// AArch64 AdvSIMD family encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdvSimd;

impl Isa for AdvSimd {
    // FRECPS/FRSQRTS fold the constant into the step instruction.
    const REFINE_CONST: bool = false;

    fn native(cx: &mut Cx<'_>, op: Op, elem: Elem, form: &PForm) -> Result<(), EncodeError> {
        match *form {
            Form::Binary { dst, a, b } => binary(cx, op, elem, dst, a, &b),
            Form::Unary { dst, src } => unary(cx, op, elem, dst, &src),
            Form::Fused { acc, a, b } => {
                let b = stage::<AdvSimd>(cx, elem, &b)?;
                let t = match op {
                    Op::Fma => &FMLA,
                    Op::Fms => &FMLS,
                    _ => return Err(no_form(cx, op, elem)),
                };
                put(cx, t, &[r(acc), r(a), r(b), sz(elem)])
            }
            Form::Shift { dst, src, amount } => shift(cx, op, elem, dst, src, amount),
            Form::Mov { dst, src } => put(cx, &ORR, &[r(dst), r(src), r(src)]),
            Form::Load { dst, mem } => access(cx, false, dst, mem),
            Form::Store { mem, src } => access(cx, true, src, mem),
        }
    }

    fn splat(cx: &mut Cx<'_>, elem: Elem, dst: u8, k: Konst) -> Result<(), EncodeError> {
        let t = match (k, elem.is_double()) {
            (Konst::One, false) => &FMOV_ONE_S,
            (Konst::One, true) => &FMOV_ONE_D,
            (Konst::Half, false) => &FMOV_HALF_S,
            (Konst::Half, true) => &FMOV_HALF_D,
            (Konst::AllOnes, _) => &MOVI_ONES,
        };
        put(cx, t, &[r(dst)])
    }

    fn refine_step(
        cx: &mut Cx<'_>,
        kind: RecipKind,
        elem: Elem,
        x: u8,
        src: u8,
        t: u8,
        _k: u8,
    ) -> Result<(), EncodeError> {
        let s = sz(elem);
        match kind {
            RecipKind::Rcp => {
                // x *= 2 - src*x
                put(cx, &FRECPS, &[r(t), r(src), r(x), s])?;
                put(cx, &FMUL, &[r(x), r(x), r(t), s])
            }
            RecipKind::Rsqrt => {
                // x *= (3 - src*x*x) / 2
                put(cx, &FMUL, &[r(t), r(x), r(x), s])?;
                put(cx, &FRSQRTS, &[r(t), r(src), r(t), s])?;
                put(cx, &FMUL, &[r(x), r(x), r(t), s])
            }
        }
    }

    fn lane_loop(
        cx: &mut Cx<'_>,
        op: ScalarOp,
        elem: Elem,
        dst: u8,
        a: u8,
        b: &Src,
    ) -> Result<(), EncodeError> {
        let b = stage::<AdvSimd>(cx, elem, b)?;
        let (x15, x16, x17) = (cx.sgpr(0), cx.sgpr(1), cx.sgpr(2));
        let sp = cx.profile.stack_gpr;
        let bytes = i64::from(cx.bytes());
        let esize = i64::from(elem.bytes());
        let lanes = bytes / esize;
        let (ldr, str_, div, mul, msub) = if elem.is_double() {
            (&LDR_X, &STR_X, &SDIV_X, &MUL_X, &MSUB_X)
        } else {
            (&LDR_W, &STR_W, &SDIV_W, &MUL_W, &MSUB_W)
        };
        let clob = ClobberSet::gpr(x15) | ClobberSet::gpr(x16) | ClobberSet::gpr(x17) | ClobberSet::memory();
        cx.with_clobbers(clob, |cx| {
            put(cx, &SUB_X_IMM, &[r(sp), r(sp), 2 * bytes])?;
            put(cx, &STR_Q, &[r(a), r(sp), 0])?;
            put(cx, &STR_Q, &[r(b), r(sp), 1])?;
            for lane in 0..lanes {
                // uimm12 is scaled by the lane size.
                put(cx, ldr, &[r(x15), r(sp), lane])?;
                put(cx, ldr, &[r(x16), r(sp), lanes + lane])?;
                match op {
                    ScalarOp::Div => put(cx, div, &[r(x17), r(x15), r(x16)])?,
                    ScalarOp::Mul => put(cx, mul, &[r(x17), r(x15), r(x16)])?,
                    ScalarOp::Rem => {
                        put(cx, div, &[r(x17), r(x15), r(x16)])?;
                        put(cx, msub, &[r(x17), r(x17), r(x15), r(x16)])?;
                    }
                }
                put(cx, str_, &[r(x17), r(sp), lane])?;
            }
            put(cx, &LDR_Q, &[r(dst), r(sp), 0])?;
            put(cx, &ADD_X_IMM, &[r(sp), r(sp), 2 * bytes])
        })
    }

    fn reduce_branch(cx: &mut Cx<'_>, mask: u8, cond: Cond, label: Label) -> Result<(), EncodeError> {
        let s0 = cx.scratch(0);
        let w16 = cx.sgpr(1);
        let clob = ClobberSet::vreg(s0) | ClobberSet::gpr(w16);
        cx.with_clobbers(clob, |cx| {
            match cond {
                Cond::AllLanes => {
                    // min over 32-bit lanes is all ones iff every lane is set.
                    put(cx, &UMINV, &[r(s0), r(mask)])?;
                    put(cx, &FMOV_WS, &[r(w16), r(s0)])?;
                    put_with(cx, &ADDS_W_IMM, &[r(ZR), r(w16), 1], ClobberSet::flags())?;
                    let word = B_COND.encode(&[EQ])?;
                    cx.push(Fragment::word(word).with_fixup(Fixup {
                        label,
                        kind: FixupKind::A64Imm19,
                    }));
                }
                Cond::NoLanes => {
                    put(cx, &UMAXV, &[r(s0), r(mask)])?;
                    put(cx, &FMOV_WS, &[r(w16), r(s0)])?;
                    let word = CBZ_W.encode(&[r(w16)])?;
                    cx.push(Fragment::word(word).with_fixup(Fixup {
                        label,
                        kind: FixupKind::A64Imm19,
                    }));
                }
            }
            Ok(())
        })
    }

    fn jump(cx: &mut Cx<'_>, label: Label) -> Result<(), EncodeError> {
        let word = B.encode(&[])?;
        cx.push(Fragment::word(word).with_fixup(Fixup {
            label,
            kind: FixupKind::A64Imm26,
        }));
        Ok(())
    }

    fn ret(cx: &mut Cx<'_>) -> Result<(), EncodeError> {
        cx.push(Fragment::word(RET));
        Ok(())
    }
}
