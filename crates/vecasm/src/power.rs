//! POWER8 / POWER10 VMX+VSX template encoder (little-endian).
//!
//! Logical vector registers live in VR0–VR31, which alias VSR32–VSR63.
//! VMX (VX-form) instructions address them directly; VSX (XX-form)
//! instructions address VSR `32 + n`, so the register index is split into a
//! five-bit field plus a per-operand extension bit (TX/AX/BX).
//!
//! ## Encoding classes
//!
//! - **XX3 / XX2**: floating-point arithmetic, compares, logic, conversions
//! - **VX / VC**: integer arithmetic, shifts, integer compares (`Rc` at bit 10)
//! - **X-form**: indexed vector loads/stores, scalar integer ALU, `mtvsrd`
//! - **DQ-form**: POWER10 `lxv`/`stxv` with a 16-byte scaled displacement
//! - **D/DS-form**: `li`, `lis`, `ori`, `oris`, `lwz`/`stw`, `ld`/`std`

use crate::error::EncodeError;
use crate::fragment::{ClobberSet, Displacement, Fixup, FixupKind, Fragment, Label};
use crate::ir::{Cond, Elem, Form, Op};
use crate::isa::{no_form, stage, Addr, Cx, Isa, Konst, PForm, ScalarOp, Src};
use crate::operand::DispResolution;
use crate::profile::Features;
use crate::template::{Field, WordTemplate};

// ── Field tables ─────────────────────────────────────────────────────────

const T: Field = Field::u("t", 21, 5);
const A: Field = Field::u("a", 16, 5);
const B: Field = Field::u("b", 11, 5);
const AX: Field = Field::u("ax", 2, 1);
const BX: Field = Field::u("bx", 1, 1);
const TX: Field = Field::u("tx", 0, 1);

const XX3: &[Field] = &[T, A, B, AX, BX, TX];
const XX3_DM: &[Field] = &[T, A, B, AX, BX, TX, Field::u("dm", 8, 2)];
const XX2: &[Field] = &[T, B, BX, TX];
const VX: &[Field] = &[T, A, B];
const VX_SIM: &[Field] = &[T, Field::s("sim", 16, 5)];
const VX_UIM: &[Field] = &[T, Field::u("uim", 16, 5), B];
const X_VSX: &[Field] = &[T, A, B, TX];
const X_MOV: &[Field] = &[T, A, TX];
const DQ: &[Field] = &[T, A, Field::s("dq", 4, 12), Field::u("tx", 3, 1)];
const XO: &[Field] = &[T, A, B];
const D_SI: &[Field] = &[T, A, Field::s("si", 0, 16)];
const D_UI: &[Field] = &[A, T, Field::u("ui", 0, 16)];
const DS: &[Field] = &[T, A, Field::s("ds", 2, 14)];
const MD: &[Field] = &[A, T, Field::u("sh", 11, 5), Field::u("me", 5, 6), Field::u("sh5", 1, 1)];
const BC: &[Field] = &[Field::u("bo", 21, 5), Field::u("bi", 16, 5)];

const fn xx3(name: &'static str, xo: u32) -> WordTemplate {
    WordTemplate::new(name, 0xF000_0000 | xo << 3, XX3)
}

const fn xx2(name: &'static str, xo: u32) -> WordTemplate {
    WordTemplate::new(name, 0xF000_0000 | xo << 2, XX2)
}

const fn vx(name: &'static str, xo: u32) -> WordTemplate {
    WordTemplate::new(name, 0x1000_0000 | xo, VX)
}

/// VC-form compare with `Rc` set (updates CR6).
const fn vc_dot(name: &'static str, xo: u32) -> WordTemplate {
    WordTemplate::new(name, 0x1000_0000 | 1 << 10 | xo, VX)
}

const fn x_vsx(name: &'static str, xo: u32) -> WordTemplate {
    WordTemplate::new(name, 0x7C00_0000 | xo << 1, X_VSX)
}

const fn x_alu(name: &'static str, xo: u32) -> WordTemplate {
    WordTemplate::new(name, 0x7C00_0000 | xo << 1, XO)
}

/// Single/double pair indexed by `Elem::is_double`.
type Pair = [WordTemplate; 2];

// ── VSX templates ────────────────────────────────────────────────────────

const XVADD: Pair = [xx3("xvaddsp", 64), xx3("xvadddp", 96)];
const XVSUB: Pair = [xx3("xvsubsp", 72), xx3("xvsubdp", 104)];
const XVMUL: Pair = [xx3("xvmulsp", 80), xx3("xvmuldp", 112)];
const XVDIV: Pair = [xx3("xvdivsp", 88), xx3("xvdivdp", 120)];
const XVMADDA: Pair = [xx3("xvmaddasp", 65), xx3("xvmaddadp", 97)];
const XVNMSUBA: Pair = [xx3("xvnmsubasp", 209), xx3("xvnmsubadp", 241)];
const XVMAX: Pair = [xx3("xvmaxsp", 192), xx3("xvmaxdp", 224)];
const XVMIN: Pair = [xx3("xvminsp", 200), xx3("xvmindp", 232)];
const XVCMPEQ: Pair = [xx3("xvcmpeqsp", 67), xx3("xvcmpeqdp", 99)];
const XVCMPGT: Pair = [xx3("xvcmpgtsp", 75), xx3("xvcmpgtdp", 107)];
const XVCMPGE: Pair = [xx3("xvcmpgesp", 83), xx3("xvcmpgedp", 115)];

const XXLAND: WordTemplate = xx3("xxland", 130);
const XXLANDC: WordTemplate = xx3("xxlandc", 138);
const XXLOR: WordTemplate = xx3("xxlor", 146);
const XXLXOR: WordTemplate = xx3("xxlxor", 154);
const XXLNOR: WordTemplate = xx3("xxlnor", 162);
const XXPERMDI: WordTemplate = WordTemplate::new("xxpermdi", 0xF000_0000 | 10 << 3, XX3_DM);

const XVSQRT: Pair = [xx2("xvsqrtsp", 139), xx2("xvsqrtdp", 203)];
const XVRE: Pair = [xx2("xvresp", 154), xx2("xvredp", 218)];
const XVRSQRTE: Pair = [xx2("xvrsqrtesp", 138), xx2("xvrsqrtedp", 202)];
const XVCVTOINT: Pair = [xx2("xvcvspsxws", 152), xx2("xvcvdpsxds", 472)];
const XVCVTOFLOAT: Pair = [xx2("xvcvsxwsp", 184), xx2("xvcvsxddp", 504)];
const XVCVSPDP: WordTemplate = xx2("xvcvspdp", 457);

// ── VMX templates ────────────────────────────────────────────────────────

const VADDU: Pair = [vx("vadduwm", 128), vx("vaddudm", 192)];
const VSUBU: Pair = [vx("vsubuwm", 1152), vx("vsubudm", 1216)];
const VMUL: Pair = [vx("vmuluwm", 137), vx("vmulld", 457)];
const VDIVS: Pair = [vx("vdivsw", 395), vx("vdivsd", 459)];
const VMODS: Pair = [vx("vmodsw", 1931), vx("vmodsd", 1995)];
const VMINS: Pair = [vx("vminsw", 898), vx("vminsd", 962)];
const VMAXS: Pair = [vx("vmaxsw", 386), vx("vmaxsd", 450)];
const VCMPEQU: Pair = [vx("vcmpequw", 134), vx("vcmpequd", 199)];
const VCMPGTS: Pair = [vx("vcmpgtsw", 902), vx("vcmpgtsd", 967)];
const VSL: Pair = [vx("vslw", 388), vx("vsld", 1476)];
const VSR: Pair = [vx("vsrw", 644), vx("vsrd", 1732)];
const VSRA: Pair = [vx("vsraw", 900), vx("vsrad", 964)];
const VCMPEQUW_DOT: WordTemplate = vc_dot("vcmpequw.", 134);
const VSPLTISW: WordTemplate = WordTemplate::new("vspltisw", 0x1000_0000 | 908, VX_SIM);
const VCFSX: WordTemplate = WordTemplate::new("vcfsx", 0x1000_0000 | 842, VX_UIM);

// ── Load/store templates ─────────────────────────────────────────────────

/// POWER8 indexed forms; doublewords land swapped on little-endian.
const LXVD2X: WordTemplate = x_vsx("lxvd2x", 844);
const STXVD2X: WordTemplate = x_vsx("stxvd2x", 972);
const LXVX: WordTemplate = x_vsx("lxvx", 268);
const STXVX: WordTemplate = x_vsx("stxvx", 396);
const LXV: WordTemplate = WordTemplate::new("lxv", 0xF400_0001, DQ);
const STXV: WordTemplate = WordTemplate::new("stxv", 0xF400_0005, DQ);
const MTVSRD: WordTemplate = WordTemplate::new("mtvsrd", 0x7C00_0000 | 179 << 1, X_MOV);

// ── Scalar templates ─────────────────────────────────────────────────────

const LI: WordTemplate = WordTemplate::new("li", 0x3800_0000, D_SI);
const LIS: WordTemplate = WordTemplate::new("lis", 0x3C00_0000, D_SI);
const ORI: WordTemplate = WordTemplate::new("ori", 0x6000_0000, D_UI);
const ORIS: WordTemplate = WordTemplate::new("oris", 0x6400_0000, D_UI);
const RLDICR: WordTemplate = WordTemplate::new("rldicr", 0x7800_0004, MD);
const ADD: WordTemplate = x_alu("add", 266);
const SUBF: WordTemplate = x_alu("subf", 40);
const MULL: Pair = [x_alu("mullw", 235), x_alu("mulld", 233)];
const DIVS: Pair = [x_alu("divw", 491), x_alu("divd", 489)];
const LWZ: WordTemplate = WordTemplate::new("lwz", 0x8000_0000, D_SI);
const STW: WordTemplate = WordTemplate::new("stw", 0x9000_0000, D_SI);
const LD: WordTemplate = WordTemplate::new("ld", 0xE800_0000, DS);
const STD: WordTemplate = WordTemplate::new("std", 0xF800_0000, DS);
const BCX: WordTemplate = WordTemplate::new("bc", 0x4000_0000, BC);
const BRANCH: WordTemplate = WordTemplate::new("b", 0x4800_0000, &[]);
const BLR: u32 = 0x4E80_0020;

/// `bc 12, bi`: branch if CR bit `bi` is set.
const BO_TRUE: i64 = 12;
/// CR6 bit set by a VC-form compare when every lane matched.
const CR6_ALL: i64 = 24;
/// CR6 bit set by a VC-form compare when no lane matched.
const CR6_NONE: i64 = 26;
/// Red-zone frame used by lane loops, below r1.
const FRAME: i64 = -32;

// ── Helpers ──────────────────────────────────────────────────────────────

#[inline]
fn r(code: u8) -> i64 {
    i64::from(code)
}

#[inline]
fn pick(pair: &Pair, elem: Elem) -> &WordTemplate {
    &pair[elem.is_double() as usize]
}

/// Five-bit field and extension bit of the VSR aliasing VR `n`.
#[inline]
fn vsr(cx: &Cx<'_>, n: u8) -> (i64, i64) {
    let (lo, hi) = cx.profile.reg_layout.split(32 + n);
    (i64::from(lo), i64::from(hi))
}

fn put(cx: &mut Cx<'_>, t: &WordTemplate, values: &[i64]) -> Result<(), EncodeError> {
    let word = t.encode(values)?;
    cx.push(Fragment::word(word));
    Ok(())
}

fn put_xx3(cx: &mut Cx<'_>, t: &WordTemplate, d: u8, a: u8, b: u8) -> Result<(), EncodeError> {
    let ((d, dx), (a, ax), (b, bx)) = (vsr(cx, d), vsr(cx, a), vsr(cx, b));
    put(cx, t, &[d, a, b, ax, bx, dx])
}

fn put_xx2(cx: &mut Cx<'_>, t: &WordTemplate, d: u8, b: u8) -> Result<(), EncodeError> {
    let ((d, dx), (b, bx)) = (vsr(cx, d), vsr(cx, b));
    put(cx, t, &[d, b, bx, dx])
}

fn put_vx(cx: &mut Cx<'_>, t: &WordTemplate, d: u8, a: u8, b: u8) -> Result<(), EncodeError> {
    put(cx, t, &[r(d), r(a), r(b)])
}

/// `sldi ra, rs, sh` as `rldicr ra, rs, sh, 63 - sh`.
fn sldi(ra: u8, rs: u8, sh: u8) -> Result<u32, EncodeError> {
    let me = 63 - i64::from(sh);
    // MD-form stores mb/me with its high bit rotated to the bottom.
    let me_field = ((me & 0x1F) << 1) | (me >> 5);
    RLDICR.encode(&[r(ra), r(rs), i64::from(sh & 0x1F), me_field, i64::from(sh >> 5)])
}

/// Materialise a 64-bit constant in `rd` (li, lis/ori, or the five-word
/// 64-bit sequence).
fn load_imm(cx: &mut Cx<'_>, rd: u8, value: i64) -> Result<(), EncodeError> {
    let clob = ClobberSet::gpr(rd);
    let half = |shift: u32| (value >> shift) & 0xFFFF;
    let mut words = alloc::vec::Vec::with_capacity(5);
    if i16::try_from(value).is_ok() {
        words.push(LI.encode(&[r(rd), 0, value])?);
    } else if i32::try_from(value).is_ok() {
        words.push(LIS.encode(&[r(rd), 0, i64::from((value >> 16) as i16)])?);
        words.push(ORI.encode(&[r(rd), r(rd), half(0)])?);
    } else {
        words.push(LIS.encode(&[r(rd), 0, i64::from((value >> 48) as i16)])?);
        words.push(ORI.encode(&[r(rd), r(rd), half(32)])?);
        words.push(sldi(rd, rd, 32)?);
        words.push(ORIS.encode(&[r(rd), r(rd), half(16)])?);
        words.push(ORI.encode(&[r(rd), r(rd), half(0)])?);
    }
    for w in words {
        cx.push_with(Fragment::word(w), clob);
    }
    Ok(())
}

// ── Load / Store ─────────────────────────────────────────────────────────

/// `xxswapd d, s`: exchange the two doublewords.
fn swap_doublewords(cx: &mut Cx<'_>, d: u8, s: u8) -> Result<(), EncodeError> {
    let ((t, tx), (a, ax)) = (vsr(cx, d), vsr(cx, s));
    put(cx, &XXPERMDI, &[t, a, a, ax, ax, tx, 2])
}

/// Vector load or store of VR `vt` at `addr`.
///
/// POWER10 uses `lxv`/`stxv` for 16-byte aligned displacements and
/// `lxvx`/`stxvx` otherwise. POWER8 goes through `lxvd2x`/`stxvd2x` for
/// every element type and fixes the doubleword order with `xxswapd`, so
/// registers hold memory in little-endian element order on both
/// generations. A POWER8 store swaps into s0. Small displacements are
/// loaded with `li r11` in the same fragment as the access.
fn access(cx: &mut Cx<'_>, store: bool, vt: u8, addr: Addr) -> Result<(), EncodeError> {
    let dq = cx.profile.feature(Features::DQ_LOADS);
    if dq {
        return access_raw(cx, store, vt, addr);
    }
    if store {
        let s0 = cx.scratch(0);
        cx.with_clobbers(ClobberSet::vreg(s0), |cx| {
            swap_doublewords(cx, s0, vt)?;
            access_raw(cx, true, s0, addr)
        })
    } else {
        access_raw(cx, false, vt, addr)?;
        swap_doublewords(cx, vt, vt)
    }
}

fn access_raw(cx: &mut Cx<'_>, store: bool, vt: u8, addr: Addr) -> Result<(), EncodeError> {
    let dq = cx.profile.feature(Features::DQ_LOADS);
    let (r11, r12) = (cx.sgpr(0), cx.sgpr(1));
    let mut base = addr.base;
    if let Some((index, scale)) = addr.index {
        let clob = ClobberSet::gpr(r12);
        let mut idx = index;
        if scale.log2() > 0 {
            cx.push_with(Fragment::word(sldi(r12, index, scale.log2())?), clob);
            idx = r12;
        }
        cx.push_with(Fragment::word(ADD.encode(&[r(r12), r(base), r(idx)])?), clob);
        base = r12;
    }

    let indexed = if dq {
        if store {
            &STXVX
        } else {
            &LXVX
        }
    } else if store {
        &STXVD2X
    } else {
        &LXVD2X
    };
    let (t, tx) = vsr(cx, vt);
    let resolution = cx.profile.resolve_displacement_at(addr.disp, cx.bytes());
    let disp = Displacement {
        value: addr.disp,
        resolution,
    };
    match resolution {
        DispResolution::Direct { tier, .. } if tier.scale == 16 => {
            let tpl = if store { &STXV } else { &LXV };
            let word = tpl.encode(&[t, r(base), addr.disp / 16, tx])?;
            cx.push(Fragment::word(word).with_disp(disp));
        }
        // RA = 0 reads as zero, so a zero displacement needs no li.
        DispResolution::Direct { .. } if addr.disp == 0 => {
            let word = indexed.encode(&[t, 0, r(base), tx])?;
            cx.push(Fragment::word(word).with_disp(disp));
        }
        DispResolution::Direct { .. } => {
            let li = LI.encode(&[r(r11), 0, addr.disp])?;
            let word = indexed.encode(&[t, r(base), r(r11), tx])?;
            cx.push_with(
                Fragment::words(&[li, word]).with_disp(disp),
                ClobberSet::gpr(r11),
            );
        }
        DispResolution::RequiresScratchAddress => {
            log::debug!("power: displacement {} synthesised in r{}", addr.disp, r11);
            load_imm(cx, r11, addr.disp)?;
            let clob = ClobberSet::gpr(r11);
            cx.push_with(Fragment::word(ADD.encode(&[r(r11), r(r11), r(base)])?), clob);
            let word = indexed.encode(&[t, 0, r(r11), tx])?;
            cx.push_with(Fragment::word(word).with_disp(disp), clob);
        }
    }
    Ok(())
}

// ── Arithmetic ───────────────────────────────────────────────────────────

fn binary(cx: &mut Cx<'_>, op: Op, elem: Elem, dst: u8, a: u8, b: &Src) -> Result<(), EncodeError> {
    let b = stage::<Vsx>(cx, elem, b)?;
    let f = elem.is_float();
    let d = dst;
    match op {
        Op::Add if f => put_xx3(cx, pick(&XVADD, elem), d, a, b),
        Op::Add => put_vx(cx, pick(&VADDU, elem), d, a, b),
        Op::Sub if f => put_xx3(cx, pick(&XVSUB, elem), d, a, b),
        Op::Sub => put_vx(cx, pick(&VSUBU, elem), d, a, b),
        Op::Mul if f => put_xx3(cx, pick(&XVMUL, elem), d, a, b),
        Op::Mul => put_vx(cx, pick(&VMUL, elem), d, a, b),
        Op::Div if f => put_xx3(cx, pick(&XVDIV, elem), d, a, b),
        Op::Div => put_vx(cx, pick(&VDIVS, elem), d, a, b),
        Op::Rem => put_vx(cx, pick(&VMODS, elem), d, a, b),
        Op::Min if f => put_xx3(cx, pick(&XVMIN, elem), d, a, b),
        Op::Min => put_vx(cx, pick(&VMINS, elem), d, a, b),
        Op::Max if f => put_xx3(cx, pick(&XVMAX, elem), d, a, b),
        Op::Max => put_vx(cx, pick(&VMAXS, elem), d, a, b),
        Op::And => put_xx3(cx, &XXLAND, d, a, b),
        Op::Or => put_xx3(cx, &XXLOR, d, a, b),
        Op::Xor => put_xx3(cx, &XXLXOR, d, a, b),
        Op::AndNot => put_xx3(cx, &XXLANDC, d, a, b),
        Op::CmpEq | Op::CmpNe | Op::CmpLt | Op::CmpLe | Op::CmpGt | Op::CmpGe => {
            if f {
                float_compare(cx, op, elem, d, a, b)
            } else {
                int_compare(cx, op, elem, d, a, b)
            }
        }
        _ => Err(no_form(cx, op, elem)),
    }
}

fn float_compare(cx: &mut Cx<'_>, op: Op, elem: Elem, d: u8, a: u8, b: u8) -> Result<(), EncodeError> {
    let (t, x, y) = match op {
        Op::CmpEq | Op::CmpNe => (pick(&XVCMPEQ, elem), a, b),
        Op::CmpGt => (pick(&XVCMPGT, elem), a, b),
        Op::CmpGe => (pick(&XVCMPGE, elem), a, b),
        Op::CmpLt => (pick(&XVCMPGT, elem), b, a),
        Op::CmpLe => (pick(&XVCMPGE, elem), b, a),
        _ => return Err(no_form(cx, op, elem)),
    };
    put_xx3(cx, t, d, x, y)?;
    if op == Op::CmpNe {
        put_xx3(cx, &XXLNOR, d, d, d)?;
    }
    Ok(())
}

/// VMX has only EQ and signed GT; GE/LE/NE complement the opposite test.
fn int_compare(cx: &mut Cx<'_>, op: Op, elem: Elem, d: u8, a: u8, b: u8) -> Result<(), EncodeError> {
    let (eq, gt) = (pick(&VCMPEQU, elem), pick(&VCMPGTS, elem));
    let (t, x, y, negate) = match op {
        Op::CmpEq => (eq, a, b, false),
        Op::CmpNe => (eq, a, b, true),
        Op::CmpGt => (gt, a, b, false),
        Op::CmpLt => (gt, b, a, false),
        Op::CmpGe => (gt, b, a, true),
        Op::CmpLe => (gt, a, b, true),
        _ => return Err(no_form(cx, op, elem)),
    };
    put_vx(cx, t, d, x, y)?;
    if negate {
        put_xx3(cx, &XXLNOR, d, d, d)?;
    }
    Ok(())
}

fn unary(cx: &mut Cx<'_>, op: Op, elem: Elem, dst: u8, src: &Src) -> Result<(), EncodeError> {
    let src = stage::<Vsx>(cx, elem, src)?;
    let pair = match op {
        Op::Sqrt => &XVSQRT,
        Op::RcpEst => &XVRE,
        Op::RsqrtEst => &XVRSQRTE,
        Op::CvtToInt => &XVCVTOINT,
        Op::CvtToFloat => &XVCVTOFLOAT,
        _ => return Err(no_form(cx, op, elem)),
    };
    put_xx2(cx, pick(pair, elem), dst, src)
}

/// VMX shifts take per-lane amounts from a vector, splatted into s0.
fn shift(cx: &mut Cx<'_>, op: Op, elem: Elem, dst: u8, src: u8, amount: u8) -> Result<(), EncodeError> {
    let pair = match op {
        Op::Shl => &VSL,
        Op::Shr => &VSR,
        Op::Sar => &VSRA,
        _ => return Err(no_form(cx, op, elem)),
    };
    let s0 = cx.scratch(0);
    cx.with_clobbers(ClobberSet::vreg(s0), |cx| {
        if elem.is_double() {
            let r11 = cx.sgpr(0);
            let (t, tx) = vsr(cx, s0);
            cx.push_with(
                Fragment::word(LI.encode(&[r(r11), 0, i64::from(amount)])?),
                ClobberSet::gpr(r11),
            );
            put(cx, &MTVSRD, &[t, r(r11), tx])?;
            let (s, sx) = vsr(cx, s0);
            put(cx, &XXPERMDI, &[s, s, s, sx, sx, sx, 0])?;
        } else {
            // Only the low five bits of each lane count.
            let sim = i64::from(amount & 0x1F);
            let sim = if sim < 16 { sim } else { sim - 32 };
            put(cx, &VSPLTISW, &[r(s0), sim])?;
        }
        put_vx(cx, pick(pair, elem), dst, src, s0)
    })
}

// ── Vsx ──────────────────────────────────────────────────────────────────

/// POWER VMX/VSX family encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct Vsx;

impl Isa for Vsx {
    fn native(cx: &mut Cx<'_>, op: Op, elem: Elem, form: &PForm) -> Result<(), EncodeError> {
        match *form {
            Form::Binary { dst, a, b } => binary(cx, op, elem, dst, a, &b),
            Form::Unary { dst, src } => unary(cx, op, elem, dst, &src),
            Form::Fused { acc, a, b } => {
                let b = stage::<Vsx>(cx, elem, &b)?;
                let pair = match op {
                    Op::Fma => &XVMADDA,
                    Op::Fms => &XVNMSUBA,
                    _ => return Err(no_form(cx, op, elem)),
                };
                put_xx3(cx, pick(pair, elem), acc, a, b)
            }
            Form::Shift { dst, src, amount } => shift(cx, op, elem, dst, src, amount),
            Form::Mov { dst, src } => put_xx3(cx, &XXLOR, dst, src, src),
            Form::Load { dst, mem } => access(cx, false, dst, mem),
            Form::Store { mem, src } => access(cx, true, src, mem),
        }
    }

    fn splat(cx: &mut Cx<'_>, elem: Elem, dst: u8, k: Konst) -> Result<(), EncodeError> {
        match k {
            Konst::AllOnes => put(cx, &VSPLTISW, &[r(dst), -1]),
            Konst::One | Konst::Half => {
                put(cx, &VSPLTISW, &[r(dst), 1])?;
                if k == Konst::One {
                    put_xx2(cx, pick(&XVCVTOFLOAT, Elem::F32), dst, dst)?;
                } else {
                    // 1 / 2^1
                    put(cx, &VCFSX, &[r(dst), 1, r(dst)])?;
                }
                if elem.is_double() {
                    put_xx2(cx, &XVCVSPDP, dst, dst)?;
                }
                Ok(())
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
        let b = stage::<Vsx>(cx, elem, b)?;
        let sp = cx.profile.stack_gpr;
        let (r11, r12, r0) = (cx.sgpr(0), cx.sgpr(1), cx.sgpr(2));
        let bytes = i64::from(cx.bytes());
        let esize = i64::from(elem.bytes());
        let wide = elem.is_double();
        let clob = ClobberSet::gpr(r11) | ClobberSet::gpr(r12) | ClobberSet::gpr(r0) | ClobberSet::memory();
        cx.with_clobbers(clob, |cx| {
            access(cx, true, a, Addr::new(sp, FRAME))?;
            access(cx, true, b, Addr::new(sp, FRAME + bytes))?;
            let (div, mul) = (pick(&DIVS, elem), pick(&MULL, elem));
            for lane in 0..bytes / esize {
                let off = FRAME + lane * esize;
                if wide {
                    put(cx, &LD, &[r(r12), r(sp), off / 4])?;
                    put(cx, &LD, &[r(r0), r(sp), (off + bytes) / 4])?;
                } else {
                    put(cx, &LWZ, &[r(r12), r(sp), off])?;
                    put(cx, &LWZ, &[r(r0), r(sp), off + bytes])?;
                }
                match op {
                    ScalarOp::Div => put(cx, div, &[r(r11), r(r12), r(r0)])?,
                    ScalarOp::Mul => put(cx, mul, &[r(r11), r(r12), r(r0)])?,
                    ScalarOp::Rem => {
                        put(cx, div, &[r(r11), r(r12), r(r0)])?;
                        put(cx, mul, &[r(r11), r(r11), r(r0)])?;
                        // r11 = r12 - r11
                        put(cx, &SUBF, &[r(r11), r(r11), r(r12)])?;
                    }
                }
                if wide {
                    put(cx, &STD, &[r(r11), r(sp), off / 4])?;
                } else {
                    put(cx, &STW, &[r(r11), r(sp), off])?;
                }
            }
            access(cx, false, dst, Addr::new(sp, FRAME))
        })
    }

    fn reduce_branch(cx: &mut Cx<'_>, mask: u8, cond: Cond, label: Label) -> Result<(), EncodeError> {
        let (s0, s1) = (cx.scratch(0), cx.scratch(1));
        let clob = ClobberSet::vreg(s0) | ClobberSet::vreg(s1) | ClobberSet::flags();
        cx.with_clobbers(clob, |cx| {
            put(cx, &VSPLTISW, &[r(s1), -1])?;
            put_vx(cx, &VCMPEQUW_DOT, s0, mask, s1)?;
            let bi = match cond {
                Cond::AllLanes => CR6_ALL,
                Cond::NoLanes => CR6_NONE,
            };
            let word = BCX.encode(&[BO_TRUE, bi])?;
            cx.push(Fragment::word(word).with_fixup(Fixup {
                label,
                kind: FixupKind::PpcBd14,
            }));
            Ok(())
        })
    }

    fn jump(cx: &mut Cx<'_>, label: Label) -> Result<(), EncodeError> {
        let word = BRANCH.encode(&[])?;
        cx.push(Fragment::word(word).with_fixup(Fixup {
            label,
            kind: FixupKind::PpcLi24,
        }));
        Ok(())
    }

    fn ret(cx: &mut Cx<'_>) -> Result<(), EncodeError> {
        cx.push(Fragment::word(BLR));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::Emission;
    use crate::ir::{Instr, Width};
    use crate::issue::issue;
    use crate::operand::{GReg, Mem, Operand, Scale, VReg};
    use crate::profile::{Power10, Power8};
    use alloc::vec::Vec;

    fn words(e: &Emission) -> Vec<u32> {
        e.fragments().iter().flat_map(|f| f.words_le()).collect()
    }

    fn p8(op: Op, elem: Elem, ops: &[Operand]) -> Vec<u32> {
        words(&issue::<Power8>(&Instr::new(op, elem, ops)).unwrap())
    }

    fn p10(op: Op, elem: Elem, ops: &[Operand]) -> Vec<u32> {
        words(&issue::<Power10>(&Instr::new(op, elem, ops)).unwrap())
    }

    fn d(i: u8) -> Operand {
        VReg::dst(i).into()
    }
    fn s(i: u8) -> Operand {
        VReg::src(i).into()
    }
    fn g(i: u8) -> Operand {
        VReg::dst_src(i).into()
    }

    #[test]
    fn vsx_float_arithmetic() {
        // xvaddsp 32, 33, 34
        assert_eq!(p8(Op::Add, Elem::F32, &[d(0), s(1), s(2)]), [0xF0011207]);
        // xvmuldp 35, 36, 37
        assert_eq!(p8(Op::Mul, Elem::F64, &[d(3), s(4), s(5)]), [0xF0642B87]);
        // xvmaddasp 32, 33, 34
        assert_eq!(p8(Op::Fma, Elem::F32, &[g(0), s(1), s(2)]), [0xF001120F]);
    }

    #[test]
    fn vmx_integer_arithmetic() {
        // vadduwm 0, 1, 2
        assert_eq!(p8(Op::Add, Elem::I32, &[d(0), s(1), s(2)]), [0x10011080]);
        // vsubudm 0, 1, 2
        assert_eq!(p8(Op::Sub, Elem::I64, &[d(0), s(1), s(2)]), [0x100114C0]);
        // vdivsw 0, 1, 2
        assert_eq!(p10(Op::Div, Elem::I32, &[d(0), s(1), s(2)]), [0x1001118B]);
    }

    #[test]
    fn integer_ge_complements_gt() {
        // vcmpgtsw 0, 2, 1 ; xxlnor 32, 32, 32
        assert_eq!(
            p8(Op::CmpGe, Elem::I32, &[d(0), s(1), s(2)]),
            [0x10020B86, 0xF0000517]
        );
    }

    #[test]
    fn shifts_splat_the_amount() {
        // vspltisw 28, 3 ; vslw 0, 1, 28
        assert_eq!(
            p8(Op::Shl, Elem::I32, &[d(0), s(1), Operand::Imm(3)]),
            [0x1383038C, 0x1001E184]
        );
        // vspltisw 28, -12 ; vsraw 0, 1, 28
        assert_eq!(
            p8(Op::Sar, Elem::I32, &[d(0), s(1), Operand::Imm(20)]),
            [0x1394038C, 0x1001E384]
        );
        // li 11, 40 ; mtvsrd 60, 11 ; xxpermdi 60, 60, 60, 0 ; vsld 0, 1, 28
        assert_eq!(
            p8(Op::Shl, Elem::I64, &[d(0), s(1), Operand::Imm(40)]),
            [0x39600028, 0x7F8B0167, 0xF39CE057, 0x1001E5C4]
        );
    }

    #[test]
    fn power8_loads_are_indexed() {
        let ld = |disp| p8(Op::Load, Elem::F32, &[d(0), Mem::new(GReg(0), disp).into()]);
        // lxvd2x 32, 0, 3 ; xxswapd 32, 32
        assert_eq!(ld(0), [0x7C001E99, 0xF0000257]);
        // li 11, 32 ; lxvd2x 32, 3, 11 ; xxswapd 32, 32
        assert_eq!(ld(32), [0x3960_0020, 0x7C035E99, 0xF0000257]);
    }

    #[test]
    fn power8_access_is_independent_of_element_type() {
        let m: Operand = Mem::new(GReg(0), 16).into();
        let load = p8(Op::Load, Elem::I32, &[d(0), m]);
        let store = p8(Op::Store, Elem::I32, &[m, s(0)]);
        for elem in [Elem::F32, Elem::F64, Elem::I64] {
            assert_eq!(p8(Op::Load, elem, &[d(0), m]), load);
            assert_eq!(p8(Op::Store, elem, &[m, s(0)]), store);
        }
        // xxswapd 60, 32 ; li 11, 16 ; stxvd2x 60, 3, 11
        assert_eq!(store, [0xF3800257, 0x39600010, 0x7F835F99]);
    }

    #[test]
    fn power10_loads_prefer_dq_form() {
        let ld = |disp| p10(Op::Load, Elem::F32, &[d(0), Mem::new(GReg(0), disp).into()]);
        // lxv 32, 32(3)
        assert_eq!(ld(32), [0xF4030029]);
        // li 11, 40 ; lxvx 32, 3, 11
        assert_eq!(ld(40), [0x39600028, 0x7C035A19]);
        // lis 11, 1 ; ori 11, 11, 0x2345 ; add 11, 11, 3 ; lxvx 32, 0, 11
        assert_eq!(
            ld(0x12345),
            [0x3D600001, 0x616B2345, 0x7D6B1A14, 0x7C005A19]
        );
    }

    #[test]
    fn far_displacement_fragment_records_scratch() {
        let e = issue::<Power10>(&Instr::new(
            Op::Store,
            Elem::F64,
            &[Mem::new(GReg(0), 1 << 40).into(), s(2)],
        ))
        .unwrap();
        let last = e.fragments().last().unwrap();
        assert_eq!(
            last.disp().map(|d| d.resolution),
            Some(DispResolution::RequiresScratchAddress)
        );
        // lis, ori, sldi, oris, ori, add, stxvx
        assert_eq!(e.len(), 7);
        assert!(e.clobbers().has_gpr(11));
    }

    #[test]
    fn indexed_store_scales_index() {
        let m = Mem::indexed(GReg(0), GReg(1), Scale::S4, 0);
        // xxswapd 60, 33 ; sldi 12, 4, 2 ; add 12, 3, 12 ; stxvd2x 60, 0, 12
        let e = issue::<Power8>(&Instr::new(Op::Store, Elem::I32, &[m.into(), s(1)])).unwrap();
        assert_eq!(words(&e), [0xF3810A57, 0x788C1764, 0x7D836214, 0x7F806799]);
        assert!(e.clobbers().has_vreg(28));
    }

    #[test]
    fn splat_constants() {
        let mut cx = Cx::new(&crate::profile::POWER8, 128);
        Vsx::splat(&mut cx, Elem::F64, 30, Konst::Half).unwrap();
        // vspltisw 30, 1 ; vcfsx 30, 30, 1 ; xvcvspdp 62, 62
        assert_eq!(words(&cx.finish()), [0x13C1038C, 0x13C1F34A, 0xF3C0F727]);
    }

    #[test]
    fn reciprocal_refines_with_fma() {
        let w = p8(Op::Rcp, Elem::F32, &[d(0), s(1)]);
        assert_eq!(
            w,
            [
                0xF3800A6B, // xvresp 60, 33
                0x13C1038C, // vspltisw 30, 1
                0xF3C0F2E3, // xvcvsxwsp 62, 62
                0xF3BEF497, // xxlor 61, 62, 62
                0xF3A1E68F, // xvnmsubasp 61, 33, 60
                0xF39CEA0F, // xvmaddasp 60, 60, 61
                0xF01CE497, // xxlor 32, 60, 60
            ]
        );
    }

    #[test]
    fn power8_divide_goes_through_lane_loop() {
        let e = issue::<Power8>(&Instr::new(Op::Div, Elem::I32, &[d(0), s(1), s(2)])).unwrap();
        let w = words(&e);
        // two stores (xxswapd, li, stxvd2x each), 4 × (lwz, lwz, divw, stw),
        // one reload (li, lxvd2x, xxswapd)
        assert_eq!(w.len(), 6 + 4 * 4 + 3);
        // lwz 12, -32(1) ; lwz 0, -16(1) ; divw 11, 12, 0 ; stw 11, -32(1)
        assert_eq!(&w[6..10], &[0x8181FFE0, 0x8001FFF0, 0x7D6C03D6, 0x9161FFE0]);
        assert!(e.clobbers().scratch_memory);
    }

    #[test]
    fn wide_power10_uses_dq_for_replica_offsets() {
        let i = Instr::new(Op::Load, Elem::F32, &[d(0), Mem::new(GReg(0), 0).into()]).at(Width::W256);
        // lxv 32, 0(3) ; lxv 46, 16(3)
        assert_eq!(
            words(&issue::<Power10>(&i).unwrap()),
            [0xF4030009, 0xF5C30019]
        );
    }
}
