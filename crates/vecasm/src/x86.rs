//! x86-64 AVX / AVX2 / AVX-512 encoder.
//!
//! Vector instructions are VEX-encoded on the AVX profiles and always
//! EVEX-encoded on the AVX-512 profile, where the compressed disp8 scales
//! with the access size. Scalar helpers (address synthesis, lane loops,
//! reductions) use legacy REX encodings.
//!
//! Operand placement follows the usual three-operand convention:
//! `ModRM.reg` = destination, `vvvv` = first source, `ModRM.rm` = second
//! source (register or memory).

use crate::error::EncodeError;
use crate::fragment::{ClobberSet, Displacement, Fixup, FixupKind, Fragment, InstrBytes, Label};
use crate::ir::{Cond, Elem, Form, Op, Rm};
use crate::isa::{no_form, stage, Addr, Cx, Isa, Konst, PForm, ScalarOp, Src};
use crate::operand::{DispResolution, Scale};
use crate::profile::Features;

// ── Opcode table ─────────────────────────────────────────────────────────

/// Implied SIMD prefix (`pp`).
const NP: u8 = 0;
const P66: u8 = 1;
const PF3: u8 = 2;

/// Opcode maps (`mmmmm` / `mm`).
const M0F: u8 = 1;
const M38: u8 = 2;
const M3A: u8 = 3;

/// A VEX/EVEX opcode.
#[derive(Debug, Clone, Copy)]
struct VOp {
    name: &'static str,
    pp: u8,
    map: u8,
    opcode: u8,
    /// `W` under VEX.
    vw: bool,
    /// `W` under EVEX.
    ew: bool,
    /// No VEX form exists.
    evex_only: bool,
}

const fn v(name: &'static str, pp: u8, map: u8, opcode: u8) -> VOp {
    VOp {
        name,
        pp,
        map,
        opcode,
        vw: false,
        ew: false,
        evex_only: false,
    }
}

impl VOp {
    /// W1 under both encodings.
    const fn w1(self) -> Self {
        VOp {
            vw: true,
            ew: true,
            ..self
        }
    }

    /// W1 under EVEX only (VEX.WIG).
    const fn ew1(self) -> Self {
        VOp { ew: true, ..self }
    }

    const fn evex(self) -> Self {
        VOp {
            evex_only: true,
            ..self
        }
    }
}

/// 32-bit/64-bit lane pair indexed by `Elem::is_double`.
type Pair = [VOp; 2];

#[inline]
fn pick(pair: &Pair, elem: Elem) -> &VOp {
    &pair[elem.is_double() as usize]
}

const ADDP: Pair = [v("vaddps", NP, M0F, 0x58), v("vaddpd", P66, M0F, 0x58).ew1()];
const SUBP: Pair = [v("vsubps", NP, M0F, 0x5C), v("vsubpd", P66, M0F, 0x5C).ew1()];
const MULP: Pair = [v("vmulps", NP, M0F, 0x59), v("vmulpd", P66, M0F, 0x59).ew1()];
const DIVP: Pair = [v("vdivps", NP, M0F, 0x5E), v("vdivpd", P66, M0F, 0x5E).ew1()];
const MINP: Pair = [v("vminps", NP, M0F, 0x5D), v("vminpd", P66, M0F, 0x5D).ew1()];
const MAXP: Pair = [v("vmaxps", NP, M0F, 0x5F), v("vmaxpd", P66, M0F, 0x5F).ew1()];
const SQRTP: Pair = [v("vsqrtps", NP, M0F, 0x51), v("vsqrtpd", P66, M0F, 0x51).ew1()];
const CMPP: Pair = [v("vcmpps", NP, M0F, 0xC2), v("vcmppd", P66, M0F, 0xC2).ew1()];

const PADD: Pair = [v("vpaddd", P66, M0F, 0xFE), v("vpaddq", P66, M0F, 0xD4).ew1()];
const PSUB: Pair = [v("vpsubd", P66, M0F, 0xFA), v("vpsubq", P66, M0F, 0xFB).ew1()];
const PMULL: Pair = [
    v("vpmulld", P66, M38, 0x40),
    v("vpmullq", P66, M38, 0x40).ew1().evex(),
];
const PMINS: Pair = [
    v("vpminsd", P66, M38, 0x39),
    v("vpminsq", P66, M38, 0x39).ew1().evex(),
];
const PMAXS: Pair = [
    v("vpmaxsd", P66, M38, 0x3D),
    v("vpmaxsq", P66, M38, 0x3D).ew1().evex(),
];
const PCMPEQ: Pair = [v("vpcmpeqd", P66, M0F, 0x76), v("vpcmpeqq", P66, M38, 0x29)];
const PCMPGT: Pair = [v("vpcmpgtd", P66, M0F, 0x66), v("vpcmpgtq", P66, M38, 0x37)];
const PCMP: Pair = [
    v("vpcmpd", P66, M3A, 0x1F).evex(),
    v("vpcmpq", P66, M3A, 0x1F).ew1().evex(),
];

const PAND: VOp = v("vpand", P66, M0F, 0xDB);
const PANDN: VOp = v("vpandn", P66, M0F, 0xDF);
const POR: VOp = v("vpor", P66, M0F, 0xEB);
const PXOR: VOp = v("vpxor", P66, M0F, 0xEF);
const PTERNLOGD: VOp = v("vpternlogd", P66, M3A, 0x25).evex();

const FMADD231: Pair = [
    v("vfmadd231ps", P66, M38, 0xB8),
    v("vfmadd231pd", P66, M38, 0xB8).w1(),
];
const FNMADD231: Pair = [
    v("vfnmadd231ps", P66, M38, 0xBC),
    v("vfnmadd231pd", P66, M38, 0xBC).w1(),
];

const RCPPS: VOp = v("vrcpps", NP, M0F, 0x53);
const RSQRTPS: VOp = v("vrsqrtps", NP, M0F, 0x52);
const RCP14: Pair = [
    v("vrcp14ps", P66, M38, 0x4C).evex(),
    v("vrcp14pd", P66, M38, 0x4C).ew1().evex(),
];
const RSQRT14: Pair = [
    v("vrsqrt14ps", P66, M38, 0x4E).evex(),
    v("vrsqrt14pd", P66, M38, 0x4E).ew1().evex(),
];
const CVTT: Pair = [
    v("vcvttps2dq", PF3, M0F, 0x5B),
    v("vcvttpd2qq", P66, M0F, 0x7A).ew1().evex(),
];
const CVTF: Pair = [
    v("vcvtdq2ps", NP, M0F, 0x5B),
    v("vcvtqq2pd", PF3, M0F, 0xE6).ew1().evex(),
];

/// Shift-by-immediate groups; the operation is selected by `ModRM.reg`.
const PSHIFT: Pair = [v("vpshiftd", P66, M0F, 0x72), v("vpshiftq", P66, M0F, 0x73).ew1()];
const PSRAQ: VOp = v("vpsraq", P66, M0F, 0x72).ew1().evex();
const SHL_DIGIT: u8 = 6;
const SHR_DIGIT: u8 = 2;
const SAR_DIGIT: u8 = 4;

const MOVAPS: VOp = v("vmovaps", NP, M0F, 0x28);
const MOVUPS_LOAD: VOp = v("vmovups", NP, M0F, 0x10);
const MOVUPS_STORE: VOp = v("vmovups", NP, M0F, 0x11);

const MOVMSKPS: VOp = v("vmovmskps", NP, M0F, 0x50);
const KMOVW: VOp = v("kmovw", NP, M0F, 0x93);
const PMOVD2M: VOp = v("vpmovd2m", PF3, M38, 0x39).evex();
const PMOVM2: Pair = [
    v("vpmovm2d", PF3, M38, 0x38).evex(),
    v("vpmovm2q", PF3, M38, 0x38).ew1().evex(),
];

/// `vcmpps` predicates.
const CMP_EQ_OQ: u8 = 0x00;
const CMP_LT_OS: u8 = 0x01;
const CMP_LE_OS: u8 = 0x02;
const CMP_NEQ_UQ: u8 = 0x04;
const CMP_GE_OS: u8 = 0x0D;
const CMP_GT_OS: u8 = 0x0E;

/// `vpcmpd` predicates.
const PCMP_EQ: u8 = 0;
const PCMP_LT: u8 = 1;
const PCMP_LE: u8 = 2;
const PCMP_NE: u8 = 4;
const PCMP_GE: u8 = 5;
const PCMP_GT: u8 = 6;

const RDX: u8 = 2;

// ─── REX / ModR/M / SIB helpers ──────────────────────────────────────────

/// Build a REX prefix byte.
#[inline]
fn rex(w: bool, r: bool, x: bool, b: bool) -> u8 {
    0x40 | (w as u8) << 3 | (r as u8) << 2 | (x as u8) << 1 | b as u8
}

/// Build ModR/M byte.
#[inline]
fn modrm(mod_: u8, reg: u8, rm: u8) -> u8 {
    (mod_ << 6) | ((reg & 7) << 3) | (rm & 7)
}

/// Build SIB byte.
#[inline]
fn sib(scale: Scale, index: u8, base: u8) -> u8 {
    (scale.log2() << 6) | ((index & 7) << 3) | (base & 7)
}

#[inline]
fn bit3(code: u8) -> bool {
    code & 0x08 != 0
}

#[inline]
fn bit4(code: u8) -> bool {
    code & 0x10 != 0
}

/// Encoded displacement of a memory operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disp {
    None,
    /// disp8, already divided by the EVEX compression factor.
    D8(i8),
    D32(i32),
}

/// Memory operand ready for ModR/M emission.
#[derive(Debug, Clone, Copy)]
struct MemRef {
    base: u8,
    index: Option<(u8, Scale)>,
    disp: Disp,
}

impl MemRef {
    /// Uncompressed `[base + disp]` for legacy scalar instructions.
    fn plain(base: u8, disp: i64) -> Self {
        let disp = if disp == 0 {
            Disp::None
        } else if let Ok(d) = i8::try_from(disp) {
            Disp::D8(d)
        } else {
            Disp::D32(disp as i32)
        };
        MemRef {
            base,
            index: None,
            disp,
        }
    }

    fn x_ext(&self) -> bool {
        self.index.is_some_and(|(i, _)| bit3(i))
    }
}

/// Emit ModR/M + SIB + displacement for a memory operand.
fn emit_mem(buf: &mut InstrBytes, reg: u8, m: &MemRef) {
    let base = m.base & 7;
    // RBP/R13 as base cannot use mod=00.
    let disp = match m.disp {
        Disp::None if base == 5 => Disp::D8(0),
        d => d,
    };
    let mod_ = match disp {
        Disp::None => 0b00,
        Disp::D8(_) => 0b01,
        Disp::D32(_) => 0b10,
    };
    if m.index.is_some() || base == 4 {
        // index 0b100 = none
        let (index, scale) = m.index.unwrap_or((4, Scale::S1));
        buf.push(modrm(mod_, reg, 0b100));
        buf.push(sib(scale, index, base));
    } else {
        buf.push(modrm(mod_, reg, base));
    }
    match disp {
        Disp::None => {}
        Disp::D8(d) => buf.push(d as u8),
        Disp::D32(d) => buf.extend_from_slice(&d.to_le_bytes()),
    }
}

// ── VEX / EVEX ───────────────────────────────────────────────────────────

/// Prefix scheme and vector length for one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Enc {
    /// `L` = 256-bit.
    Vex(bool),
    /// `L'L`: 0 = 128, 1 = 256, 2 = 512.
    Evex(u8),
}

/// Default encoding for full-vector instructions on the active profile.
fn vector_enc(cx: &Cx<'_>) -> Enc {
    if cx.profile.feature(Features::MASK_REGS) {
        Enc::Evex(match cx.len {
            128 => 0,
            256 => 1,
            _ => 2,
        })
    } else {
        Enc::Vex(cx.len == 256)
    }
}

/// `ModRM.rm` operand.
#[derive(Debug, Clone, Copy)]
enum RmArg {
    Reg(u8),
    Mem(MemRef),
}

/// Encode one VEX or EVEX instruction.
fn encode(
    cx: &Cx<'_>,
    enc: Enc,
    op: &VOp,
    reg: u8,
    vvvv: u8,
    rm: RmArg,
    imm: Option<u8>,
) -> Result<InstrBytes, EncodeError> {
    let (x_ext, b_ext, rm_hi) = match rm {
        RmArg::Reg(r) => (false, bit3(r), bit4(r)),
        RmArg::Mem(ref m) => (m.x_ext(), bit3(m.base), false),
    };
    let mut buf = InstrBytes::new();
    match enc {
        Enc::Evex(ll) => {
            // P0: ~R ~X ~B ~R' 0 0 mm. In register form X carries rm bit 4.
            let p0 = (if bit3(reg) { 0 } else { 0x80 })
                | (if x_ext || rm_hi { 0 } else { 0x40 })
                | (if b_ext { 0 } else { 0x20 })
                | (if bit4(reg) { 0 } else { 0x10 })
                | (op.map & 0x03);
            // P1: W ~vvvv 1 pp
            let p1 = (if op.ew { 0x80 } else { 0 }) | (((!vvvv) & 0x0F) << 3) | 0x04 | (op.pp & 0x03);
            // P2: z L'L b ~V' aaa
            let p2 = ((ll & 0x03) << 5) | (if bit4(vvvv) { 0 } else { 0x08 });
            buf.extend_from_slice(&[0x62, p0, p1, p2]);
        }
        Enc::Vex(l) => {
            if op.evex_only || bit4(reg) || bit4(vvvv) || rm_hi {
                return Err(EncodeError::unsupported(op.name, cx.profile.id));
            }
            let tail = (((!vvvv) & 0x0F) << 3) | ((l as u8) << 2) | (op.pp & 0x03);
            if op.map == M0F && !op.vw && !x_ext && !b_ext {
                buf.push(0xC5);
                buf.push((if bit3(reg) { 0 } else { 0x80 }) | tail);
            } else {
                buf.push(0xC4);
                buf.push(
                    (if bit3(reg) { 0 } else { 0x80 })
                        | (if x_ext { 0 } else { 0x40 })
                        | (if b_ext { 0 } else { 0x20 })
                        | (op.map & 0x1F),
                );
                buf.push((if op.vw { 0x80 } else { 0 }) | tail);
            }
        }
    }
    buf.push(op.opcode);
    match rm {
        RmArg::Reg(r) => buf.push(modrm(0b11, reg, r)),
        RmArg::Mem(ref m) => emit_mem(&mut buf, reg, m),
    }
    if let Some(imm) = imm {
        buf.push(imm);
    }
    Ok(buf)
}

/// Resolve a vector memory operand, synthesising the address in r11 when
/// no displacement tier holds it.
fn locate(cx: &mut Cx<'_>, addr: Addr) -> Result<(MemRef, Displacement, ClobberSet), EncodeError> {
    let resolution = cx.profile.resolve_displacement_at(addr.disp, cx.bytes());
    let record = Displacement {
        value: addr.disp,
        resolution,
    };
    match resolution {
        DispResolution::Direct { tier, .. } => {
            let field = addr.disp / i64::from(tier.scale);
            let disp = if addr.disp == 0 {
                Disp::None
            } else if tier.bits <= 8 {
                Disp::D8(field as i8)
            } else {
                Disp::D32(field as i32)
            };
            let m = MemRef {
                base: addr.base,
                index: addr.index,
                disp,
            };
            Ok((m, record, ClobberSet::NONE))
        }
        DispResolution::RequiresScratchAddress => {
            let r11 = cx.sgpr(1);
            log::debug!("x86: displacement {} synthesised in r{}", addr.disp, r11);
            let clob = ClobberSet::gpr(r11);
            // mov r11, imm64
            let mut mov = InstrBytes::new();
            mov.push(rex(true, false, false, bit3(r11)));
            mov.push(0xB8 | (r11 & 7));
            mov.extend_from_slice(&addr.disp.to_le_bytes());
            cx.push_with(Fragment::from_bytes(&mov), clob);
            // add r11, base
            cx.push_with(
                Fragment::from_bytes(&legacy_rr(&[0x01], true, addr.base, r11)),
                clob | ClobberSet::flags(),
            );
            let m = MemRef {
                base: r11,
                index: addr.index,
                disp: Disp::None,
            };
            Ok((m, record, clob))
        }
    }
}

/// Emit one vector instruction with the profile's default encoding.
fn emit(cx: &mut Cx<'_>, op: &VOp, reg: u8, vvvv: u8, rm: &Src, imm: Option<u8>) -> Result<(), EncodeError> {
    let enc = vector_enc(cx);
    match *rm {
        Rm::Reg(r) => {
            let b = encode(cx, enc, op, reg, vvvv, RmArg::Reg(r), imm)?;
            cx.push(Fragment::from_bytes(&b));
        }
        Rm::Mem(addr) => {
            let (m, disp, clob) = locate(cx, addr)?;
            let b = encode(cx, enc, op, reg, vvvv, RmArg::Mem(m), imm)?;
            cx.push_with(Fragment::from_bytes(&b).with_disp(disp), clob);
        }
    }
    Ok(())
}

#[inline]
fn emit_rrr(cx: &mut Cx<'_>, op: &VOp, reg: u8, vvvv: u8, rm: u8) -> Result<(), EncodeError> {
    emit(cx, op, reg, vvvv, &Rm::Reg(rm), None)
}

// ── Legacy scalar encodings ──────────────────────────────────────────────

/// `op reg, rm` with register `rm`.
fn legacy_rr(opcode: &[u8], w: bool, reg: u8, rm: u8) -> InstrBytes {
    let mut b = InstrBytes::new();
    if w || bit3(reg) || bit3(rm) {
        b.push(rex(w, bit3(reg), false, bit3(rm)));
    }
    b.extend_from_slice(opcode);
    b.push(modrm(0b11, reg, rm));
    b
}

/// `op reg, [mem]` / `op [mem], reg`.
fn legacy_mem(opcode: &[u8], w: bool, reg: u8, m: &MemRef) -> InstrBytes {
    let mut b = InstrBytes::new();
    if w || bit3(reg) || m.x_ext() || bit3(m.base) {
        b.push(rex(w, bit3(reg), m.x_ext(), bit3(m.base)));
    }
    b.extend_from_slice(opcode);
    emit_mem(&mut b, reg, m);
    b
}

fn push_bytes(cx: &mut Cx<'_>, b: InstrBytes) {
    cx.push(Fragment::from_bytes(&b));
}

// ── Arithmetic ───────────────────────────────────────────────────────────

fn binary(cx: &mut Cx<'_>, op: Op, elem: Elem, dst: u8, a: u8, b: &Src) -> Result<(), EncodeError> {
    let f = elem.is_float();
    let vop = match op {
        Op::Add if f => pick(&ADDP, elem),
        Op::Add => pick(&PADD, elem),
        Op::Sub if f => pick(&SUBP, elem),
        Op::Sub => pick(&PSUB, elem),
        Op::Mul if f => pick(&MULP, elem),
        Op::Mul => pick(&PMULL, elem),
        Op::Div if f => pick(&DIVP, elem),
        Op::Min if f => pick(&MINP, elem),
        Op::Min => pick(&PMINS, elem),
        Op::Max if f => pick(&MAXP, elem),
        Op::Max => pick(&PMAXS, elem),
        Op::And => &PAND,
        Op::Or => &POR,
        Op::Xor => &PXOR,
        Op::AndNot => {
            // vpandn computes !vvvv & rm
            let b = stage::<Avx>(cx, elem, b)?;
            return emit(cx, &PANDN, dst, b, &Rm::Reg(a), None);
        }
        Op::CmpEq | Op::CmpNe | Op::CmpLt | Op::CmpLe | Op::CmpGt | Op::CmpGe => {
            return compare(cx, op, elem, dst, a, b);
        }
        _ => return Err(no_form(cx, op, elem)),
    };
    if vop.evex_only && !cx.profile.feature(Features::MASK_REGS) {
        return Err(no_form(cx, op, elem));
    }
    emit(cx, vop, dst, a, b, None)
}

fn compare(cx: &mut Cx<'_>, op: Op, elem: Elem, dst: u8, a: u8, b: &Src) -> Result<(), EncodeError> {
    if cx.profile.feature(Features::MASK_REGS) {
        return mask_compare(cx, op, elem, dst, a, b);
    }
    if elem.is_float() {
        let pred = match op {
            Op::CmpEq => CMP_EQ_OQ,
            Op::CmpNe => CMP_NEQ_UQ,
            Op::CmpLt => CMP_LT_OS,
            Op::CmpLe => CMP_LE_OS,
            Op::CmpGt => CMP_GT_OS,
            _ => CMP_GE_OS,
        };
        return emit(cx, pick(&CMPP, elem), dst, a, b, Some(pred));
    }
    // Integer VEX compares only have EQ and signed GT.
    let (eq, gt) = (pick(&PCMPEQ, elem), pick(&PCMPGT, elem));
    let negate = matches!(op, Op::CmpNe | Op::CmpGe | Op::CmpLe);
    match op {
        Op::CmpEq | Op::CmpNe => emit(cx, eq, dst, a, b, None)?,
        Op::CmpGt | Op::CmpLe => emit(cx, gt, dst, a, b, None)?,
        _ => {
            let b = stage::<Avx>(cx, elem, b)?;
            emit_rrr(cx, gt, dst, b, a)?;
        }
    }
    if negate {
        let s0 = cx.scratch(0);
        cx.with_clobbers(ClobberSet::vreg(s0), |cx| {
            emit_rrr(cx, pick(&PCMPEQ, Elem::I32), s0, s0, s0)?;
            emit_rrr(cx, &PXOR, dst, dst, s0)
        })?;
    }
    Ok(())
}

/// AVX-512: compare into the scratch mask register, then expand the mask
/// back to a lane vector.
fn mask_compare(cx: &mut Cx<'_>, op: Op, elem: Elem, dst: u8, a: u8, b: &Src) -> Result<(), EncodeError> {
    let k = cx.profile.scratch_mask.unwrap_or(1);
    let (vop, pred) = if elem.is_float() {
        let pred = match op {
            Op::CmpEq => CMP_EQ_OQ,
            Op::CmpNe => CMP_NEQ_UQ,
            Op::CmpLt => CMP_LT_OS,
            Op::CmpLe => CMP_LE_OS,
            Op::CmpGt => CMP_GT_OS,
            _ => CMP_GE_OS,
        };
        (pick(&CMPP, elem), pred)
    } else {
        let pred = match op {
            Op::CmpEq => PCMP_EQ,
            Op::CmpNe => PCMP_NE,
            Op::CmpLt => PCMP_LT,
            Op::CmpLe => PCMP_LE,
            Op::CmpGt => PCMP_GT,
            _ => PCMP_GE,
        };
        (pick(&PCMP, elem), pred)
    };
    cx.with_clobbers(ClobberSet::mask(k), |cx| {
        emit(cx, vop, k, a, b, Some(pred))?;
        emit_rrr(cx, pick(&PMOVM2, elem), dst, 0, k)
    })
}

fn unary(cx: &mut Cx<'_>, op: Op, elem: Elem, dst: u8, src: &Src) -> Result<(), EncodeError> {
    let evex = cx.profile.feature(Features::MASK_REGS);
    let vop = match op {
        Op::Sqrt => pick(&SQRTP, elem),
        Op::RcpEst if evex => pick(&RCP14, elem),
        Op::RsqrtEst if evex => pick(&RSQRT14, elem),
        Op::RcpEst if elem == Elem::F32 => &RCPPS,
        Op::RsqrtEst if elem == Elem::F32 => &RSQRTPS,
        Op::CvtToInt => pick(&CVTT, elem),
        Op::CvtToFloat => pick(&CVTF, elem),
        _ => return Err(no_form(cx, op, elem)),
    };
    if vop.evex_only && !evex {
        return Err(no_form(cx, op, elem));
    }
    emit(cx, vop, dst, 0, src, None)
}

/// Shift by immediate: `vvvv` is the destination, `ModRM.reg` selects the
/// operation.
fn shift(cx: &mut Cx<'_>, op: Op, elem: Elem, dst: u8, src: u8, amount: u8) -> Result<(), EncodeError> {
    let (vop, digit) = match op {
        Op::Shl => (pick(&PSHIFT, elem), SHL_DIGIT),
        Op::Shr => (pick(&PSHIFT, elem), SHR_DIGIT),
        Op::Sar if elem.is_double() => (&PSRAQ, SAR_DIGIT),
        Op::Sar => (pick(&PSHIFT, Elem::I32), SAR_DIGIT),
        _ => return Err(no_form(cx, op, elem)),
    };
    emit(cx, vop, digit, dst, &Rm::Reg(src), Some(amount))
}

fn shift_imm(cx: &mut Cx<'_>, elem: Elem, op: Op, dst: u8, amount: u8) -> Result<(), EncodeError> {
    shift(cx, op, elem, dst, dst, amount)
}

// ── Avx ──────────────────────────────────────────────────────────────────

/// x86-64 AVX family encoder (VEX on AVX/AVX2, EVEX on AVX-512).
#[derive(Debug, Clone, Copy, Default)]
pub struct Avx;

impl Isa for Avx {
    fn native(cx: &mut Cx<'_>, op: Op, elem: Elem, form: &PForm) -> Result<(), EncodeError> {
        match *form {
            Form::Binary { dst, a, b } => binary(cx, op, elem, dst, a, &b),
            Form::Unary { dst, src } => unary(cx, op, elem, dst, &src),
            Form::Fused { acc, a, b } => {
                let pair = match op {
                    Op::Fma => &FMADD231,
                    Op::Fms => &FNMADD231,
                    _ => return Err(no_form(cx, op, elem)),
                };
                emit(cx, pick(pair, elem), acc, a, &b, None)
            }
            Form::Shift { dst, src, amount } => shift(cx, op, elem, dst, src, amount),
            Form::Mov { dst, src } => emit_rrr(cx, &MOVAPS, dst, 0, src),
            Form::Load { dst, mem } => emit(cx, &MOVUPS_LOAD, dst, 0, &Rm::Mem(mem), None),
            Form::Store { mem, src } => emit(cx, &MOVUPS_STORE, src, 0, &Rm::Mem(mem), None),
        }
    }

    /// Constants are derived from an all-ones vector by a logical right
    /// shift that leaves the exponent pattern, then a left shift into place.
    fn splat(cx: &mut Cx<'_>, elem: Elem, dst: u8, k: Konst) -> Result<(), EncodeError> {
        if cx.profile.feature(Features::MASK_REGS) {
            emit(cx, &PTERNLOGD, dst, dst, &Rm::Reg(dst), Some(0xFF))?;
        } else {
            emit_rrr(cx, pick(&PCMPEQ, Elem::I32), dst, dst, dst)?;
        }
        let lane = if elem.is_double() { Elem::I64 } else { Elem::I32 };
        let (right, left) = match (k, elem.is_double()) {
            (Konst::AllOnes, _) => return Ok(()),
            // 0x3F800000 / 0x3F000000
            (Konst::One, false) => (25, 23),
            (Konst::Half, false) => (26, 24),
            // 0x3FF0… / 0x3FE0…
            (Konst::One, true) => (54, 52),
            (Konst::Half, true) => (55, 53),
        };
        shift_imm(cx, lane, Op::Shr, dst, right)?;
        shift_imm(cx, lane, Op::Shl, dst, left)
    }

    /// Lanes are spilled to the red zone below rsp and processed with
    /// `idiv`/`imul`. rdx is preserved through r10.
    fn lane_loop(
        cx: &mut Cx<'_>,
        op: ScalarOp,
        elem: Elem,
        dst: u8,
        a: u8,
        b: &Src,
    ) -> Result<(), EncodeError> {
        let b = stage::<Avx>(cx, elem, b)?;
        let sp = cx.profile.stack_gpr;
        let (r10, rax) = (cx.sgpr(0), cx.sgpr(2));
        let bytes = i64::from(cx.bytes());
        let esize = i64::from(elem.bytes());
        let w = elem.is_double();
        let frame = -2 * bytes;
        let clob = ClobberSet::gpr(r10) | ClobberSet::gpr(rax) | ClobberSet::flags() | ClobberSet::memory();
        cx.with_clobbers(clob, |cx| {
            emit(cx, &MOVUPS_STORE, a, 0, &Rm::Mem(Addr::new(sp, frame)), None)?;
            emit(cx, &MOVUPS_STORE, b, 0, &Rm::Mem(Addr::new(sp, frame + bytes)), None)?;
            let divides = op != ScalarOp::Mul;
            if divides {
                // mov r10, rdx
                push_bytes(cx, legacy_rr(&[0x89], true, RDX, r10));
            }
            for lane in 0..bytes / esize {
                let lhs = MemRef::plain(sp, frame + lane * esize);
                let rhs = MemRef::plain(sp, frame + bytes + lane * esize);
                push_bytes(cx, legacy_mem(&[0x8B], w, rax, &lhs));
                let result = match op {
                    ScalarOp::Mul => {
                        push_bytes(cx, legacy_mem(&[0x0F, 0xAF], w, rax, &rhs));
                        rax
                    }
                    ScalarOp::Div | ScalarOp::Rem => {
                        // cdq / cqo
                        let sign = if w { InstrBytes::from_slice(&[0x48, 0x99]) } else { InstrBytes::from_slice(&[0x99]) };
                        push_bytes(cx, sign);
                        push_bytes(cx, legacy_mem(&[0xF7], w, 7, &rhs));
                        if op == ScalarOp::Div {
                            rax
                        } else {
                            RDX
                        }
                    }
                };
                push_bytes(cx, legacy_mem(&[0x89], w, result, &lhs));
            }
            if divides {
                // mov rdx, r10
                push_bytes(cx, legacy_rr(&[0x89], true, r10, RDX));
            }
            emit(cx, &MOVUPS_LOAD, dst, 0, &Rm::Mem(Addr::new(sp, frame)), None)
        })
    }

    fn reduce_branch(cx: &mut Cx<'_>, mask: u8, cond: Cond, label: Label) -> Result<(), EncodeError> {
        let r11 = cx.sgpr(1);
        let lanes = cx.len / 32;
        let mut clob = ClobberSet::gpr(r11) | ClobberSet::flags();
        let k = cx.profile.scratch_mask;
        if let Some(k) = k {
            clob = clob | ClobberSet::mask(k);
        }
        cx.with_clobbers(clob, |cx| {
            match (k, vector_enc(cx)) {
                (Some(k), enc @ Enc::Evex(_)) => {
                    let b = encode(cx, enc, &PMOVD2M, k, 0, RmArg::Reg(mask), None)?;
                    push_bytes(cx, b);
                    let b = encode(cx, Enc::Vex(false), &KMOVW, r11, 0, RmArg::Reg(k), None)?;
                    push_bytes(cx, b);
                }
                (_, enc) => {
                    let b = encode(cx, enc, &MOVMSKPS, r11, 0, RmArg::Reg(mask), None)?;
                    push_bytes(cx, b);
                }
            }
            match cond {
                Cond::AllLanes => {
                    // cmp r11d, imm32
                    let mut b = legacy_rr(&[0x81], false, 7, r11);
                    b.extend_from_slice(&((1u32 << lanes) - 1).to_le_bytes());
                    push_bytes(cx, b);
                }
                // test r11d, r11d
                Cond::NoLanes => push_bytes(cx, legacy_rr(&[0x85], false, r11, r11)),
            }
            // je rel32
            cx.push(Fragment::from_bytes(&[0x0F, 0x84, 0, 0, 0, 0]).with_fixup(Fixup {
                label,
                kind: FixupKind::Rel32,
            }));
            Ok(())
        })
    }

    fn jump(cx: &mut Cx<'_>, label: Label) -> Result<(), EncodeError> {
        cx.push(Fragment::from_bytes(&[0xE9, 0, 0, 0, 0]).with_fixup(Fixup {
            label,
            kind: FixupKind::Rel32,
        }));
        Ok(())
    }

    fn ret(cx: &mut Cx<'_>) -> Result<(), EncodeError> {
        cx.push(Fragment::from_bytes(&[0xC3]));
        Ok(())
    }
}
