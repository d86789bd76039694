//! Instruction macros: the portable operation vocabulary.
//!
//! An [`Instr`] names an [`Op`], an element type, a logical width, and up
//! to three operand tokens. [`Instr::form`] checks the operands against the
//! op's arity and token roles and yields a normalised [`Form`].

use alloc::format;
use core::fmt;

use crate::error::EncodeError;
use crate::operand::{Mem, Operand, Role, VReg};

// ── Element type ─────────────────────────────────────────────

/// Lane element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Elem {
    /// IEEE-754 binary32.
    F32,
    /// IEEE-754 binary64.
    F64,
    /// Two's-complement 32-bit integer.
    I32,
    /// Two's-complement 64-bit integer.
    I64,
}

impl Elem {
    /// All element types.
    pub const ALL: [Elem; 4] = [Elem::F32, Elem::F64, Elem::I32, Elem::I64];

    /// Lane width in bits.
    #[inline]
    pub fn bits(self) -> u32 {
        match self {
            Elem::F32 | Elem::I32 => 32,
            Elem::F64 | Elem::I64 => 64,
        }
    }

    /// Lane width in bytes.
    #[inline]
    pub fn bytes(self) -> u32 {
        self.bits() / 8
    }

    /// Whether lanes hold floating-point values.
    #[inline]
    pub fn is_float(self) -> bool {
        matches!(self, Elem::F32 | Elem::F64)
    }

    /// Whether lanes are 64 bits wide.
    #[inline]
    pub fn is_double(self) -> bool {
        self.bits() == 64
    }

    /// Suffix used in mnemonic text.
    pub fn name(self) -> &'static str {
        match self {
            Elem::F32 => "f32",
            Elem::F64 => "f64",
            Elem::I32 => "i32",
            Elem::I64 => "i64",
        }
    }

    /// Parse a mnemonic suffix.
    pub fn from_name(s: &str) -> Option<Self> {
        Elem::ALL.into_iter().find(|e| e.name() == s)
    }
}

impl fmt::Display for Elem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Logical width ────────────────────────────────────────────

/// Logical vector width requested by portable code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Width {
    /// The profile's native width.
    #[default]
    Native,
    /// 128 bits.
    W128,
    /// 256 bits.
    W256,
    /// 512 bits.
    W512,
    /// 1024 bits.
    W1024,
}

impl Width {
    /// Width in bits, with `Native` resolved against `native`.
    #[inline]
    pub fn bits(self, native: u32) -> u32 {
        match self {
            Width::Native => native,
            Width::W128 => 128,
            Width::W256 => 256,
            Width::W512 => 512,
            Width::W1024 => 1024,
        }
    }

    /// Width from a bit count.
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            128 => Some(Width::W128),
            256 => Some(Width::W256),
            512 => Some(Width::W512),
            1024 => Some(Width::W1024),
            _ => None,
        }
    }
}

// ── Operation ────────────────────────────────────────────────

/// Portable operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    /// Truncated remainder (sign follows the dividend).
    Rem,
    Min,
    Max,
    Sqrt,
    /// Reciprocal at full element precision.
    Rcp,
    /// Reciprocal square root at full element precision.
    Rsqrt,
    /// Hardware reciprocal estimate (target-dependent precision).
    RcpEst,
    /// Hardware reciprocal square-root estimate.
    RsqrtEst,
    /// `acc + a*b`
    Fma,
    /// `acc - a*b`
    Fms,
    And,
    Or,
    Xor,
    /// `a & !b`
    AndNot,
    Shl,
    /// Logical right shift.
    Shr,
    /// Arithmetic right shift.
    Sar,
    CmpEq,
    CmpNe,
    CmpLt,
    CmpLe,
    CmpGt,
    CmpGe,
    /// Float to integer of the same width, rounding toward zero. The
    /// element names the integer result.
    CvtToInt,
    /// Integer to float of the same width. The element names the float
    /// result.
    CvtToFloat,
    Mov,
    Load,
    Store,
}

impl Op {
    /// All operations, in declaration order.
    pub const ALL: [Op; 32] = [
        Op::Add,
        Op::Sub,
        Op::Mul,
        Op::Div,
        Op::Rem,
        Op::Min,
        Op::Max,
        Op::Sqrt,
        Op::Rcp,
        Op::Rsqrt,
        Op::RcpEst,
        Op::RsqrtEst,
        Op::Fma,
        Op::Fms,
        Op::And,
        Op::Or,
        Op::Xor,
        Op::AndNot,
        Op::Shl,
        Op::Shr,
        Op::Sar,
        Op::CmpEq,
        Op::CmpNe,
        Op::CmpLt,
        Op::CmpLe,
        Op::CmpGt,
        Op::CmpGe,
        Op::CvtToInt,
        Op::CvtToFloat,
        Op::Mov,
        Op::Load,
        Op::Store,
    ];

    /// Mnemonic stem.
    pub fn name(self) -> &'static str {
        match self {
            Op::Add => "add",
            Op::Sub => "sub",
            Op::Mul => "mul",
            Op::Div => "div",
            Op::Rem => "rem",
            Op::Min => "min",
            Op::Max => "max",
            Op::Sqrt => "sqrt",
            Op::Rcp => "rcp",
            Op::Rsqrt => "rsqrt",
            Op::RcpEst => "rcpe",
            Op::RsqrtEst => "rsqrte",
            Op::Fma => "fma",
            Op::Fms => "fms",
            Op::And => "and",
            Op::Or => "or",
            Op::Xor => "xor",
            Op::AndNot => "andn",
            Op::Shl => "shl",
            Op::Shr => "shr",
            Op::Sar => "sar",
            Op::CmpEq => "cmpeq",
            Op::CmpNe => "cmpne",
            Op::CmpLt => "cmplt",
            Op::CmpLe => "cmple",
            Op::CmpGt => "cmpgt",
            Op::CmpGe => "cmpge",
            Op::CvtToInt => "cvti",
            Op::CvtToFloat => "cvtf",
            Op::Mov => "mov",
            Op::Load => "ld",
            Op::Store => "st",
        }
    }

    /// Parse a mnemonic stem.
    pub fn from_name(s: &str) -> Option<Self> {
        Op::ALL.into_iter().find(|op| op.name() == s)
    }

    /// Whether `elem` is meaningful for this op.
    pub fn accepts(self, elem: Elem) -> bool {
        match self {
            Op::Rem | Op::Shl | Op::Shr | Op::Sar | Op::CvtToInt => !elem.is_float(),
            Op::Sqrt
            | Op::Rcp
            | Op::Rsqrt
            | Op::RcpEst
            | Op::RsqrtEst
            | Op::Fma
            | Op::Fms
            | Op::CvtToFloat => elem.is_float(),
            _ => true,
        }
    }

    /// Semantic class of this op applied to `elem`.
    pub fn class(self, elem: Elem) -> Class {
        match self {
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Rem | Op::Min | Op::Max => {
                if elem.is_float() {
                    Class::FloatArith
                } else {
                    Class::IntArith
                }
            }
            Op::Sqrt | Op::Rcp | Op::Rsqrt | Op::RcpEst | Op::RsqrtEst | Op::Fma | Op::Fms => {
                Class::FloatArith
            }
            Op::And | Op::Or | Op::Xor | Op::AndNot => Class::Logic,
            Op::Shl | Op::Shr | Op::Sar => Class::Shift,
            Op::CmpEq | Op::CmpNe | Op::CmpLt | Op::CmpLe | Op::CmpGt | Op::CmpGe => {
                Class::Compare
            }
            Op::CvtToInt | Op::CvtToFloat => Class::Convert,
            Op::Mov | Op::Load | Op::Store => Class::Move,
        }
    }

    /// Operand arity shape.
    pub fn arity(self) -> Arity {
        match self {
            Op::Sqrt | Op::Rcp | Op::Rsqrt | Op::RcpEst | Op::RsqrtEst | Op::CvtToInt
            | Op::CvtToFloat => Arity::Unary,
            Op::Fma | Op::Fms => Arity::Fused,
            Op::Shl | Op::Shr | Op::Sar => Arity::Shift,
            Op::Mov => Arity::Mov,
            Op::Load => Arity::Load,
            Op::Store => Arity::Store,
            _ => Arity::Binary,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Semantic class of an instruction macro.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Class {
    /// Packed floating-point arithmetic.
    FloatArith,
    /// Packed integer arithmetic.
    IntArith,
    /// Bitwise logic.
    Logic,
    /// Compare producing a lane mask.
    Compare,
    /// Float/integer conversion.
    Convert,
    /// Shift by immediate.
    Shift,
    /// Register move, load, or store.
    Move,
    /// Branch on mask, jump, or return.
    Branch,
}

impl Class {
    /// Whether this class counts as arithmetic for the single-template
    /// construction check.
    pub fn is_arith(self) -> bool {
        matches!(self, Class::FloatArith | Class::IntArith)
    }
}

/// Operand arity shape of an op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// `[DstSrc, Src|Mem]` or `[Dst, Src, Src|Mem]`.
    Binary,
    /// `[Dst, Src|Mem]`.
    Unary,
    /// `[DstSrc, Src, Src|Mem]`.
    Fused,
    /// `[Dst, Src, Imm]` or `[DstSrc, Imm]`.
    Shift,
    /// `[Dst, Src]`.
    Mov,
    /// `[Dst, Mem]`.
    Load,
    /// `[Mem, Src]`.
    Store,
}

/// Branch condition for predicate reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Cond {
    /// Taken when every lane of the mask is set.
    AllLanes,
    /// Taken when no lane of the mask is set.
    NoLanes,
}

// ── Mnemonic ─────────────────────────────────────────────────

/// Full mnemonic: op, element type, and width (`div.i32.w256`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mnemonic {
    /// Operation.
    pub op: Op,
    /// Element type.
    pub elem: Elem,
    /// Logical width.
    pub width: Width,
}

impl Mnemonic {
    /// Parse `op.elem[.wN]`.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split('.');
        let op = Op::from_name(parts.next()?)?;
        let elem = Elem::from_name(parts.next()?)?;
        let width = match parts.next() {
            None => Width::Native,
            Some(w) => Width::from_bits(w.strip_prefix('w')?.parse().ok()?)?,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self { op, elem, width })
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.op, self.elem)?;
        if self.width != Width::Native {
            write!(f, ".w{}", self.width.bits(0))?;
        }
        Ok(())
    }
}

// ── OperandList: inline operand array ────────────────────────

/// Inline operand list (max 3 operands).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OperandList {
    items: [Operand; 3],
    len: u8,
}

impl OperandList {
    /// Maximum number of operands.
    pub const MAX_LEN: usize = 3;

    /// Empty list.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a slice.
    ///
    /// # Panics
    ///
    /// Panics if `ops` holds more than [`OperandList::MAX_LEN`] operands.
    pub fn from_slice(ops: &[Operand]) -> Self {
        let mut list = Self::new();
        for &op in ops {
            list.push(op);
        }
        list
    }

    /// Append an operand.
    ///
    /// # Panics
    ///
    /// Panics if the list is full.
    #[inline]
    pub fn push(&mut self, op: Operand) {
        assert!(
            (self.len as usize) < Self::MAX_LEN,
            "OperandList overflow: max {} operands",
            Self::MAX_LEN
        );
        self.items[self.len as usize] = op;
        self.len += 1;
    }

    /// Active operands.
    #[inline]
    pub fn as_slice(&self) -> &[Operand] {
        &self.items[..self.len as usize]
    }
}

impl core::ops::Deref for OperandList {
    type Target = [Operand];
    #[inline]
    fn deref(&self) -> &[Operand] {
        self.as_slice()
    }
}

impl fmt::Debug for OperandList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice().iter()).finish()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for OperandList {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(self.len as usize))?;
        for op in self.as_slice() {
            seq.serialize_element(op)?;
        }
        seq.end()
    }
}

// ── Instr ────────────────────────────────────────────────────

/// One instruction macro call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Instr {
    /// Operation.
    pub op: Op,
    /// Element type.
    pub elem: Elem,
    /// Logical width.
    pub width: Width,
    /// Operand tokens.
    pub operands: OperandList,
}

impl Instr {
    /// New instruction at native width.
    ///
    /// # Panics
    ///
    /// Panics if more than three operands are given.
    pub fn new(op: Op, elem: Elem, operands: &[Operand]) -> Self {
        Self {
            op,
            elem,
            width: Width::Native,
            operands: OperandList::from_slice(operands),
        }
    }

    /// The same instruction at a different logical width.
    #[must_use]
    pub fn at(self, width: Width) -> Self {
        Self { width, ..self }
    }

    /// Mnemonic of this instruction.
    pub fn mnemonic(&self) -> Mnemonic {
        Mnemonic {
            op: self.op,
            elem: self.elem,
            width: self.width,
        }
    }

    /// Semantic class.
    pub fn class(&self) -> Class {
        self.op.class(self.elem)
    }

    /// Validate operands against the op's arity and roles.
    ///
    /// # Errors
    ///
    /// `InvalidOperands` on a wrong count, kind, or element type,
    /// `RoleMismatch` when a register token's role does not fit its
    /// position, and `FieldOverflow` when a shift amount is out of range.
    pub fn form(&self) -> Result<Form<VReg, Mem>, EncodeError> {
        let m = self.mnemonic();
        if !self.op.accepts(self.elem) {
            return Err(EncodeError::invalid(
                m,
                &format!("{} has no {} form", self.op, self.elem),
            ));
        }
        let ops = self.operands.as_slice();
        let count = |n: &[usize]| {
            if n.contains(&ops.len()) {
                Ok(())
            } else {
                Err(EncodeError::invalid(
                    m,
                    &format!("expected {:?} operands, found {}", n, ops.len()),
                ))
            }
        };
        match self.op.arity() {
            Arity::Binary => {
                count(&[2, 3])?;
                if ops.len() == 2 {
                    let a = reg_at(m, ops, 0, Slot::ReadWrite)?;
                    Ok(Form::Binary {
                        dst: a,
                        a,
                        b: source_at(m, ops, 1)?,
                    })
                } else {
                    Ok(Form::Binary {
                        dst: reg_at(m, ops, 0, Slot::Write)?,
                        a: reg_at(m, ops, 1, Slot::Read)?,
                        b: source_at(m, ops, 2)?,
                    })
                }
            }
            Arity::Unary => {
                count(&[2])?;
                Ok(Form::Unary {
                    dst: reg_at(m, ops, 0, Slot::Write)?,
                    src: source_at(m, ops, 1)?,
                })
            }
            Arity::Fused => {
                count(&[3])?;
                Ok(Form::Fused {
                    acc: reg_at(m, ops, 0, Slot::ReadWrite)?,
                    a: reg_at(m, ops, 1, Slot::Read)?,
                    b: source_at(m, ops, 2)?,
                })
            }
            Arity::Shift => {
                count(&[2, 3])?;
                let (dst, src, imm) = if ops.len() == 2 {
                    let r = reg_at(m, ops, 0, Slot::ReadWrite)?;
                    (r, r, imm_at(m, ops, 1)?)
                } else {
                    (
                        reg_at(m, ops, 0, Slot::Write)?,
                        reg_at(m, ops, 1, Slot::Read)?,
                        imm_at(m, ops, 2)?,
                    )
                };
                let max = self.elem.bits() as i64 - 1;
                if !(0..=max).contains(&imm) {
                    return Err(EncodeError::FieldOverflow {
                        field: "shift",
                        value: imm,
                        min: 0,
                        max,
                    });
                }
                Ok(Form::Shift {
                    dst,
                    src,
                    amount: imm as u8,
                })
            }
            Arity::Mov => {
                count(&[2])?;
                Ok(Form::Mov {
                    dst: reg_at(m, ops, 0, Slot::Write)?,
                    src: reg_at(m, ops, 1, Slot::Read)?,
                })
            }
            Arity::Load => {
                count(&[2])?;
                Ok(Form::Load {
                    dst: reg_at(m, ops, 0, Slot::Write)?,
                    mem: mem_at(m, ops, 1)?,
                })
            }
            Arity::Store => {
                count(&[2])?;
                Ok(Form::Store {
                    mem: mem_at(m, ops, 0)?,
                    src: reg_at(m, ops, 1, Slot::Read)?,
                })
            }
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())?;
        for (i, op) in self.operands.iter().enumerate() {
            f.write_str(if i == 0 { " " } else { ", " })?;
            write!(f, "{}", op)?;
        }
        Ok(())
    }
}

// ── Normalised operand forms ─────────────────────────────────

/// Register or memory source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rm<R, M> {
    /// Register.
    Reg(R),
    /// Memory.
    Mem(M),
}

/// Operands normalised by arity. `R` is a register (logical token or
/// physical code) and `M` a memory operand (logical or resolved).
///
/// The destructive two-operand binary form `[a, b]` normalises to
/// `Binary { dst: a, a, b }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Form<R, M> {
    /// `dst = a op b`
    Binary {
        /// Destination.
        dst: R,
        /// First source.
        a: R,
        /// Second source.
        b: Rm<R, M>,
    },
    /// `dst = op src`
    Unary {
        /// Destination.
        dst: R,
        /// Source.
        src: Rm<R, M>,
    },
    /// `acc = acc ± a*b`
    Fused {
        /// Accumulator.
        acc: R,
        /// Multiplicand.
        a: R,
        /// Multiplier.
        b: Rm<R, M>,
    },
    /// `dst = src shift amount`
    Shift {
        /// Destination.
        dst: R,
        /// Source.
        src: R,
        /// Shift count, `0..elem_bits`.
        amount: u8,
    },
    /// `dst = src`
    Mov {
        /// Destination.
        dst: R,
        /// Source.
        src: R,
    },
    /// `dst = [mem]`
    Load {
        /// Destination.
        dst: R,
        /// Address.
        mem: M,
    },
    /// `[mem] = src`
    Store {
        /// Address.
        mem: M,
        /// Source.
        src: R,
    },
}

impl<R: Copy, M: Copy> Form<R, M> {
    /// Map registers and memory operands through fallible resolvers.
    pub fn try_map<R2, M2, E>(
        &self,
        mut reg: impl FnMut(R) -> Result<R2, E>,
        mut mem: impl FnMut(M) -> Result<M2, E>,
    ) -> Result<Form<R2, M2>, E> {
        Ok(match *self {
            Form::Binary { dst, a, b } => Form::Binary {
                dst: reg(dst)?,
                a: reg(a)?,
                b: map_rm(b, &mut reg, &mut mem)?,
            },
            Form::Unary { dst, src } => Form::Unary {
                dst: reg(dst)?,
                src: map_rm(src, &mut reg, &mut mem)?,
            },
            Form::Fused { acc, a, b } => Form::Fused {
                acc: reg(acc)?,
                a: reg(a)?,
                b: map_rm(b, &mut reg, &mut mem)?,
            },
            Form::Shift { dst, src, amount } => Form::Shift {
                dst: reg(dst)?,
                src: reg(src)?,
                amount,
            },
            Form::Mov { dst, src } => Form::Mov {
                dst: reg(dst)?,
                src: reg(src)?,
            },
            Form::Load { dst, mem: m } => Form::Load {
                dst: reg(dst)?,
                mem: mem(m)?,
            },
            Form::Store { mem: m, src } => Form::Store {
                mem: mem(m)?,
                src: reg(src)?,
            },
        })
    }

    /// Whether any operand is a memory reference.
    pub fn touches_memory(&self) -> bool {
        matches!(
            self,
            Form::Binary { b: Rm::Mem(_), .. }
                | Form::Unary { src: Rm::Mem(_), .. }
                | Form::Fused { b: Rm::Mem(_), .. }
                | Form::Load { .. }
                | Form::Store { .. }
        )
    }
}

fn map_rm<R, M, R2, M2, E>(
    x: Rm<R, M>,
    reg: &mut impl FnMut(R) -> Result<R2, E>,
    mem: &mut impl FnMut(M) -> Result<M2, E>,
) -> Result<Rm<R2, M2>, E> {
    match x {
        Rm::Reg(r) => reg(r).map(Rm::Reg),
        Rm::Mem(m) => mem(m).map(Rm::Mem),
    }
}

// ── Position checks ──────────────────────────────────────────

#[derive(Clone, Copy)]
enum Slot {
    Write,
    ReadWrite,
    Read,
}

impl Slot {
    fn accepts(self, role: Role) -> bool {
        match self {
            Slot::Write => role.writable(),
            Slot::ReadWrite => role == Role::DstSrc,
            Slot::Read => role.readable(),
        }
    }

    fn expected(self) -> &'static str {
        match self {
            Slot::Write => "destination",
            Slot::ReadWrite => "read-write destination",
            Slot::Read => "source",
        }
    }
}

fn reg_at(m: Mnemonic, ops: &[Operand], pos: usize, slot: Slot) -> Result<VReg, EncodeError> {
    match ops[pos] {
        Operand::V(v) if slot.accepts(v.role) => Ok(v),
        Operand::V(v) => Err(EncodeError::RoleMismatch {
            mnemonic: format!("{}", m),
            position: pos,
            expected: slot.expected(),
            found: v.role,
        }),
        other => Err(EncodeError::invalid(
            m,
            &format!("operand {} must be a vector register, found {}", pos, other),
        )),
    }
}

fn source_at(m: Mnemonic, ops: &[Operand], pos: usize) -> Result<Rm<VReg, Mem>, EncodeError> {
    match ops[pos] {
        Operand::M(mem) => Ok(Rm::Mem(mem)),
        _ => reg_at(m, ops, pos, Slot::Read).map(Rm::Reg),
    }
}

fn imm_at(m: Mnemonic, ops: &[Operand], pos: usize) -> Result<i64, EncodeError> {
    match ops[pos] {
        Operand::Imm(i) => Ok(i),
        other => Err(EncodeError::invalid(
            m,
            &format!("operand {} must be an immediate, found {}", pos, other),
        )),
    }
}

fn mem_at(m: Mnemonic, ops: &[Operand], pos: usize) -> Result<Mem, EncodeError> {
    match ops[pos] {
        Operand::M(mem) => Ok(mem),
        other => Err(EncodeError::invalid(
            m,
            &format!("operand {} must be a memory reference, found {}", pos, other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operand::GReg;

    fn v(role: Role, i: u8) -> Operand {
        Operand::V(VReg { role, index: i })
    }

    #[test]
    fn mnemonic_roundtrip() {
        let m = Mnemonic::parse("div.i32.w256").unwrap();
        assert_eq!(m.op, Op::Div);
        assert_eq!(m.elem, Elem::I32);
        assert_eq!(m.width, Width::W256);
        assert_eq!(alloc::format!("{}", m), "div.i32.w256");
        assert_eq!(alloc::format!("{}", Mnemonic::parse("add.f32").unwrap()), "add.f32");
    }

    #[test]
    fn mnemonic_rejects_garbage() {
        assert!(Mnemonic::parse("add").is_none());
        assert!(Mnemonic::parse("add.f16").is_none());
        assert!(Mnemonic::parse("add.f32.w100").is_none());
        assert!(Mnemonic::parse("add.f32.w256.x").is_none());
        assert!(Mnemonic::parse("frob.f32").is_none());
    }

    #[test]
    fn class_derivation() {
        assert_eq!(Op::Add.class(Elem::F32), Class::FloatArith);
        assert_eq!(Op::Add.class(Elem::I64), Class::IntArith);
        assert_eq!(Op::Xor.class(Elem::F32), Class::Logic);
        assert_eq!(Op::CmpLt.class(Elem::I32), Class::Compare);
        assert_eq!(Op::CvtToInt.class(Elem::I32), Class::Convert);
        assert_eq!(Op::Sar.class(Elem::I32), Class::Shift);
        assert_eq!(Op::Load.class(Elem::F64), Class::Move);
    }

    #[test]
    fn binary_two_operand_form_is_destructive() {
        let i = Instr::new(Op::Add, Elem::F32, &[v(Role::DstSrc, 0), v(Role::Src, 1)]);
        assert_eq!(
            i.form().unwrap(),
            Form::Binary {
                dst: VReg::dst_src(0),
                a: VReg::dst_src(0),
                b: Rm::Reg(VReg::src(1)),
            }
        );
    }

    #[test]
    fn two_operand_form_rejects_dst_only() {
        let i = Instr::new(Op::Add, Elem::F32, &[v(Role::Dst, 0), v(Role::Src, 1)]);
        match i.form() {
            Err(EncodeError::RoleMismatch { position, found, .. }) => {
                assert_eq!(position, 0);
                assert_eq!(found, Role::Dst);
            }
            other => panic!("expected RoleMismatch, got {:?}", other),
        }
    }

    #[test]
    fn dst_token_never_read() {
        let i = Instr::new(
            Op::Mul,
            Elem::F32,
            &[v(Role::Dst, 0), v(Role::Dst, 1), v(Role::Src, 2)],
        );
        assert!(matches!(
            i.form(),
            Err(EncodeError::RoleMismatch { position: 1, .. })
        ));
    }

    #[test]
    fn source_token_never_written() {
        let i = Instr::new(Op::Sqrt, Elem::F64, &[v(Role::Src, 0), v(Role::Src, 1)]);
        assert!(matches!(
            i.form(),
            Err(EncodeError::RoleMismatch { position: 0, .. })
        ));
    }

    #[test]
    fn fused_requires_read_write_accumulator() {
        let ok = Instr::new(
            Op::Fma,
            Elem::F32,
            &[v(Role::DstSrc, 0), v(Role::Src, 1), v(Role::Src2, 2)],
        );
        assert!(ok.form().is_ok());
        let bad = Instr::new(
            Op::Fma,
            Elem::F32,
            &[v(Role::Dst, 0), v(Role::Src, 1), v(Role::Src2, 2)],
        );
        assert!(matches!(bad.form(), Err(EncodeError::RoleMismatch { .. })));
    }

    #[test]
    fn shift_amount_range_checked() {
        let i = Instr::new(
            Op::Shl,
            Elem::I32,
            &[v(Role::Dst, 0), v(Role::Src, 1), Operand::Imm(32)],
        );
        assert_eq!(
            i.form(),
            Err(EncodeError::FieldOverflow {
                field: "shift",
                value: 32,
                min: 0,
                max: 31,
            })
        );
        let ok = Instr::new(Op::Shl, Elem::I64, &[v(Role::DstSrc, 0), Operand::Imm(63)]);
        assert!(ok.form().is_ok());
    }

    #[test]
    fn element_type_checked() {
        let i = Instr::new(Op::Sqrt, Elem::I32, &[v(Role::Dst, 0), v(Role::Src, 1)]);
        assert!(matches!(i.form(), Err(EncodeError::InvalidOperands { .. })));
        let i = Instr::new(Op::Rem, Elem::F32, &[v(Role::DstSrc, 0), v(Role::Src, 1)]);
        assert!(matches!(i.form(), Err(EncodeError::InvalidOperands { .. })));
    }

    #[test]
    fn load_and_store_forms() {
        let mem = Mem::new(GReg(0), 16);
        let ld = Instr::new(Op::Load, Elem::F32, &[v(Role::Dst, 0), Operand::M(mem)]);
        assert_eq!(
            ld.form().unwrap(),
            Form::Load {
                dst: VReg::dst(0),
                mem
            }
        );
        let st = Instr::new(Op::Store, Elem::F32, &[Operand::M(mem), v(Role::Src, 3)]);
        assert_eq!(
            st.form().unwrap(),
            Form::Store {
                mem,
                src: VReg::src(3)
            }
        );
        let bad = Instr::new(Op::Load, Elem::F32, &[v(Role::Dst, 0), v(Role::Src, 1)]);
        assert!(matches!(bad.form(), Err(EncodeError::InvalidOperands { .. })));
    }

    #[test]
    fn wrong_operand_count() {
        let i = Instr::new(Op::Add, Elem::F32, &[v(Role::DstSrc, 0)]);
        assert!(matches!(i.form(), Err(EncodeError::InvalidOperands { .. })));
    }

    #[test]
    fn display_instr() {
        let i = Instr::new(
            Op::Add,
            Elem::F32,
            &[
                v(Role::Dst, 0),
                v(Role::Src, 1),
                Operand::M(Mem::new(GReg(2), -32)),
            ],
        )
        .at(Width::W256);
        assert_eq!(alloc::format!("{}", i), "add.f32.w256 v0, v1, [r2 - 32]");
    }
}
