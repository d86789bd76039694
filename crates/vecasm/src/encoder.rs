//! Builder-pattern encoder for one procedure.
//!
//! [`Encoder`] ties the issuer, predicate reduction and the text front end
//! to an [`EmissionStream`], so callers can mix typed macros, source text,
//! labels and branches and get back the patched byte buffer.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::marker::PhantomData;

use crate::compat;
use crate::error::EncodeError;
use crate::fragment::{ClobberSet, Emission, EmissionStream, Label};
use crate::ir::{Arity, Cond, Instr, Mnemonic, Op, Width};
use crate::isa::{Cx, Isa};
use crate::issue::issue_with;
use crate::operand::{Operand, VReg};
use crate::parser::{self, Statement};
use crate::profile::Target;
use crate::reduce::reduce_with;

/// Resource limits for bounding encoder work on untrusted input.
///
/// # Examples
///
/// ```rust
/// # #[cfg(feature = "a64")] {
/// use vecasm::{A64Neon, Encoder, ResourceLimits};
///
/// let mut enc = Encoder::<A64Neon>::with_limits(ResourceLimits {
///     max_statements: 64,
///     ..ResourceLimits::default()
/// });
/// assert!(enc.emit_str("ret").is_ok());
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceLimits {
    /// Maximum number of statements (macros, branches, returns).
    /// Default: 1,000,000.
    pub max_statements: usize,
    /// Maximum number of labels. Default: 100,000.
    pub max_labels: usize,
    /// Maximum output size in bytes. Default: 16 MiB.
    pub max_output_bytes: usize,
    /// Maximum source bytes per [`Encoder::emit_str`] call. Default: 64 MiB.
    pub max_source_bytes: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_statements: 1_000_000,
            max_labels: 100_000,
            max_output_bytes: 16 * 1024 * 1024,
            max_source_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Builder-pattern encoder for target `T`.
///
/// # Examples
///
/// ```rust
/// # #[cfg(feature = "x86")] {
/// use vecasm::{Cond, Elem, Encoder, Instr, Op, VReg, Width, X64Avx256};
///
/// let mut enc = Encoder::<X64Avx256>::new();
/// let done = enc.new_label().unwrap();
/// enc.emit(&Instr::new(
///     Op::CmpEq,
///     Elem::I32,
///     &[VReg::dst(0).into(), VReg::src(1).into(), VReg::src2(2).into()],
/// ))
/// .unwrap();
/// enc.branch_on_mask(VReg::src(0), Width::Native, Cond::AllLanes, done)
///     .unwrap();
/// enc.bind(done).unwrap();
/// enc.ret().unwrap();
/// let code = enc.finish().unwrap();
/// assert_eq!(code.last(), Some(&0xC3));
/// # }
/// ```
pub struct Encoder<T: Target> {
    stream: EmissionStream,
    limits: ResourceLimits,
    /// Source-text label names and the labels they were given.
    named: Vec<(String, Label)>,
    statements: usize,
    labels: usize,
    _target: PhantomData<T>,
}

impl<T: Target> fmt::Debug for Encoder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encoder")
            .field("target", &T::PROFILE.id)
            .field("bytes", &self.stream.len())
            .field("statements", &self.statements)
            .field("labels", &self.labels)
            .finish()
    }
}

impl<T: Target> Default for Encoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Target> Encoder<T> {
    /// Create an encoder with default [`ResourceLimits`].
    pub fn new() -> Self {
        Self::with_limits(ResourceLimits::default())
    }

    /// Create an encoder with explicit resource limits.
    pub fn with_limits(limits: ResourceLimits) -> Self {
        debug_assert_eq!(
            self_check::<T>(),
            Ok(()),
            "{}: native arithmetic must encode as a single template",
            T::PROFILE.id
        );
        Self {
            stream: EmissionStream::new(),
            limits,
            named: Vec::new(),
            statements: 0,
            labels: 0,
            _target: PhantomData,
        }
    }

    /// Encode one instruction macro.
    ///
    /// # Errors
    ///
    /// Any [`issue`](crate::issue()) error, or `ResourceLimitExceeded`.
    pub fn emit(&mut self, instr: &Instr) -> Result<&mut Self, EncodeError> {
        self.count_statement()?;
        let e = issue_with::<T::Isa>(T::PROFILE, instr)?;
        self.append(&e)?;
        Ok(self)
    }

    /// Parse and encode source text.
    ///
    /// Label names are scoped to this encoder: a name used in one call
    /// refers to the same label in every later call.
    ///
    /// # Errors
    ///
    /// Parse errors (`Syntax`, `UnknownMnemonic`), encode errors of each
    /// statement, `DuplicateLabel`, or `ResourceLimitExceeded`.
    pub fn emit_str(&mut self, source: &str) -> Result<&mut Self, EncodeError> {
        if source.len() > self.limits.max_source_bytes {
            return Err(EncodeError::ResourceLimitExceeded {
                resource: "source bytes",
                limit: self.limits.max_source_bytes,
            });
        }
        for stmt in parser::parse_str(source)? {
            let span = stmt.span();
            let r = match stmt {
                Statement::Label { name, .. } => {
                    let label = self.named(name)?;
                    self.bind(label).map(|_| ())
                }
                Statement::Instr { instr, .. } => self.emit(&instr).map(|_| ()),
                Statement::Branch {
                    mask,
                    width,
                    cond,
                    target,
                    ..
                } => {
                    let label = self.named(target)?;
                    self.branch_on_mask(mask, width, cond, label).map(|_| ())
                }
                Statement::Jump { target, .. } => {
                    let label = self.named(target)?;
                    self.jump(label).map(|_| ())
                }
                Statement::Ret { .. } => self.ret().map(|_| ()),
            };
            if let Err(e) = r {
                log::debug!("{}: {}: {}", T::PROFILE.id, span, e);
                return Err(e);
            }
        }
        Ok(self)
    }

    /// Allocate a new, unbound label.
    ///
    /// # Errors
    ///
    /// `ResourceLimitExceeded` past `max_labels`.
    pub fn new_label(&mut self) -> Result<Label, EncodeError> {
        self.labels += 1;
        if self.labels > self.limits.max_labels {
            return Err(EncodeError::ResourceLimitExceeded {
                resource: "labels",
                limit: self.limits.max_labels,
            });
        }
        Ok(self.stream.new_label())
    }

    /// Bind `label` to the current position.
    ///
    /// # Errors
    ///
    /// `DuplicateLabel` if already bound; `UndefinedLabel` if the label
    /// was not allocated by this encoder.
    pub fn bind(&mut self, label: Label) -> Result<&mut Self, EncodeError> {
        self.stream.bind(label)?;
        Ok(self)
    }

    /// Branch to `label` when every (or no) lane of `mask` is set.
    ///
    /// # Errors
    ///
    /// See [`reduce_and_branch`](crate::reduce_and_branch).
    pub fn branch_on_mask(
        &mut self,
        mask: VReg,
        width: Width,
        cond: Cond,
        label: Label,
    ) -> Result<&mut Self, EncodeError> {
        self.count_statement()?;
        let e = reduce_with::<T::Isa>(T::PROFILE, mask, width, cond, label)?;
        self.append(&e)?;
        Ok(self)
    }

    /// Unconditional branch to `label`.
    ///
    /// # Errors
    ///
    /// `ResourceLimitExceeded`.
    pub fn jump(&mut self, label: Label) -> Result<&mut Self, EncodeError> {
        self.control(|cx| <T::Isa as Isa>::jump(cx, label))
    }

    /// Return from the procedure.
    ///
    /// # Errors
    ///
    /// `ResourceLimitExceeded`.
    pub fn ret(&mut self) -> Result<&mut Self, EncodeError> {
        self.control(<T::Isa as Isa>::ret)
    }

    /// Union of the clobbers of everything emitted so far.
    pub fn clobbers(&self) -> ClobberSet {
        self.stream.clobbers()
    }

    /// Bytes emitted so far.
    pub fn len(&self) -> usize {
        self.stream.len()
    }

    /// Whether nothing was emitted.
    pub fn is_empty(&self) -> bool {
        self.stream.is_empty()
    }

    /// Patch every branch and return the machine code.
    ///
    /// # Errors
    ///
    /// `UndefinedLabel` for a branch to a label that was never bound and
    /// `FieldOverflow` for a branch out of range.
    pub fn finish(self) -> Result<Vec<u8>, EncodeError> {
        let fragments = self.stream.fragment_count();
        let bytes = self.stream.finish()?;
        log::debug!(
            "{}: finished {} statement(s), {} fragment(s), {} byte(s)",
            T::PROFILE.id,
            self.statements,
            fragments,
            bytes.len()
        );
        Ok(bytes)
    }

    // ── internals ───────────────────────────────────────────

    fn control(
        &mut self,
        f: impl FnOnce(&mut Cx<'_>) -> Result<(), EncodeError>,
    ) -> Result<&mut Self, EncodeError> {
        self.count_statement()?;
        let mut cx = Cx::new(T::PROFILE, T::PROFILE.native_width);
        f(&mut cx)?;
        self.append(&cx.finish())?;
        Ok(self)
    }

    fn named(&mut self, name: &str) -> Result<Label, EncodeError> {
        if let Some(&(_, label)) = self.named.iter().find(|(n, _)| n == name) {
            return Ok(label);
        }
        let label = self.new_label()?;
        self.named.push((String::from(name), label));
        Ok(label)
    }

    fn count_statement(&mut self) -> Result<(), EncodeError> {
        self.statements += 1;
        if self.statements > self.limits.max_statements {
            return Err(EncodeError::ResourceLimitExceeded {
                resource: "statements",
                limit: self.limits.max_statements,
            });
        }
        Ok(())
    }

    fn append(&mut self, e: &Emission) -> Result<(), EncodeError> {
        let added: usize = e.fragments().iter().map(|f| f.bytes().len()).sum();
        if self.stream.len() + added > self.limits.max_output_bytes {
            return Err(EncodeError::ResourceLimitExceeded {
                resource: "output bytes",
                limit: self.limits.max_output_bytes,
            });
        }
        self.stream.append(e);
        Ok(())
    }
}

/// Check that every arithmetic op the profile plans as native encodes as
/// exactly one fragment, returning the first mnemonic that does not.
///
/// # Errors
///
/// The offending [`Mnemonic`].
pub fn self_check<T: Target>() -> Result<(), Mnemonic> {
    let profile = T::PROFILE;
    let d: Operand = VReg::dst(0).into();
    let s: Operand = VReg::src(1).into();
    let s2: Operand = VReg::src2(2).into();
    for op in Op::ALL {
        for &elem in profile.elements {
            if !op.accepts(elem)
                || !op.class(elem).is_arith()
                || !compat::plan(profile, op, elem).is_native()
            {
                continue;
            }
            let instr = match op.arity() {
                Arity::Unary => Instr::new(op, elem, &[d, s]),
                Arity::Fused => Instr::new(op, elem, &[VReg::dst_src(0).into(), s, s2]),
                _ => Instr::new(op, elem, &[d, s, s2]),
            };
            match issue_with::<T::Isa>(profile, &instr) {
                Ok(e) if e.len() == 1 => {}
                _ => return Err(instr.mnemonic()),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Elem;
    use crate::operand::{GReg, Mem};
    use crate::profile::{A64Neon, Power10, Power8, X64Avx128, X64Avx256, X64Avx512};

    fn add() -> Instr {
        Instr::new(
            Op::Add,
            Elem::F32,
            &[VReg::dst(0).into(), VReg::src(1).into(), VReg::src2(2).into()],
        )
    }

    #[test]
    fn every_profile_passes_self_check() {
        assert_eq!(self_check::<A64Neon>(), Ok(()));
        assert_eq!(self_check::<Power8>(), Ok(()));
        assert_eq!(self_check::<Power10>(), Ok(()));
        assert_eq!(self_check::<X64Avx128>(), Ok(()));
        assert_eq!(self_check::<X64Avx256>(), Ok(()));
        assert_eq!(self_check::<X64Avx512>(), Ok(()));
    }

    #[test]
    fn builder_matches_text() {
        let mut a = Encoder::<A64Neon>::new();
        a.emit(&add()).unwrap();
        a.emit(&Instr::new(
            Op::Load,
            Elem::F32,
            &[VReg::dst(3).into(), Mem::new(GReg(0), 32).into()],
        ))
        .unwrap();
        a.ret().unwrap();

        let mut b = Encoder::<A64Neon>::new();
        b.emit_str("add.f32 v0, v1, v2\nld.f32 v3, [r0 + 32]\nret").unwrap();
        assert_eq!(a.finish().unwrap(), b.finish().unwrap());
    }

    #[test]
    fn text_labels_resolve_forward_and_back() {
        let mut enc = Encoder::<A64Neon>::new();
        enc.emit_str("top:\n  cmpeq.i32 v0, v1, v2\n  jnone v0, out\n  jmp top\nout:\n  ret")
            .unwrap();
        let code = enc.finish().unwrap();
        let w: Vec<u32> = code
            .chunks(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        // cmeq, umaxv, fmov, cbz, b, ret
        assert_eq!(w.len(), 6);
        // cbz w16, #8
        assert_eq!(w[3], 0x34000050);
        // b #-16
        assert_eq!(w[4], 0x17FFFFFC);
        assert_eq!(w[5], 0xD65F03C0);
    }

    #[test]
    fn labels_persist_across_calls() {
        let mut enc = Encoder::<X64Avx256>::new();
        enc.emit_str("jmp end").unwrap();
        enc.emit_str("end: ret").unwrap();
        // jmp rel32 0; ret
        assert_eq!(enc.finish().unwrap(), [0xE9, 0, 0, 0, 0, 0xC3]);
    }

    #[test]
    fn unbound_label_fails_at_finish() {
        let mut enc = Encoder::<X64Avx256>::new();
        let l = enc.new_label().unwrap();
        enc.jump(l).unwrap();
        assert_eq!(
            enc.finish().unwrap_err(),
            EncodeError::UndefinedLabel { label: 0 }
        );
    }

    #[test]
    fn label_from_another_encoder_is_undefined() {
        let mut owner = Encoder::<A64Neon>::new();
        owner.new_label().unwrap();
        let foreign = owner.new_label().unwrap();

        let mut enc = Encoder::<A64Neon>::new();
        enc.jump(foreign).unwrap();
        assert_eq!(
            enc.finish().unwrap_err(),
            EncodeError::UndefinedLabel { label: 1 }
        );

        let mut enc = Encoder::<X64Avx256>::new();
        enc.branch_on_mask(VReg::src(0), Width::Native, Cond::AllLanes, foreign)
            .unwrap();
        assert_eq!(
            enc.finish().unwrap_err(),
            EncodeError::UndefinedLabel { label: 1 }
        );
    }

    #[test]
    fn duplicate_text_label() {
        let mut enc = Encoder::<Power8>::new();
        let err = enc.emit_str("a:\nret\na:\n").unwrap_err();
        assert_eq!(err, EncodeError::DuplicateLabel { label: 0 });
    }

    #[test]
    fn statement_limit() {
        let mut enc = Encoder::<A64Neon>::with_limits(ResourceLimits {
            max_statements: 2,
            ..ResourceLimits::default()
        });
        enc.ret().unwrap();
        enc.ret().unwrap();
        assert!(matches!(
            enc.ret().unwrap_err(),
            EncodeError::ResourceLimitExceeded {
                resource: "statements",
                limit: 2
            }
        ));
    }

    #[test]
    fn output_and_source_limits() {
        let mut enc = Encoder::<A64Neon>::with_limits(ResourceLimits {
            max_output_bytes: 8,
            max_source_bytes: 16,
            ..ResourceLimits::default()
        });
        enc.emit(&add()).unwrap();
        enc.emit(&add()).unwrap();
        assert!(matches!(
            enc.emit(&add()).unwrap_err(),
            EncodeError::ResourceLimitExceeded {
                resource: "output bytes",
                ..
            }
        ));
        assert_eq!(enc.len(), 8);
        assert!(matches!(
            enc.emit_str("add.f32 v0, v1, v2").unwrap_err(),
            EncodeError::ResourceLimitExceeded {
                resource: "source bytes",
                ..
            }
        ));
    }

    #[test]
    fn label_limit() {
        let mut enc = Encoder::<A64Neon>::with_limits(ResourceLimits {
            max_labels: 1,
            ..ResourceLimits::default()
        });
        enc.new_label().unwrap();
        assert!(enc.new_label().is_err());
    }

    #[test]
    fn clobbers_accumulate() {
        let mut enc = Encoder::<A64Neon>::new();
        enc.emit(&add()).unwrap();
        assert!(enc.clobbers().is_empty());
        enc.emit(&Instr::new(
            Op::Div,
            Elem::I32,
            &[VReg::dst(0).into(), VReg::src(1).into(), VReg::src2(2).into()],
        ))
        .unwrap();
        assert!(enc.clobbers().scratch_memory);
    }

    #[test]
    fn encode_errors_propagate_from_text() {
        let mut enc = Encoder::<X64Avx256>::new();
        assert!(matches!(
            enc.emit_str("min.i64 v0, v1, v2").unwrap_err(),
            EncodeError::UnsupportedOperation { .. }
        ));
        assert!(enc.is_empty());
    }
}
