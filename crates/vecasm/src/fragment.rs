//! Emission fragments, clobber sets, and the per-procedure emission stream.

use alloc::vec::Vec;
use core::ops::BitOr;

use crate::error::EncodeError;
use crate::operand::DispResolution;
use crate::template::{Field, WordTemplate};

// ─── InstrBytes: stack-allocated fragment buffer ────────────────────

/// Inline byte buffer for one fragment (max 16 bytes).
///
/// Holds a single x86 instruction (at most 15 bytes) or up to four
/// 32-bit words.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstrBytes {
    data: [u8; 16],
    len: u8,
}

impl InstrBytes {
    /// Capacity in bytes.
    pub const CAPACITY: usize = 16;

    /// Create an empty buffer.
    #[inline]
    pub const fn new() -> Self {
        Self {
            data: [0; 16],
            len: 0,
        }
    }

    /// Create a buffer pre-filled from a byte slice.
    #[inline]
    pub fn from_slice(src: &[u8]) -> Self {
        let mut buf = Self::new();
        buf.extend_from_slice(src);
        buf
    }

    /// Append a single byte.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is already full.
    #[inline]
    pub fn push(&mut self, byte: u8) {
        assert!(
            (self.len as usize) < Self::CAPACITY,
            "InstrBytes overflow: cannot push beyond 16 bytes"
        );
        self.data[self.len as usize] = byte;
        self.len += 1;
    }

    /// Append a slice of bytes.
    ///
    /// # Panics
    ///
    /// Panics if appending would exceed the capacity.
    #[inline]
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        let start = self.len as usize;
        let end = start + bytes.len();
        assert!(
            end <= Self::CAPACITY,
            "InstrBytes overflow: {} + {} exceeds 16-byte capacity",
            start,
            bytes.len()
        );
        self.data[start..end].copy_from_slice(bytes);
        self.len = end as u8;
    }

    /// Append a little-endian 32-bit word.
    #[inline]
    pub fn push_word(&mut self, word: u32) {
        self.extend_from_slice(&word.to_le_bytes());
    }

    /// Number of bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for InstrBytes {
    fn default() -> Self {
        Self::new()
    }
}

impl core::ops::Deref for InstrBytes {
    type Target = [u8];
    #[inline]
    fn deref(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

impl core::fmt::Debug for InstrBytes {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:02X?}", &**self)
    }
}

impl PartialEq<[u8]> for InstrBytes {
    fn eq(&self, other: &[u8]) -> bool {
        **self == *other
    }
}

// ─── ClobberSet ──────────────────────────────────────────

/// Physical resources written by a fragment beyond its named destination.
///
/// Bit `n` of `vregs` / `gprs` is physical register `n`; bit `n` of
/// `masks` is mask register `k<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClobberSet {
    /// Vector registers.
    pub vregs: u64,
    /// General-purpose registers.
    pub gprs: u64,
    /// Mask registers.
    pub masks: u8,
    /// Scratch memory below the stack pointer.
    pub scratch_memory: bool,
    /// Condition flags / condition register fields.
    pub flags: bool,
}

impl ClobberSet {
    /// The empty set.
    pub const NONE: ClobberSet = ClobberSet {
        vregs: 0,
        gprs: 0,
        masks: 0,
        scratch_memory: false,
        flags: false,
    };

    /// A single vector register.
    #[inline]
    pub fn vreg(r: u8) -> Self {
        Self {
            vregs: 1 << r,
            ..Self::NONE
        }
    }

    /// A single general register.
    #[inline]
    pub fn gpr(r: u8) -> Self {
        Self {
            gprs: 1 << r,
            ..Self::NONE
        }
    }

    /// A single mask register.
    #[inline]
    pub fn mask(k: u8) -> Self {
        Self {
            masks: 1 << k,
            ..Self::NONE
        }
    }

    /// Scratch memory only.
    #[inline]
    pub fn memory() -> Self {
        Self {
            scratch_memory: true,
            ..Self::NONE
        }
    }

    /// Condition flags only.
    #[inline]
    pub fn flags() -> Self {
        Self {
            flags: true,
            ..Self::NONE
        }
    }

    /// Union of two sets.
    #[inline]
    pub fn union(self, other: Self) -> Self {
        Self {
            vregs: self.vregs | other.vregs,
            gprs: self.gprs | other.gprs,
            masks: self.masks | other.masks,
            scratch_memory: self.scratch_memory | other.scratch_memory,
            flags: self.flags | other.flags,
        }
    }

    /// Whether nothing is clobbered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }

    /// Whether vector register `r` is clobbered.
    #[inline]
    pub fn has_vreg(&self, r: u8) -> bool {
        self.vregs & (1 << r) != 0
    }

    /// Whether general register `r` is clobbered.
    #[inline]
    pub fn has_gpr(&self, r: u8) -> bool {
        self.gprs & (1 << r) != 0
    }
}

impl BitOr for ClobberSet {
    type Output = ClobberSet;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

// ─── Labels and fixups ───────────────────────────────────────

/// Intra-stream branch target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub(crate) u32);

impl Label {
    /// Numeric id.
    pub fn id(self) -> u32 {
        self.0
    }
}

/// Branch displacement field to patch once the target is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixupKind {
    /// AArch64 `b.cond` / `cbz` / `cbnz`: word offset in bits 5..23.
    A64Imm19,
    /// AArch64 `b`: word offset in bits 0..25.
    A64Imm26,
    /// POWER `bc`: word offset in bits 2..15.
    PpcBd14,
    /// POWER `b`: word offset in bits 2..25.
    PpcLi24,
    /// x86 `jcc`/`jmp` rel32 in the last four bytes, relative to the
    /// end of the instruction.
    Rel32,
}

const IMM19: WordTemplate = WordTemplate::new("imm19", 0, &[Field::s("imm19", 5, 19)]);
const IMM26: WordTemplate = WordTemplate::new("imm26", 0, &[Field::s("imm26", 0, 26)]);
const BD14: WordTemplate = WordTemplate::new("bd", 0, &[Field::s("bd", 2, 14)]);
const LI24: WordTemplate = WordTemplate::new("li", 0, &[Field::s("li", 2, 24)]);

/// A pending branch fixup inside a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fixup {
    /// Target label.
    pub label: Label,
    /// Field to patch.
    pub kind: FixupKind,
}

// ─── Fragment ────────────────────────────────────────────

/// Memory displacement a fragment encoded and the tier it landed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Displacement {
    /// Byte displacement (after wide-composition adjustment).
    pub value: i64,
    /// Tier classification.
    pub resolution: DispResolution,
}

/// One contiguous unit of native code produced by a single encode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    bytes: InstrBytes,
    disp: Option<Displacement>,
    fixup: Option<Fixup>,
    clobbers: ClobberSet,
}

impl Fragment {
    /// Fragment from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: InstrBytes::from_slice(bytes),
            disp: None,
            fixup: None,
            clobbers: ClobberSet::NONE,
        }
    }

    /// Fragment holding one little-endian instruction word.
    pub fn word(word: u32) -> Self {
        Self::words(&[word])
    }

    /// Fragment holding consecutive little-endian words.
    pub fn words(words: &[u32]) -> Self {
        let mut bytes = InstrBytes::new();
        for &w in words {
            bytes.push_word(w);
        }
        Self {
            bytes,
            disp: None,
            fixup: None,
            clobbers: ClobberSet::NONE,
        }
    }

    /// Attach the encoded memory displacement.
    #[must_use]
    pub fn with_disp(mut self, disp: Displacement) -> Self {
        self.disp = Some(disp);
        self
    }

    /// Attach a branch fixup.
    #[must_use]
    pub fn with_fixup(mut self, fixup: Fixup) -> Self {
        self.fixup = Some(fixup);
        self
    }

    /// Add to the clobber set.
    #[must_use]
    pub fn with_clobbers(mut self, clobbers: ClobberSet) -> Self {
        self.clobbers = self.clobbers.union(clobbers);
        self
    }

    /// Encoded bytes.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Instruction words, for word-oriented targets.
    pub fn words_le(&self) -> impl Iterator<Item = u32> + '_ {
        self.bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
    }

    /// Encoded memory displacement, if this fragment accesses memory.
    #[inline]
    pub fn disp(&self) -> Option<Displacement> {
        self.disp
    }

    /// Pending branch fixup.
    #[inline]
    pub fn fixup(&self) -> Option<Fixup> {
        self.fixup
    }

    /// Resources written beyond the named destination.
    #[inline]
    pub fn clobbers(&self) -> ClobberSet {
        self.clobbers
    }
}

// ─── Emission ────────────────────────────────────────────

/// Ordered fragments of one macro call plus their union clobber set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Emission {
    fragments: Vec<Fragment>,
    clobbers: ClobberSet,
}

impl Emission {
    /// Empty emission.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one fragment.
    pub fn push(&mut self, frag: Fragment) {
        self.clobbers = self.clobbers.union(frag.clobbers);
        self.fragments.push(frag);
    }

    /// Append every fragment of `other`.
    pub fn extend(&mut self, other: Emission) {
        for f in other.fragments {
            self.push(f);
        }
    }

    /// Fragments in emission order.
    #[inline]
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Number of fragments.
    #[inline]
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Whether nothing was emitted.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Union of all fragment clobbers.
    #[inline]
    pub fn clobbers(&self) -> ClobberSet {
        self.clobbers
    }

    /// Concatenated bytes. Branch fixups are left unpatched; use an
    /// [`EmissionStream`] for code containing branches.
    pub fn bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.fragments.iter().map(|f| f.bytes().len()).sum());
        for f in &self.fragments {
            out.extend_from_slice(f.bytes());
        }
        out
    }

    /// Mutable access to the last fragment, if any.
    pub(crate) fn last_mut(&mut self) -> Option<&mut Fragment> {
        self.fragments.last_mut()
    }
}

// ─── EmissionStream ──────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Pending {
    /// Byte offset of the fragment in the stream.
    at: usize,
    /// Fragment length.
    len: usize,
    fixup: Fixup,
}

/// Append-only byte stream of one procedure, with intra-stream labels.
#[derive(Debug, Clone, Default)]
pub struct EmissionStream {
    bytes: Vec<u8>,
    labels: Vec<Option<usize>>,
    pending: Vec<Pending>,
    clobbers: ClobberSet,
    fragments: usize,
}

impl EmissionStream {
    /// Empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new, unbound label.
    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() as u32 - 1)
    }

    /// Bind `label` to the current end of the stream.
    ///
    /// # Errors
    ///
    /// `DuplicateLabel` if already bound, `UndefinedLabel` if the label was
    /// not allocated by this stream.
    pub fn bind(&mut self, label: Label) -> Result<(), EncodeError> {
        let here = self.bytes.len();
        match self.labels.get_mut(label.0 as usize) {
            Some(Some(_)) => Err(EncodeError::DuplicateLabel { label: label.0 }),
            Some(slot) => {
                *slot = Some(here);
                Ok(())
            }
            None => Err(EncodeError::UndefinedLabel { label: label.0 }),
        }
    }

    /// Append an emission.
    pub fn append(&mut self, emission: &Emission) {
        for frag in emission.fragments() {
            if let Some(fixup) = frag.fixup() {
                self.pending.push(Pending {
                    at: self.bytes.len(),
                    len: frag.bytes().len(),
                    fixup,
                });
            }
            self.bytes.extend_from_slice(frag.bytes());
            self.fragments += 1;
        }
        self.clobbers = self.clobbers.union(emission.clobbers());
    }

    /// Bytes emitted so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing was emitted.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Fragments appended so far.
    #[inline]
    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    /// Union clobber set of everything appended.
    #[inline]
    pub fn clobbers(&self) -> ClobberSet {
        self.clobbers
    }

    /// Patch every branch and return the final bytes.
    ///
    /// # Errors
    ///
    /// `UndefinedLabel` for a branch to an unbound label or one allocated
    /// by another stream, and `FieldOverflow` for a branch whose distance
    /// does not fit its field.
    pub fn finish(mut self) -> Result<Vec<u8>, EncodeError> {
        for p in &self.pending {
            let label = p.fixup.label.0;
            let target = self
                .labels
                .get(label as usize)
                .copied()
                .flatten()
                .ok_or(EncodeError::UndefinedLabel { label })?;
            patch(&mut self.bytes, p, target)?;
        }
        Ok(self.bytes)
    }
}

fn patch(bytes: &mut [u8], p: &Pending, target: usize) -> Result<(), EncodeError> {
    let from = p.at as i64;
    let to = target as i64;
    let word_field = match p.fixup.kind {
        FixupKind::A64Imm19 => Some(IMM19),
        FixupKind::A64Imm26 => Some(IMM26),
        FixupKind::PpcBd14 => Some(BD14),
        FixupKind::PpcLi24 => Some(LI24),
        FixupKind::Rel32 => None,
    };
    match word_field {
        Some(tpl) => {
            // Branch word is the last word of the fragment.
            let at = p.at + p.len - 4;
            let delta = (to - (from + p.len as i64 - 4)) / 4;
            let bits = tpl.encode(&[delta])?;
            let mut word = u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
            word |= bits;
            bytes[at..at + 4].copy_from_slice(&word.to_le_bytes());
        }
        None => {
            let end = from + p.len as i64;
            let delta = to - end;
            let rel = i32::try_from(delta).map_err(|_| EncodeError::FieldOverflow {
                field: "rel32",
                value: delta,
                min: i32::MIN as i64,
                max: i32::MAX as i64,
            })?;
            let at = p.at + p.len - 4;
            bytes[at..at + 4].copy_from_slice(&rel.to_le_bytes());
        }
    }
    Ok(())
}
