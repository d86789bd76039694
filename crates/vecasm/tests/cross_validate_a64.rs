#![cfg(feature = "a64")]
//! AArch64 cross-validation: encode with vecasm, decode with yaxpeax-arm.
//!
//! Each emitted word is decoded independently and its opcode compared
//! with the instruction the template was meant to produce.

use vecasm::{assemble, A64Neon};
use yaxpeax_arch::{Decoder as _, U8Reader};
use yaxpeax_arm::armv8::a64::{InstDecoder, Opcode};

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// Encode with vecasm, decode every word with yaxpeax-arm.
fn opcodes(source: &str) -> Vec<Opcode> {
    let bytes = assemble::<A64Neon>(source)
        .unwrap_or_else(|e| panic!("vecasm failed: `{source}`: {e}"));
    assert_eq!(
        bytes.len() % 4,
        0,
        "AArch64 output must be whole words: `{source}` → {bytes:02X?}"
    );

    let decoder = InstDecoder::default();
    bytes
        .chunks(4)
        .map(|word| {
            let mut reader = U8Reader::new(word);
            decoder
                .decode(&mut reader)
                .unwrap_or_else(|e| {
                    panic!("yaxpeax-arm failed to decode `{source}` → {word:02X?}: {e}")
                })
                .opcode
        })
        .collect()
}

/// Verify a single-word encoding.
fn verify(source: &str, expected: Opcode) {
    let ops = opcodes(source);
    assert_eq!(ops, [expected], "opcode mismatch for `{source}`");
}

// ============================================================================
// Native templates
// ============================================================================

#[test]
fn float_arithmetic() {
    verify("add.f32 v0, v1, v2", Opcode::FADD);
    verify("sub.f64 v3, v4, v5", Opcode::FSUB);
    verify("mul.f32 v6, v7, v8", Opcode::FMUL);
    verify("div.f64 v9, v10, v11", Opcode::FDIV);
    verify("fma.f32 v0, v1, v2", Opcode::FMLA);
}

#[test]
fn integer_arithmetic() {
    verify("add.i32 v0, v1, v2", Opcode::ADD);
    verify("sub.i64 v0, v1, v2", Opcode::SUB);
    verify("mul.i32 v0, v1", Opcode::MUL);
}

#[test]
fn loads_and_stores() {
    verify("ld.f32 v0, [r1 - 16]", Opcode::LDUR);
    verify("ld.f32 v0, [r1 + 256]", Opcode::LDR);
    verify("st.i32 [r0 + 32], v5", Opcode::STUR);
    verify("st.i32 [r0 + 4096], v5", Opcode::STR);
}

#[test]
fn far_load_builds_offset_in_scratch() {
    let ops = opcodes("ld.f32 v0, [r1 + 0x123450]");
    assert_eq!(ops, [Opcode::MOVZ, Opcode::MOVK, Opcode::LDR]);
}

// ============================================================================
// Composition and fallbacks
// ============================================================================

#[test]
fn wide_add_issues_four_replicas() {
    assert_eq!(opcodes("add.f32.w512 v0, v1, v2"), [Opcode::FADD; 4]);
}

#[test]
fn integer_divide_lane_loop() {
    let ops = opcodes("div.i32 v0, v1, v2");
    let mut expected = vec![Opcode::SUB, Opcode::STR, Opcode::STR];
    for _ in 0..4 {
        expected.extend([Opcode::LDR, Opcode::LDR, Opcode::SDIV, Opcode::STR]);
    }
    expected.extend([Opcode::LDR, Opcode::ADD]);
    assert_eq!(ops, expected);
}

#[test]
fn remainder_lane_loop_uses_msub() {
    let ops = opcodes("rem.i64 v0, v1, v2");
    assert_eq!(ops.iter().filter(|&&o| o == Opcode::SDIV).count(), 2);
    assert_eq!(ops.iter().filter(|&&o| o == Opcode::MSUB).count(), 2);
}

#[test]
fn reciprocal_refinement_multiplies() {
    let ops = opcodes("rcp.f32 v0, v1");
    // estimate, 2 × (step, multiply), move
    assert_eq!(ops.len(), 6);
    assert_eq!(ops[2], Opcode::FMUL);
    assert_eq!(ops[4], Opcode::FMUL);
}

// ============================================================================
// Control flow
// ============================================================================

#[test]
fn jump_and_return() {
    assert_eq!(
        opcodes("top:\nadd.f32 v0, v0, v1\njmp top\nret"),
        [Opcode::FADD, Opcode::B, Opcode::RET]
    );
}

// ============================================================================
// Kernels
// ============================================================================

#[test]
fn add_sub_kernel() {
    let source = "\
        ld.f32.w128 v0, [r0]
        ld.f32.w128 v1, [r1]
        add.f32.w128 v2, v0, v1
        sub.f32.w128 v3, v0, v1
        st.f32.w128 [r2], v2
        st.f32.w128 [r2 + 16], v3
        ret";
    assert_eq!(
        opcodes(source),
        [
            Opcode::LDUR,
            Opcode::LDUR,
            Opcode::FADD,
            Opcode::FSUB,
            Opcode::STUR,
            Opcode::STUR,
            Opcode::RET,
        ]
    );
    let words: Vec<u32> = assemble::<A64Neon>(source)
        .unwrap()
        .chunks(4)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        .collect();
    assert_eq!(
        words,
        [
            0x3CC00000, // ldur q0, [x0]
            0x3CC00021, // ldur q1, [x1]
            0x4E21D402, // fadd v2.4s, v0.4s, v1.4s
            0x4EA1D403, // fsub v3.4s, v0.4s, v1.4s
            0x3C800042, // stur q2, [x2]
            0x3C810043, // stur q3, [x2, #16]
            0xD65F03C0, // ret
        ]
    );
}
