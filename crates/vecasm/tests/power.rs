#![cfg(feature = "power")]
//! POWER8 / POWER10 integration tests against reference instruction words.
//!
//! Expected words were taken from the Power ISA 3.1 instruction layouts and
//! double-checked against an independent assembler.

use vecasm::{assemble, EncodeError, Encoder, Power10, Power8, Role, Target, TargetId};

fn words<T: Target>(source: &str) -> Vec<u32> {
    let bytes = assemble::<T>(source)
        .unwrap_or_else(|e| panic!("vecasm failed: `{source}`: {e}"));
    assert_eq!(bytes.len() % 4, 0);
    bytes
        .chunks_exact(4)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        .collect()
}

#[test]
fn vector_registers_live_in_upper_vsx_bank() {
    // xvaddsp 35, 32, 33
    assert_eq!(words::<Power8>("add.f32 v3, v0, v1"), [0xF0600A07]);
    // vadduwm 0, 1, 2
    assert_eq!(words::<Power8>("add.i32 v0, v1, v2"), [0x10011080]);
}

#[test]
fn mask_branch_and_return() {
    let w = words::<Power8>(
        "cmpeq.i32 v2, v0, v1\n\
         jall v2, done\n\
         add.f32 v3, v0, v1\n\
         done:\n\
         ret",
    );
    assert_eq!(
        w,
        [
            0x10400886, // vcmpequw 2, 0, 1
            0x13BF038C, // vspltisw 29, -1
            0x1382EC86, // vcmpequw. 28, 2, 29
            0x41980008, // bt 24, .+8
            0xF0600A07, // xvaddsp 35, 32, 33
            0x4E800020, // blr
        ]
    );
}

#[test]
fn no_lanes_branch_backward() {
    assert_eq!(
        words::<Power10>("top:\njnone v2, top"),
        [0x13BF038C, 0x1382EC86, 0x419AFFF8]
    );
}

#[test]
fn unconditional_jumps() {
    assert_eq!(words::<Power8>("jmp out\nout:\nret"), [0x48000004, 0x4E800020]);
    assert_eq!(words::<Power8>("top:\njmp top"), [0x48000000]);
}

#[test]
fn load_forms_differ_between_generations() {
    // li 11, 32 ; lxvd2x 32, 3, 11 ; xxswapd 32, 32
    assert_eq!(
        words::<Power8>("ld.f32 v0, [r0 + 32]"),
        [0x39600020, 0x7C035E99, 0xF0000257]
    );
    // lxv 32, 32(3)
    assert_eq!(words::<Power10>("ld.f32 v0, [r0 + 32]"), [0xF4030029]);
}

#[test]
fn integer_divide_native_on_power10_only() {
    // vdivsw 0, 1, 2
    assert_eq!(words::<Power10>("div.i32 v0, v1, v2"), [0x1001118B]);
    // Power8: two spills, four lanes of (lwz, lwz, divw, stw), one reload.
    assert_eq!(words::<Power8>("div.i32 v0, v1, v2").len(), 6 + 4 * 4 + 3);
}

#[test]
fn wide_macro_halves_register_capacity() {
    // 256 bits on a 128-bit target: 28 registers give 14 logical tokens.
    assert_eq!(words::<Power8>("add.f32.w256 v13, v0, v1").len(), 2);
    let err = assemble::<Power8>("add.f32.w256 v14, v0, v1").unwrap_err();
    assert_eq!(
        err,
        EncodeError::UnsupportedRegister {
            kind: 'v',
            role: Role::Dst,
            index: 14,
            capacity: 14,
            target: TargetId::Power8,
        }
    );
}

#[test]
fn clobbers_report_fallback_scratch() {
    let mut enc = Encoder::<Power8>::new();
    enc.emit_str("add.f32 v0, v1, v2").unwrap();
    assert!(enc.clobbers().is_empty());
    enc.emit_str("rcp.f32 v0, v1").unwrap();
    let c = enc.clobbers();
    assert!(c.has_vreg(28) && c.has_vreg(29) && c.has_vreg(30));
}

/// Packed add followed by packed subtract over one 128-bit vector.
const ADD_SUB: &str = "\
    ld.f32.w128 v0, [r0]
    ld.f32.w128 v1, [r1]
    add.f32.w128 v2, v0, v1
    sub.f32.w128 v3, v0, v1
    st.f32.w128 [r2], v2
    st.f32.w128 [r2 + 16], v3
    ret";

#[test]
fn add_sub_kernel_power8() {
    assert_eq!(
        words::<Power8>(ADD_SUB),
        [
            0x7C001E99, // lxvd2x 32, 0, 3
            0xF0000257, // xxswapd 32, 32
            0x7C202699, // lxvd2x 33, 0, 4
            0xF0210A57, // xxswapd 33, 33
            0xF0400A07, // xvaddsp 34, 32, 33
            0xF0600A47, // xvsubsp 35, 32, 33
            0xF3821257, // xxswapd 60, 34
            0x7F802F99, // stxvd2x 60, 0, 5
            0xF3831A57, // xxswapd 60, 35
            0x39600010, // li 11, 16
            0x7F855F99, // stxvd2x 60, 5, 11
            0x4E800020, // blr
        ]
    );
}

#[test]
fn add_sub_kernel_power10() {
    assert_eq!(
        words::<Power10>(ADD_SUB),
        [
            0xF4030009, // lxv 32, 0(3)
            0xF4240009, // lxv 33, 0(4)
            0xF0400A07, // xvaddsp 34, 32, 33
            0xF0600A47, // xvsubsp 35, 32, 33
            0xF445000D, // stxv 34, 0(5)
            0xF465001D, // stxv 35, 16(5)
            0x4E800020, // blr
        ]
    );
}
