//! Serde round-trip tests for `vecasm` model types.
//!
//! Value types serialize to JSON and deserialize back to identical values.
//! Profiles, macros, and errors are serialize-only; for those the JSON
//! shape is checked instead.

#![cfg(feature = "serde")]

use vecasm::{
    DispResolution, Elem, EncodeError, GReg, Instr, Mem, Mnemonic, Op, Operand, ResourceLimits,
    Role, Scale, Span, TargetId, Tier, VReg, Width, X64_AVX256,
};

/// Helper: serialize to JSON, deserialize back, assert equality.
fn round_trip<T>(val: &T)
where
    T: serde::Serialize + serde::de::DeserializeOwned + PartialEq + core::fmt::Debug,
{
    let json = serde_json::to_string(val).expect("serialize");
    let back: T = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(val, &back, "round-trip mismatch for JSON: {json}");
}

// ─── Span ───────────────────────────────────────────────────────────────────

#[test]
fn serde_span() {
    round_trip(&Span::new(1, 5, 10, 3));
    round_trip(&Span::default());
}

// ─── Targets ────────────────────────────────────────────────────────────────

#[test]
fn serde_target_id() {
    for id in TargetId::ALL {
        round_trip(&id);
    }
}

#[test]
fn serde_profile_serializes() {
    let v = serde_json::to_value(X64_AVX256).expect("serialize");
    assert_eq!(v["native_width"], 256);
    assert_eq!(v["vreg_count"], 12);
    assert_eq!(v["id"], "X64Avx256");
}

// ─── Operands ───────────────────────────────────────────────────────────────

#[test]
fn serde_vreg_roles() {
    round_trip(&VReg::dst(0));
    round_trip(&VReg::dst_src(3));
    round_trip(&VReg::src(27));
    round_trip(&VReg::src2(31));
    round_trip(&Role::DstSrc);
}

#[test]
fn serde_memory_operand() {
    round_trip(&Mem::new(GReg(0), 0));
    round_trip(&Mem::new(GReg(1), -16));
    round_trip(&Mem::indexed(GReg(2), GReg(3), Scale::S8, 0x7FFF_FFFF));
}

#[test]
fn serde_operand() {
    round_trip(&Operand::from(VReg::src(4)));
    round_trip(&Operand::from(Mem::new(GReg(0), 64)));
    round_trip(&Operand::Imm(-1));
}

#[test]
fn serde_displacement_resolution() {
    round_trip(&X64_AVX256.resolve_displacement(8));
    round_trip(&X64_AVX256.resolve_displacement(1 << 40));
    round_trip(&Tier::signed(9));
    assert_eq!(
        X64_AVX256.resolve_displacement(1 << 40),
        DispResolution::RequiresScratchAddress
    );
}

// ─── Macros ─────────────────────────────────────────────────────────────────

#[test]
fn serde_mnemonic() {
    for text in ["add.f32", "fma.f64.w512", "cvti.i64.w1024", "shl.i32.w128"] {
        let m = Mnemonic::parse(text).expect(text);
        round_trip(&m);
    }
    round_trip(&Width::W256);
    round_trip(&Elem::I64);
    round_trip(&Op::AndNot);
}

#[test]
fn serde_instr_serializes() {
    let instr = Instr::new(
        Op::Add,
        Elem::F32,
        &[VReg::dst(0).into(), VReg::src(1).into(), VReg::src2(2).into()],
    )
    .at(Width::W512);
    let v = serde_json::to_value(instr).expect("serialize");
    assert_eq!(v["op"], "Add");
    assert_eq!(v["elem"], "F32");
    assert_eq!(v["width"], "W512");
}

// ─── Encoder ────────────────────────────────────────────────────────────────

#[test]
fn serde_resource_limits() {
    round_trip(&ResourceLimits::default());
    round_trip(&ResourceLimits {
        max_statements: 10,
        max_labels: 2,
        max_output_bytes: 4096,
        max_source_bytes: 1 << 20,
    });
}

#[test]
fn serde_error_serializes() {
    let err = EncodeError::UnsupportedOperation {
        mnemonic: "min.i64".into(),
        target: TargetId::Power8,
    };
    let v = serde_json::to_value(&err).expect("serialize");
    assert_eq!(v["UnsupportedOperation"]["mnemonic"], "min.i64");
    assert_eq!(v["UnsupportedOperation"]["target"], "Power8");
}
