//! End-to-end tests of the public encoder API: typed builder vs. text front
//! end, error reporting, labels, and resource limits.

use vecasm::{
    assemble, Cond, Elem, EncodeError, Encoder, Instr, Op, ResourceLimits, Role, Span, Target,
    TargetId, VReg, Width,
};

fn bin(op: Op, elem: Elem, d: u8, a: u8, b: u8) -> Instr {
    Instr::new(
        op,
        elem,
        &[VReg::dst(d).into(), VReg::src(a).into(), VReg::src2(b).into()],
    )
}

/// Builds the same program through both front ends and compares bytes.
fn builder_matches_text<T: Target>() {
    let text = "\
        add.f32 v0, v1, v2
        mul.i32.w512 v0, v1, v2
        cmpgt.f32 v6, v0, v3
    top:
        jnone v6, top
        ret";

    let mut enc = Encoder::<T>::new();
    let top = enc.new_label().unwrap();
    enc.emit(&bin(Op::Add, Elem::F32, 0, 1, 2)).unwrap();
    enc.emit(&bin(Op::Mul, Elem::I32, 0, 1, 2).at(Width::W512))
        .unwrap();
    enc.emit(&bin(Op::CmpGt, Elem::F32, 6, 0, 3)).unwrap();
    enc.bind(top).unwrap();
    enc.branch_on_mask(VReg::src(6), Width::Native, Cond::NoLanes, top)
        .unwrap();
    enc.ret().unwrap();

    assert_eq!(
        enc.finish().unwrap(),
        assemble::<T>(text).unwrap(),
        "{}",
        T::PROFILE.id
    );
}

// ============================================================================
// Front ends agree
// ============================================================================

#[test_log::test]
#[cfg(feature = "a64")]
fn builder_matches_text_a64() {
    builder_matches_text::<vecasm::A64Neon>();
}

#[test_log::test]
#[cfg(feature = "power")]
fn builder_matches_text_power() {
    builder_matches_text::<vecasm::Power8>();
    builder_matches_text::<vecasm::Power10>();
}

#[test_log::test]
#[cfg(feature = "x86")]
fn builder_matches_text_x86() {
    builder_matches_text::<vecasm::X64Avx128>();
    builder_matches_text::<vecasm::X64Avx256>();
    builder_matches_text::<vecasm::X64Avx512>();
}

#[test_log::test]
#[cfg(feature = "x86")]
fn comments_and_separators() {
    let a = assemble::<vecasm::X64Avx256>("add.f32 v0, v1, v2 ; ret").unwrap();
    let b = assemble::<vecasm::X64Avx256>(
        "# header comment\n\
         add.f32 v0, v1, v2   # trailing\n\
         \n\
         ret\n",
    )
    .unwrap();
    assert_eq!(a, b);
}

#[test_log::test]
#[cfg(feature = "a64")]
fn labels_persist_across_calls() {
    let mut enc = Encoder::<vecasm::A64Neon>::new();
    enc.emit_str("jmp tail").unwrap();
    enc.emit_str("add.f32 v0, v0, v1").unwrap();
    enc.emit_str("tail:\nret").unwrap();
    let code = enc.finish().unwrap();
    // b .+8
    assert_eq!(code[..4], [0x02, 0x00, 0x00, 0x14]);
}

// ============================================================================
// Errors
// ============================================================================

#[test_log::test]
#[cfg(feature = "x86")]
fn unknown_mnemonic_reports_span() {
    let err = assemble::<vecasm::X64Avx256>("ret\n  frob.f32 v0, v1").unwrap_err();
    match err {
        EncodeError::UnknownMnemonic { mnemonic, span } => {
            assert_eq!(mnemonic, "frob.f32");
            assert_eq!(span.line, 2);
            assert_eq!(span.col, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test_log::test]
#[cfg(feature = "x86")]
fn unknown_element_suffix() {
    let err = assemble::<vecasm::X64Avx256>("add.f16 v0, v1, v2").unwrap_err();
    assert!(matches!(err, EncodeError::UnknownMnemonic { .. }), "{err}");
}

#[test_log::test]
#[cfg(feature = "x86")]
fn trailing_comma_is_syntax_error() {
    let err = assemble::<vecasm::X64Avx256>("add.f32 v0, v1,").unwrap_err();
    assert!(matches!(err, EncodeError::Syntax { .. }), "{err}");
}

#[test_log::test]
#[cfg(feature = "x86")]
fn role_mismatch_from_builder() {
    let bad = Instr::new(
        Op::Add,
        Elem::F32,
        &[VReg::src(0).into(), VReg::src(1).into(), VReg::src2(2).into()],
    );
    let err = Encoder::<vecasm::X64Avx256>::new().emit(&bad).unwrap_err();
    assert!(
        matches!(
            err,
            EncodeError::RoleMismatch {
                position: 0,
                found: Role::Src,
                ..
            }
        ),
        "{err}"
    );
}

#[test_log::test]
#[cfg(feature = "x86")]
fn register_beyond_capacity() {
    // AVX2 exposes 12 logical registers; v12..v15 are reserved.
    let err = assemble::<vecasm::X64Avx256>("add.f32 v0, v1, v12").unwrap_err();
    assert_eq!(
        err,
        EncodeError::UnsupportedRegister {
            kind: 'v',
            role: Role::Src2,
            index: 12,
            capacity: 12,
            target: TargetId::X64Avx256,
        }
    );
}

#[test_log::test]
#[cfg(feature = "x86")]
fn missing_quadword_minmax_on_avx2() {
    let err = assemble::<vecasm::X64Avx256>("min.i64 v0, v1, v2").unwrap_err();
    assert_eq!(
        err,
        EncodeError::UnsupportedOperation {
            mnemonic: "min.i64".into(),
            target: TargetId::X64Avx256,
        }
    );
    assert!(assemble::<vecasm::X64Avx512>("min.i64 v0, v1, v2").is_ok());
}

#[test_log::test]
#[cfg(feature = "a64")]
fn wide_width_shrinks_register_capacity() {
    let mut enc = Encoder::<vecasm::A64Neon>::new();
    enc.emit(&bin(Op::Add, Elem::F32, 0, 1, 2).at(Width::W1024))
        .unwrap();
    // 1024 bits on a 128-bit profile: eight replicas, capacity 3.
    let err = enc
        .emit(&bin(Op::Add, Elem::F32, 0, 1, 3).at(Width::W1024))
        .unwrap_err();
    assert!(
        matches!(err, EncodeError::UnsupportedRegister { capacity: 3, .. }),
        "{err}"
    );
}

#[test_log::test]
#[cfg(feature = "x86")]
fn unbound_and_duplicate_labels() {
    let err = assemble::<vecasm::X64Avx256>("jmp nowhere").unwrap_err();
    assert!(matches!(err, EncodeError::UndefinedLabel { .. }), "{err}");

    let err = assemble::<vecasm::X64Avx256>("here:\nret\nhere:").unwrap_err();
    assert!(matches!(err, EncodeError::DuplicateLabel { .. }), "{err}");
}

#[test_log::test]
#[cfg(feature = "x86")]
fn shift_count_out_of_range() {
    let err = assemble::<vecasm::X64Avx256>("shl.i32 v0, v1, #32").unwrap_err();
    assert!(
        matches!(err, EncodeError::FieldOverflow { value: 32, .. }),
        "{err}"
    );
}

// ============================================================================
// Resource limits
// ============================================================================

#[test_log::test]
#[cfg(feature = "x86")]
fn statement_limit() {
    let mut enc = Encoder::<vecasm::X64Avx256>::with_limits(ResourceLimits {
        max_statements: 2,
        ..ResourceLimits::default()
    });
    let err = enc.emit_str("ret\nret\nret").unwrap_err();
    assert_eq!(
        err,
        EncodeError::ResourceLimitExceeded {
            resource: "statements",
            limit: 2,
        }
    );
}

#[test_log::test]
#[cfg(feature = "x86")]
fn output_limit() {
    let mut enc = Encoder::<vecasm::X64Avx256>::with_limits(ResourceLimits {
        max_output_bytes: 8,
        ..ResourceLimits::default()
    });
    enc.emit_str("add.f32 v0, v1, v2").unwrap();
    let err = enc.emit_str("add.f32 v0, v1, v2").unwrap_err();
    assert!(
        matches!(err, EncodeError::ResourceLimitExceeded { resource: "output bytes", .. }),
        "{err}"
    );
}

#[test_log::test]
#[cfg(feature = "x86")]
fn source_limit() {
    let mut enc = Encoder::<vecasm::X64Avx256>::with_limits(ResourceLimits {
        max_source_bytes: 4,
        ..ResourceLimits::default()
    });
    assert!(enc.emit_str("ret").is_ok());
    assert!(matches!(
        enc.emit_str("ret\nret"),
        Err(EncodeError::ResourceLimitExceeded { resource: "source bytes", .. })
    ));
}

#[test]
fn span_dummy_is_default() {
    assert_eq!(Span::dummy(), Span::default());
}
