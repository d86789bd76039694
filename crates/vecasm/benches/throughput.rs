//! Performance benchmarks for `vecasm`.
//!
//! Measures:
//! - Single macro latency (per profile)
//! - Multi-macro throughput (KB/s of source text)
//! - Width composition and fallback sequences
//! - Label-heavy workloads with mask reductions
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use vecasm::{
    assemble, issue, A64Neon, Elem, Encoder, Instr, Op, Power10, Power8, Target, VReg, Width,
    X64Avx256, X64Avx512,
};

// ─── Single-Macro Latency ─────────────────────────────────────────────────────

fn add_f32() -> Instr {
    Instr::new(
        Op::Add,
        Elem::F32,
        &[VReg::dst(0).into(), VReg::src(1).into(), VReg::src2(2).into()],
    )
}

fn bench_single_macro(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_macro");

    group.bench_function("a64_add_f32_issue", |b| {
        b.iter(|| issue::<A64Neon>(black_box(&add_f32())).unwrap())
    });

    group.bench_function("power8_add_f32_issue", |b| {
        b.iter(|| issue::<Power8>(black_box(&add_f32())).unwrap())
    });

    group.bench_function("avx256_add_f32_issue", |b| {
        b.iter(|| issue::<X64Avx256>(black_box(&add_f32())).unwrap())
    });

    group.bench_function("avx512_add_f32_issue", |b| {
        b.iter(|| issue::<X64Avx512>(black_box(&add_f32())).unwrap())
    });

    group.bench_function("avx256_add_f32_text", |b| {
        b.iter(|| assemble::<X64Avx256>(black_box("add.f32 v0, v1, v2")).unwrap())
    });

    group.bench_function("avx256_load_far_disp", |b| {
        b.iter(|| assemble::<X64Avx256>(black_box("ld.f32 v0, [r0 + r1*4 + 0x12345678]")).unwrap())
    });

    group.finish();
}

// ─── Multi-Macro Throughput ───────────────────────────────────────────────────

/// Generate a block of N portable macros (no labels).
fn gen_block(n: usize) -> String {
    let mut s = String::with_capacity(n * 24);
    for i in 0..n {
        match i % 6 {
            0 => s.push_str("ld.f32 v0, [r0 + 64]\n"),
            1 => s.push_str("add.f32 v1, v0, v2\n"),
            2 => s.push_str("mul.f32 v3, v1, v1\n"),
            3 => s.push_str("fma.f32 v4, v3, v1\n"),
            4 => s.push_str("max.i32 v5, v6, v7\n"),
            5 => s.push_str("st.f32 [r1 - 32], v4\n"),
            _ => unreachable!(),
        }
    }
    s
}

fn throughput_for<T: Target>(c: &mut Criterion, name: &str) {
    let mut group = c.benchmark_group("throughput");
    for n in [100usize, 1000, 5000] {
        let src = gen_block(n);
        group.throughput(Throughput::Bytes(src.len() as u64));
        group.bench_function(format!("{name}_{n}_macros"), |b| {
            b.iter(|| assemble::<T>(black_box(&src)).unwrap())
        });
    }
    group.finish();
}

fn bench_throughput(c: &mut Criterion) {
    throughput_for::<A64Neon>(c, "a64");
    throughput_for::<Power10>(c, "power10");
    throughput_for::<X64Avx256>(c, "avx256");
    throughput_for::<X64Avx512>(c, "avx512");
}

// ─── Composition and Fallbacks ────────────────────────────────────────────────

fn bench_composition(c: &mut Criterion) {
    let mut group = c.benchmark_group("composition");

    for width in [Width::Native, Width::W512, Width::W1024] {
        let instr = add_f32().at(width);
        group.bench_function(format!("a64_add_f32_{width:?}"), |b| {
            b.iter(|| issue::<A64Neon>(black_box(&instr)).unwrap())
        });
    }

    group.bench_function("avx256_rcp_refine", |b| {
        b.iter(|| assemble::<X64Avx256>(black_box("rcp.f32 v0, v1")).unwrap())
    });

    group.bench_function("avx256_div_i32_lane_loop", |b| {
        b.iter(|| assemble::<X64Avx256>(black_box("div.i32 v0, v1, v2")).unwrap())
    });

    group.bench_function("power8_div_i32_lane_loop", |b| {
        b.iter(|| assemble::<Power8>(black_box("div.i32 v0, v1, v2")).unwrap())
    });

    group.finish();
}

// ─── Label-Heavy Workloads ────────────────────────────────────────────────────

/// Generate code with many labels and mask branches between them.
fn gen_label_heavy(n_labels: usize) -> String {
    let mut s = String::with_capacity(n_labels * 48);
    for i in 0..n_labels {
        s.push_str(&format!("label_{i}:\n"));
        s.push_str("cmplt.f32 v2, v0, v1\n");
    }
    for i in 0..n_labels.min(50) {
        let target = (i + n_labels / 2) % n_labels;
        s.push_str(&format!("jall v2, label_{target}\n"));
    }
    s.push_str("ret\n");
    s
}

fn bench_labels(c: &mut Criterion) {
    let mut group = c.benchmark_group("labels");

    for n in [50usize, 200, 500] {
        let src = gen_label_heavy(n);
        group.bench_function(format!("{n}_labels_avx512"), |b| {
            b.iter(|| assemble::<X64Avx512>(black_box(&src)).unwrap())
        });
    }

    group.finish();
}

// ─── Builder API vs One-Shot API ──────────────────────────────────────────────

fn bench_builder_vs_oneshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("api_comparison");

    let source = "add.f32 v0, v1, v2\nmul.f32 v3, v0, v0\nsub.f32 v4, v3, v1\nret";

    group.bench_function("oneshot_4_stmt", |b| {
        b.iter(|| assemble::<X64Avx256>(black_box(source)).unwrap())
    });

    group.bench_function("builder_4_stmt", |b| {
        b.iter(|| {
            let mut enc = Encoder::<X64Avx256>::new();
            enc.emit(black_box(&add_f32())).unwrap();
            enc.emit_str(black_box("mul.f32 v3, v0, v0")).unwrap();
            enc.emit_str(black_box("sub.f32 v4, v3, v1")).unwrap();
            enc.ret().unwrap();
            black_box(enc.finish().unwrap());
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_single_macro,
    bench_throughput,
    bench_composition,
    bench_labels,
    bench_builder_vs_oneshot,
);
criterion_main!(benches);
