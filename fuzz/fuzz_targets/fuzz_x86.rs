#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Every x86 profile: must never panic, only return Ok/Err.
    let _ = vecasm::assemble::<vecasm::X64Avx128>(data);
    let _ = vecasm::assemble::<vecasm::X64Avx256>(data);

    // AVX-512 through the builder, split on newlines.
    let mut enc = vecasm::Encoder::<vecasm::X64Avx512>::new();
    for line in data.lines() {
        if enc.emit_str(line).is_err() {
            return;
        }
    }
    let _ = enc.finish();
});
