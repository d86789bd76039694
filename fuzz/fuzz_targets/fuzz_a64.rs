#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // One-shot encode: must never panic, only return Ok/Err.
    let _ = vecasm::assemble::<vecasm::A64Neon>(data);

    // Builder API with one emit call per line; labels carry across calls.
    let mut enc = vecasm::Encoder::<vecasm::A64Neon>::new();
    for line in data.lines() {
        if enc.emit_str(line).is_err() {
            return;
        }
    }
    if let Ok(code) = enc.finish() {
        assert_eq!(code.len() % 4, 0);
    }
});
