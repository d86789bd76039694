#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let _ = vecasm::assemble::<vecasm::Power8>(data);

    // POWER10 through the builder, split on newlines.
    let mut enc = vecasm::Encoder::<vecasm::Power10>::new();
    for line in data.lines() {
        if enc.emit_str(line).is_err() {
            return;
        }
    }
    if let Ok(code) = enc.finish() {
        assert_eq!(code.len() % 4, 0);
    }
});
