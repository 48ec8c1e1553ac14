#![no_main]
use cell_core::probe::PacketReader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|frames: Vec<Vec<u8>>| {
    // Arbitrary inbound transfers must never panic the reader.
    let mut reader = PacketReader::new();
    for frame in &frames {
        let _ = reader.process(frame);
    }
    reader.reset();
});
