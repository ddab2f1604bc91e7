#![no_main]

use libfuzzer_sys::fuzz_target;
use pifs::{Decoder, PixelFormat, Size};

fuzz_target!(|data: &[u8]| {
    let mut decoder = Decoder::with_max_image_size(256);

    if let Ok(info) = decoder.load(data, Size::new(128, 128)) {
        let mut frame = vec![0u8; 128 * 384];
        let _ = decoder.decode(
            info.iteration_count.min(4),
            PixelFormat::Rgb888,
            &mut frame,
            128,
            128,
            384,
        );
    }
});
