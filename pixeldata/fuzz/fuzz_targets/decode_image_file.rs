#![no_main]
use dicomite_core::tags;
use dicomite_pixeldata::PixelDecoder;
use libfuzzer_sys::fuzz_target;
use std::error::Error;

fuzz_target!(|data: &[u8]| {
    let _ = fuzz(data);
});

fn fuzz(data: &[u8]) -> Result<(), Box<dyn Error>> {
    // deserialize random bytes
    let decoder = dicomite_object::Decoder::from_vec(data.to_vec())?;

    // decode them as an image
    let pixels = decoder.pixels_u16()?;

    // a successful decode must match the declared geometry
    let size = decoder.int(tags::ROWS).unwrap_or(0) as u64
        * decoder.int(tags::COLUMNS).unwrap_or(0) as u64
        * u64::from(decoder.number_of_frames());

    assert_eq!(pixels.len() as u64, size);

    Ok(())
}
