#![no_main]
use libfuzzer_sys::fuzz_target;
use std::error::Error;

fuzz_target!(|data: &[u8]| {
    let _ = fuzz(data);
});

fn fuzz(data: &[u8]) -> Result<(), Box<dyn Error>> {
    // parse random bytes; most inputs are rejected early
    let decoder = dicomite_object::Decoder::from_vec(data.to_vec())?;

    // whatever parsed must be queryable without panicking
    let status = decoder.validate();
    let _ = decoder.all_tags();
    let _ = decoder.dimensions();
    assert_eq!(
        status.has_pixels,
        decoder.parsed().pixel_data().is_some()
    );

    Ok(())
}
