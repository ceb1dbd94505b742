//! Fuzz target for batch manifest parsing.
//!
//! Feeds arbitrary bytes to the manifest JSON parser, checking for panics,
//! crashes, or hangs.

#![no_main]

use libfuzzer_sys::fuzz_target;
use moonlabel::ir::io_manifest::from_manifest_slice;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = from_manifest_slice(data);
});
