//! Fuzz target for archive inspection.
//!
//! Arbitrary bytes are opened as a zip archive and, when that succeeds,
//! walked through format detection and the per-format readers.

#![no_main]

use libfuzzer_sys::fuzz_target;
use moonlabel::inspect::inspect_archive;

fuzz_target!(|data: &[u8]| {
    if data.len() > 4 * 1024 * 1024 {
        return;
    }

    let _ = inspect_archive(data);
});
