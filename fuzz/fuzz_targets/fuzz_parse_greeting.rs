#![no_main]

use libfuzzer_sys::fuzz_target;
use queuewire::Greeting;

fuzz_target!(|data: &[u8]| {
    // The banner reader hands the parser UTF-8 lines; anything else is
    // rejected before parsing. Only valid strings are interesting here.
    if let Ok(line) = std::str::from_utf8(data) {
        let _ = Greeting::parse(line);
    }
});
