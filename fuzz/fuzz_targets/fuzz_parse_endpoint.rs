#![no_main]

use libfuzzer_sys::fuzz_target;
use queuewire::Endpoint;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok(endpoint) = Endpoint::parse(input) {
            // A parsed endpoint must survive its own display form
            let rendered = endpoint.to_string();
            let reparsed = Endpoint::parse(&rendered).expect("display form must reparse");
            assert_eq!(endpoint, reparsed);
        }
    }
});
