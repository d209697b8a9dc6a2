//! Fuzz target for configuration parsing.
//!
//! This fuzz target exercises the TOML configuration path with arbitrary
//! byte sequences to find potential panics in deserialization or
//! validation.
//!
//! # Running
//!
//! ```bash
//! cargo +nightly fuzz run config_parser
//! ```
//!
//! # Coverage-guided fuzzing
//!
//! The fuzzer will automatically discover interesting inputs that exercise
//! new code paths. These inputs are stored in `fuzz/corpus/config_parser/`.

#![no_main]

use libfuzzer_sys::fuzz_target;
use paygate_core::config::Config;

fuzz_target!(|data: &[u8]| {
    // Configuration files come from disk, so any byte sequence may show up.
    // Parsing and validation must reject bad input with errors, never panic.
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(config) = toml::from_str::<Config>(text) {
        let _ = config.validate();
        // A parsed config must survive a serialize round trip.
        let _ = toml::to_string(&config);
    }
});
