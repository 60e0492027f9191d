//! Fuzz target for relayed command payloads.
//!
//! Memos arrive from the ledger, so any byte string must decode to a command
//! or an error without panicking.

#![no_main]

use cowallet_types::SystemCommand;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(command) = SystemCommand::decode(data) {
        let encoded = command.encode().expect("decoded command re-encodes");
        let again = SystemCommand::decode(&encoded).expect("re-encoded command decodes");
        assert_eq!(again, command);
    }
});
