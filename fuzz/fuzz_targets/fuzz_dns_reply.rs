//! Fuzz target: captive DNS reply builder
//!
//! Any UDP payload may arrive on port 53 of the soft AP.  Building the
//! reply must never panic, and a reply always echoes the query id.
//!
//! cargo fuzz run fuzz_dns_reply

#![no_main]

use std::net::Ipv4Addr;

use libfuzzer_sys::fuzz_target;
use thingnode::adapters::dns::build_reply;

fuzz_target!(|data: &[u8]| {
    if let Some(reply) = build_reply(data, Ipv4Addr::new(192, 168, 4, 1)) {
        assert!(reply.len() >= 12);
        assert_eq!(reply[..2], data[..2]);
    }
});
