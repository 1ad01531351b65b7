//! Fuzz target: settings region decoding
//!
//! Loads arbitrary bytes as the persisted region and registers the
//! network field set plus a few device fields on top.  Decoding must
//! never panic and every string must stay within its window.
//!
//! cargo fuzz run fuzz_settings_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use thingnode::adapters::eeprom::NvsRegion;
use thingnode::app::ports::EepromPort;
use thingnode::settings::SettingsStore;
use thingnode::settings::network::NetworkSettings;

const REGION: usize = 512;

fuzz_target!(|data: &[u8]| {
    let Ok(mut region) = NvsRegion::new(REGION) else {
        return;
    };
    let mut image = vec![0u8; REGION];
    let n = data.len().min(REGION);
    image[..n].copy_from_slice(&data[..n]);
    if region.commit(&image).is_err() {
        return;
    }

    let mut store = SettingsStore::open(Box::new(region));
    let Ok(fields) = NetworkSettings::register(&mut store, "thingnode_15715070") else {
        return;
    };
    let _ = store.register_integer("interval", 60);
    let _ = store.register_double("offset", 0.0);
    let _ = store.register_string("label", 40, "");

    // Invalid UTF-8 decodes to U+FFFD, three bytes per input byte.
    assert!(fields.ssid(&store).len() <= 32 * 3);
    assert!(fields.password(&store).len() <= 64 * 3);
    assert!((0..=i32::from(u16::MAX)).contains(&store.integer("interval")));
    let _ = fields.is_complete(&store);
    let _ = fields.outcome(&store);
});
