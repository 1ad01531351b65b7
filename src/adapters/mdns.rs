//! mDNS advertisement of the WebThing HTTP endpoint.
//!
//! Implements [`DiscoveryPort`]: `{hostname}.local` plus an `_http._tcp`
//! service carrying the TXT records handed in by the orchestrator
//! (`url`, `webthing`).  Uses the ESP-IDF mdns component on the device and
//! logs only on simulation targets.

use log::info;

#[cfg(target_os = "espidf")]
use log::warn;
#[cfg(target_os = "espidf")]
use std::ffi::CString;

use crate::app::ports::DiscoveryPort;

const SERVICE_TYPE: &str = "_http";
const SERVICE_PROTO: &str = "_tcp";

#[derive(Default)]
pub struct MdnsAdapter {
    active: bool,
}

impl MdnsAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(&self, hostname: &str, port: u16, txt: &[(&str, &str)]) -> bool {
        use esp_idf_svc::sys::*;

        let (Ok(host), Ok(svc_type), Ok(svc_proto)) = (
            CString::new(hostname),
            CString::new(SERVICE_TYPE),
            CString::new(SERVICE_PROTO),
        ) else {
            return false;
        };

        // SAFETY: all pointers are NUL-terminated CStrings that outlive
        // the calls; mdns copies what it keeps.
        unsafe {
            let ret = mdns_init();
            if ret != ESP_OK {
                warn!("mDNS: mdns_init failed ({})", ret);
                return false;
            }
            mdns_hostname_set(host.as_ptr());
            mdns_instance_name_set(host.as_ptr());
            let ret = mdns_service_add(
                core::ptr::null(),
                svc_type.as_ptr(),
                svc_proto.as_ptr(),
                port,
                core::ptr::null_mut(),
                0,
            );
            if ret != ESP_OK {
                warn!("mDNS: service_add failed ({})", ret);
                mdns_free();
                return false;
            }
            for (key, value) in txt {
                let (Ok(k), Ok(v)) = (CString::new(*key), CString::new(*value)) else {
                    continue;
                };
                mdns_service_txt_item_set(svc_type.as_ptr(), svc_proto.as_ptr(), k.as_ptr(), v.as_ptr());
            }
        }
        true
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&self, _hostname: &str, _port: u16, _txt: &[(&str, &str)]) -> bool {
        true
    }

    #[cfg(target_os = "espidf")]
    fn platform_stop(&self) {
        // SAFETY: only reached after a successful mdns_init.
        unsafe {
            esp_idf_svc::sys::mdns_free();
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_stop(&self) {}
}

impl DiscoveryPort for MdnsAdapter {
    fn start(&mut self, hostname: &str, port: u16, txt: &[(&str, &str)]) -> bool {
        if self.active {
            self.stop();
        }
        self.active = self.platform_start(hostname, port, txt);
        if self.active {
            info!(
                "mDNS: {}.local {}.{}:{} txt={:?}",
                hostname, SERVICE_TYPE, SERVICE_PROTO, port, txt
            );
        }
        self.active
    }

    /// The ESP-IDF responder runs in its own task.
    fn update(&mut self) {}

    fn stop(&mut self) {
        if !self.active {
            return;
        }
        self.platform_stop();
        self.active = false;
        info!("mDNS: stopped");
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
