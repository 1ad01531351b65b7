//! HTTP route table and request handlers of the configuration server.
//!
//! | Path                                   | Method   | Handler                     |
//! |----------------------------------------|----------|-----------------------------|
//! | `/`                                    | GET      | landing page / thing list   |
//! | `/config`                              | GET      | landing page                |
//! | `/wifi`                                | GET      | network form                |
//! | `/saveConfiguration`                   | GET      | save + restart              |
//! | `/device_{id}`                         | GET      | device form                 |
//! | `/saveDeviceConfiguration_{id}`        | GET      | device save + restart       |
//! | `/info`                                | GET      | chip / flash info           |
//! | `/reset`                               | any      | restart                     |
//! | `/firmware`                            | GET/POST | upload form / upload result |
//! | `/things/{id}[/properties[/{prop}]]`   | GET/PUT  | WebThing API                |

use log::{debug, error, info};
use serde_json::Value;

use super::Network;
use super::pages::{self, NetworkForm};
use super::state::{DeepSleepRequest, HttpServerState};
use crate::app::events::NetworkEvent;
use crate::app::ports::{HttpEvent, HttpMethod, HttpRequest, HttpResponse, Platform, UploadEvent};
use crate::bridge::json;
use crate::config::MAX_HTTP_REQUESTS_PER_TICK;
use crate::settings::SettingsError;
use crate::settings::network::{
    IDX, MQTT_PASSWORD, MQTT_SERVER, MQTT_TOPIC, MQTT_USER, PASSWORD, SSID, SUPPORTING_MQTT,
    SUPPORTING_WEBTHING,
};
use crate::thing::{Channel, Device, find_device};

pub const MSG_SETTINGS_SAVED: &str = "Settings saved.";
pub const MSG_DEVICE_SETTINGS_SAVED: &str = "Device settings saved.";
pub const MSG_MANUAL_RESET: &str = "Resetting was caused manually by web interface.";
pub const MSG_UPDATE_OK: &str = "Update successful.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Root,
    Config,
    Wifi,
    SaveConfiguration,
    DeviceConfig(&'a str),
    SaveDeviceConfig(&'a str),
    Info,
    Reset,
    FirmwareForm,
    FirmwareUpload,
    ThingCollection,
    Thing(&'a str),
    ThingProperties(&'a str),
    GetProperty(&'a str, &'a str),
    PutProperty(&'a str, &'a str),
    NotFound,
}

impl<'a> Route<'a> {
    /// `things` is set when the WebThing routes are bound.
    pub fn resolve(method: HttpMethod, path: &'a str, things: bool) -> Self {
        use crate::app::ports::HttpMethod::{Get, Post, Put};

        match (method, path) {
            (_, "/reset") => return Self::Reset,
            (Get, "/") if things => return Self::ThingCollection,
            (Get, "/") => return Self::Root,
            (Get, "/config") => return Self::Config,
            (Get, "/wifi") => return Self::Wifi,
            (Get, "/saveConfiguration") => return Self::SaveConfiguration,
            (Get, "/info") => return Self::Info,
            (Get, "/firmware") => return Self::FirmwareForm,
            (Post, "/firmware") => return Self::FirmwareUpload,
            _ => {}
        }

        if method == Get {
            if let Some(id) = path.strip_prefix("/device_") {
                return Self::DeviceConfig(id);
            }
            if let Some(id) = path.strip_prefix("/saveDeviceConfiguration_") {
                return Self::SaveDeviceConfig(id);
            }
        }

        let Some(rest) = path.strip_prefix("/things/").filter(|_| things) else {
            return Self::NotFound;
        };
        let mut parts = rest.split('/');
        match (method, parts.next(), parts.next(), parts.next(), parts.next()) {
            (Get, Some(dev), None, None, None) if !dev.is_empty() => Self::Thing(dev),
            (Get, Some(dev), Some("properties"), None, None) => Self::ThingProperties(dev),
            (Get, Some(dev), Some("properties"), Some(p), None) if !p.is_empty() => {
                Self::GetProperty(dev, p)
            }
            (Put, Some(dev), Some("properties"), Some(p), None) if !p.is_empty() => {
                Self::PutProperty(dev, p)
            }
            _ => Self::NotFound,
        }
    }
}

fn json_response(status: u16, body: &Value) -> HttpResponse {
    HttpResponse::json(status, body.to_string())
}

fn error_response(status: u16, message: &str) -> HttpResponse {
    json_response(status, &json::error_body(message, status))
}

impl<P: Platform> Network<P> {
    /// Dispatch queued requests and upload events.
    pub(super) fn serve_http(&mut self) {
        for _ in 0..MAX_HTTP_REQUESTS_PER_TICK {
            let Some(event) = self.platform.http().poll() else {
                break;
            };
            match event {
                HttpEvent::Upload(upload) => self.handle_upload(upload),
                HttpEvent::Request(request) => {
                    let response = self.handle_request(&request);
                    debug!("HTTP: {:?} {} -> {}", request.method, request.path, response.status);
                    self.platform.http().respond(response);
                }
            }
        }
    }

    pub fn handle_request(&mut self, request: &HttpRequest) -> HttpResponse {
        let things = matches!(self.state.http, HttpServerState::Running { things: true });
        match Route::resolve(request.method, &request.path, things) {
            Route::Root | Route::Config => self.root_page(),
            Route::Wifi => self.network_page(),
            Route::SaveConfiguration => self.save_configuration(request),
            Route::DeviceConfig(id) => self.device_page(id),
            Route::SaveDeviceConfig(id) => self.save_device_configuration(id, request),
            Route::Info => self.info_page(),
            Route::Reset => self.restart_response(MSG_MANUAL_RESET),
            Route::FirmwareForm => HttpResponse::html(200, pages::firmware_form(&self.caption())),
            Route::FirmwareUpload => self.firmware_finished(),
            Route::ThingCollection => {
                let body = json::thing_collection(
                    self.devices.iter().map(|s| -> &dyn Device { s.device.as_ref() }),
                );
                json_response(200, &body)
            }
            Route::Thing(id) => match find_device(&self.devices, id) {
                Some(i) => json_response(200, &json::thing_description(self.devices[i].device.as_ref())),
                None => HttpResponse::status(404),
            },
            Route::ThingProperties(id) => match find_device(&self.devices, id) {
                Some(i) => json_response(200, &json::values(self.devices[i].device.as_ref(), Channel::Web)),
                None => HttpResponse::status(404),
            },
            Route::GetProperty(id, prop) => self.get_property(id, prop),
            Route::PutProperty(id, prop) => self.put_property(id, prop, request),
            Route::NotFound => HttpResponse::status(404),
        }
    }

    fn caption(&self) -> String {
        pages::caption(
            &self.config.application_name,
            &self.config.firmware_version,
            self.config.debug,
        )
    }

    /// 302 to `/config` carrying the reason; the reset happens at the end
    /// of the tick.
    fn restart_response(&mut self, reason: &str) -> HttpResponse {
        self.request_restart(reason);
        let mut response = HttpResponse::html(302, reason.into());
        response.headers.push(("Location", "/config".into()));
        response
    }

    // ── Configuration pages ──

    fn root_page(&self) -> HttpResponse {
        if let Some(reason) = &self.restart_reason {
            return HttpResponse::html(200, pages::restart_notice(reason));
        }
        let devices: Vec<(&str, &str)> = self
            .devices
            .iter()
            .filter(|s| s.device.provides_config_page())
            .map(|s| (s.device.id(), s.device.title()))
            .collect();
        HttpResponse::html(
            200,
            pages::landing(&self.config.application_name, &self.caption(), &devices),
        )
    }

    fn network_page(&self) -> HttpResponse {
        let s = &self.settings;
        let f = &self.fields;
        let form = NetworkForm {
            idx: f.idx(s),
            ssid: f.ssid(s),
            password: f.password(s),
            webthing: f.supports_webthing(s),
            mqtt: f.supports_mqtt(s),
            mqtt_server: f.mqtt_server(s),
            mqtt_user: f.mqtt_user(s),
            mqtt_password: f.mqtt_password(s),
            mqtt_topic: f.mqtt_topic(s),
        };
        HttpResponse::html(
            200,
            pages::network_configuration(&self.config.application_name, &self.caption(), &form),
        )
    }

    fn apply_network_form(&mut self, request: &HttpRequest) -> Result<(), SettingsError> {
        let s = &mut self.settings;
        s.set_string(IDX, request.arg_or_empty("i"))?;
        s.set_string(SSID, request.arg_or_empty("s"))?;
        s.set_string(PASSWORD, request.arg_or_empty("p"))?;
        s.set_bool(SUPPORTING_WEBTHING, request.arg("wt") == Some("true"))?;
        s.set_bool(SUPPORTING_MQTT, request.arg("mq") == Some("true"))?;
        s.set_string(MQTT_SERVER, request.arg_or_empty("ms"))?;
        s.set_string(MQTT_USER, request.arg_or_empty("mu"))?;
        s.set_string(MQTT_PASSWORD, request.arg_or_empty("mp"))?;
        s.set_string(MQTT_TOPIC, request.arg_or_empty("mt"))?;

        // Without a usable MQTT setup the device would be unreachable.
        if self.config.auto_start_web_server
            && !self.fields.supports_webthing(&self.settings)
            && !self.fields.mqtt_usable(&self.settings)
        {
            info!("HTTP: MQTT unusable, enabling WebThings");
            self.settings.set_bool(SUPPORTING_WEBTHING, true)?;
        }
        self.settings.save()
    }

    fn save_configuration(&mut self, request: &HttpRequest) -> HttpResponse {
        match self.apply_network_form(request) {
            Ok(()) => self.restart_response(MSG_SETTINGS_SAVED),
            Err(e) => {
                error!("HTTP: saving settings failed: {}", e);
                error_response(500, &e.to_string())
            }
        }
    }

    fn device_page(&self, id: &str) -> HttpResponse {
        match find_device(&self.devices, id) {
            Some(i) if self.devices[i].device.provides_config_page() => {
                let fragment = self.devices[i].device.config_page(&self.settings);
                HttpResponse::html(200, pages::device_configuration(&self.caption(), &fragment))
            }
            _ => HttpResponse::status(404),
        }
    }

    fn save_device_configuration(&mut self, id: &str, request: &HttpRequest) -> HttpResponse {
        let Some(i) = find_device(&self.devices, id)
            .filter(|&i| self.devices[i].device.provides_config_page())
        else {
            return HttpResponse::status(404);
        };
        info!("HTTP: saving configuration of device '{}'", id);
        let result = self.devices[i]
            .device
            .save_config_page(&request.query, &mut self.settings)
            .and_then(|()| self.settings.save());
        match result {
            Ok(()) => self.restart_response(MSG_DEVICE_SETTINGS_SAVED),
            Err(e) => {
                error!("HTTP: saving device settings failed: {}", e);
                error_response(500, &e.to_string())
            }
        }
    }

    fn info_page(&mut self) -> HttpResponse {
        let ip = self.device_ip().map(|ip| ip.to_string()).unwrap_or_default();
        let mac = self.platform.wifi().mac_address();
        let mac = mac
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(":");
        let region = self.settings.region_size();
        let system = self.platform.system();
        let rows = [
            ("Chip ID", system.chip_id().to_string()),
            ("Flash Chip ID", system.flash_chip_id().to_string()),
            ("Flash Size", system.flash_chip_size().to_string()),
            ("IP address", ip),
            ("MAC address", mac),
            ("Current sketch size", system.sketch_size().to_string()),
            ("Available sketch size", system.free_sketch_space().to_string()),
            ("Settings region size", region.to_string()),
        ];
        HttpResponse::html(200, pages::info(&self.caption(), &rows))
    }

    // ── Firmware upload ──

    fn handle_upload(&mut self, upload: UploadEvent) {
        // The broker link is closed for the whole transfer.
        self.drop_mqtt();
        match upload {
            UploadEvent::Start { filename } => {
                let free = self.platform.system().free_sketch_space();
                self.update.start(self.platform.flasher(), free, &filename);
                self.sync_update_state();
                self.emit(NetworkEvent::UpdateStarted { filename });
            }
            UploadEvent::Data(chunk) => {
                self.update.write(self.platform.flasher(), &chunk);
                self.sync_update_state();
            }
            UploadEvent::End => {
                let ok = self.update.finish(self.platform.flasher()).is_ok();
                self.sync_update_state();
                self.emit(NetworkEvent::UpdateFinished { ok });
            }
        }
    }

    fn firmware_finished(&mut self) -> HttpResponse {
        match self.update.error() {
            Some(e) => self.restart_response(&format!("Update error: {e}")),
            None => self.restart_response(MSG_UPDATE_OK),
        }
    }

    // ── WebThing properties ──

    fn get_property(&mut self, id: &str, prop: &str) -> HttpResponse {
        let Some(i) = find_device(&self.devices, id) else {
            return HttpResponse::status(404);
        };
        let Some(property) = self.devices[i]
            .device
            .property_mut(prop)
            .filter(|p| p.is_visible(Channel::Web))
        else {
            return HttpResponse::status(404);
        };
        property.requested = true;
        let body = json::single_value(property);

        if self.config.deep_sleep_secs > 0 && self.state.deep_sleep == DeepSleepRequest::None {
            let webthing = self.supports_webthing();
            if let Some(ready) = self
                .devices
                .iter()
                .position(|s| !webthing || s.device.all_properties_requested())
            {
                self.state.deep_sleep = DeepSleepRequest::Pending(ready);
            }
        }
        json_response(200, &body)
    }

    fn put_property(&mut self, id: &str, prop: &str, request: &HttpRequest) -> HttpResponse {
        let Some(i) = find_device(&self.devices, id) else {
            return HttpResponse::status(404);
        };
        let Some(body) = &request.body else {
            return HttpResponse::status(422);
        };
        let Some(property) = self.devices[i]
            .device
            .property_mut(prop)
            .filter(|p| p.is_visible(Channel::Web))
        else {
            return HttpResponse::status(404);
        };

        let parsed: Option<Value> = serde_json::from_slice(body).ok();
        let Some(value) = parsed.as_ref().and_then(|v| v.get(prop)) else {
            debug!("HTTP: unable to parse '{}'", String::from_utf8_lossy(body));
            return error_response(500, "Unable to parse request body");
        };
        let before = property.value.clone();
        if let Err(e) = property.set_from_json(value) {
            return error_response(500, &e.to_string());
        }
        let changed = property.value != before;
        let response = json_response(200, &json::single_value(property));
        if changed {
            self.push_state(i);
        }
        response
    }
}
