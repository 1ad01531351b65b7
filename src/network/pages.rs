//! Minimal HTML pages served by the configuration server.

use core::fmt::Write;

const STYLE: &str = "<style>\
body{text-align:center;font-family:arial,sans-serif}\
#bodyDiv{display:inline-block;min-width:300px;text-align:left}\
div{padding:5px}\
input[type='text'],input[type='password'],button{width:300px}\
button{border:0;border-radius:0.3rem;background-color:#1fa3ec;color:#fff;line-height:2.4rem;font-size:1.2rem}\
#mqttGroup{border:1px solid gray}\
</style>";

const SCRIPT: &str = "<script>\
function eb(s){return document.getElementById(s);}\
function sp(i){eb(i).type=(eb(i).type==='text'?'password':'text');}\
function hideMqttGroup(){eb('mqttGroup').style.display=eb('mq').checked?'block':'none';}\
</script>";

/// Escape text for use inside HTML content and single-quoted attributes.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&#39;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

/// `<h2>{app}</h2><h3>Revision {version}[ (debug)]</h3>`.
pub fn caption(application: &str, version: &str, debug: bool) -> String {
    format!(
        "<h2>{}</h2><h3>Revision {}{}</h3>",
        escape(application),
        escape(version),
        if debug { " (debug)" } else { "" }
    )
}

fn page(title: &str, head_extra: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html lang='en'><head><meta charset='utf-8'/>\
         <meta name='viewport' content='width=device-width, initial-scale=1, user-scalable=no'/>\
         <title>{}</title>{SCRIPT}{STYLE}{head_extra}</head>\
         <body><div id='bodyDiv'>{body}</div></body></html>",
        escape(title)
    )
}

fn button(action: &str, method: &str, label: &str) -> String {
    format!(
        "<div><form action='{action}' method='{method}'><button>{}</button></form></div>",
        escape(label)
    )
}

/// Landing page: one button per configurable device, then the fixed menu.
pub fn landing(application: &str, caption: &str, devices: &[(&str, &str)]) -> String {
    let mut body = String::from(caption);
    for (id, title) in devices {
        body.push_str(&button(&format!("/device_{id}"), "get", &format!("Configure {title}")));
    }
    body.push_str(&button("/wifi", "get", "Configure network"));
    body.push_str(&button("/info", "get", "Info"));
    body.push_str(&button("/firmware", "get", "Firmware update"));
    body.push_str(&button("/reset", "post", "Reset"));
    page(application, "", &body)
}

/// Shown while a restart is pending.
pub fn restart_notice(reason: &str) -> String {
    let body = format!(
        "{}<br><br>Module will reset in a few seconds...",
        escape(reason)
    );
    page("Info", "<meta http-equiv='refresh' content='10'>", &body)
}

/// Current values for the network form.
pub struct NetworkForm<'a> {
    pub idx: &'a str,
    pub ssid: &'a str,
    pub password: &'a str,
    pub webthing: bool,
    pub mqtt: bool,
    pub mqtt_server: &'a str,
    pub mqtt_user: &'a str,
    pub mqtt_password: &'a str,
    pub mqtt_topic: &'a str,
}

fn text_field(out: &mut String, label: &str, name: &str, max: usize, value: &str) {
    let _ = write!(
        out,
        "<div>{label}<br><input type='text' name='{name}' maxlength={max} value='{}'></div>",
        escape(value)
    );
}

fn password_field(out: &mut String, label: &str, name: &str, max: usize, value: &str) {
    let _ = write!(
        out,
        "<div><label>{label} <small><input type='checkbox' onclick=\"sp('{name}')\"> (show password)</small></label><br>\
         <input type='password' name='{name}' id='{name}' maxlength={max} value='{}'></div>",
        escape(value)
    );
}

fn checkbox(out: &mut String, name: &str, checked: bool, extra: &str, label: &str) {
    let _ = write!(
        out,
        "<div><label><input type='checkbox' name='{name}' id='{name}' value='true' {} {extra}>{label}</label></div>",
        if checked { "checked" } else { "" }
    );
}

pub fn network_configuration(application: &str, caption: &str, form: &NetworkForm<'_>) -> String {
    let mut body = String::from(caption);
    body.push_str("<form method='get' action='saveConfiguration'>");
    text_field(&mut body, "Identifier (idx):", "i", 32, form.idx);
    text_field(&mut body, "Wifi ssid (only 2.4G):", "s", 32, form.ssid);
    password_field(&mut body, "Wifi password:", "p", 64, form.password);
    checkbox(&mut body, "wt", form.webthing, "", "Support Mozilla WebThings");
    checkbox(&mut body, "mq", form.mqtt, "onclick='hideMqttGroup()'", "Support MQTT");
    let _ = write!(
        body,
        "<div id='mqttGroup' style='display:{}'>",
        if form.mqtt { "block" } else { "none" }
    );
    text_field(&mut body, "MQTT Server:", "ms", 32, form.mqtt_server);
    text_field(&mut body, "MQTT User:", "mu", 32, form.mqtt_user);
    password_field(&mut body, "MQTT Password:", "mp", 64, form.mqtt_password);
    text_field(&mut body, "Topic, e.g.'home/room':", "mt", 64, form.mqtt_topic);
    body.push_str("</div><div><button type='submit'>Save configuration</button></div></form>");
    page(&format!("{application} - Network Configuration"), "", &body)
}

/// Wrap a device's own configuration fragment.
pub fn device_configuration(caption: &str, fragment: &str) -> String {
    page("Device Configuration", "", &format!("{caption}{fragment}"))
}

pub fn info(caption: &str, rows: &[(&str, String)]) -> String {
    let mut body = String::from(caption);
    body.push_str("<table>");
    for (label, value) in rows {
        let _ = write!(body, "<tr><th>{label}:</th><td>{}</td></tr>", escape(value));
    }
    body.push_str("</table>");
    page("Info", "", &body)
}

pub fn firmware_form(caption: &str) -> String {
    let body = format!(
        "{caption}<form method='POST' action='' enctype='multipart/form-data'>\
         <div><input type='file' accept='.bin' name='update'></div>\
         <div><button type='submit'>Update firmware</button></div></form>"
    );
    page("Firmware update", "", &body)
}
