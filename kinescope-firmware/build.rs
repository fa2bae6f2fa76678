//! Build script for kinescope-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates stream.toml and turns it into constants
//! - Stages the CYW43439 radio firmware blobs

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

/// Largest image the decoder may be configured for (panel size)
const PANEL_WIDTH: i64 = 480;
const PANEL_HEIGHT: i64 = 320;

/// Radio blobs loaded by `cyw43::new`
const CYW43_BLOBS: [&str; 2] = ["43439A0.bin", "43439A0_clm.bin"];

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    setup_linker(&out_dir);
    generate_config(&out_dir);
    stage_radio_firmware(&out_dir);
}

/// Set up linker search paths for memory.x
fn setup_linker(out_dir: &Path) {
    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Network and decoder settings taken from stream.toml
struct StreamSettings {
    ssid: String,
    password: String,
    channel: u8,
    address: Ipv4Addr,
    prefix_len: u8,
    port: u16,
    max_width: u16,
    max_height: u16,
}

/// Validate stream.toml and write `stream_config.rs` into OUT_DIR
fn generate_config(out_dir: &Path) {
    println!("cargo:rerun-if-changed=stream.toml");

    let config_path = Path::new("stream.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: stream.toml not found!                                   ║\n\
            ║                                                                  ║\n\
            ║  The firmware requires a stream.toml configuration file.         ║\n\
            ║  Please create one in the kinescope-firmware directory.          ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read stream.toml                               ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in stream.toml                       ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                ║                                                                  ║\n\
                {}\n\
                ║                                                                  ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    let settings = validate(&config);

    let generated = format!(
        "// Generated by build.rs from stream.toml\n\
        \n\
        /// Access point SSID\n\
        pub const AP_SSID: &str = {ssid:?};\n\
        /// WPA2 passphrase\n\
        pub const AP_PASSWORD: &str = {password:?};\n\
        /// 2.4 GHz channel\n\
        pub const AP_CHANNEL: u8 = {channel};\n\
        /// Static address of the display\n\
        pub const AP_ADDRESS: [u8; 4] = {address:?};\n\
        /// Network prefix length\n\
        pub const AP_PREFIX_LEN: u8 = {prefix_len};\n\
        /// UDP port fragments arrive on\n\
        pub const UDP_PORT: u16 = {port};\n\
        /// Largest decodable image width\n\
        pub const DECODER_MAX_WIDTH: u16 = {max_width};\n\
        /// Largest decodable image height\n\
        pub const DECODER_MAX_HEIGHT: u16 = {max_height};\n",
        ssid = settings.ssid,
        password = settings.password,
        channel = settings.channel,
        address = settings.address.octets(),
        prefix_len = settings.prefix_len,
        port = settings.port,
        max_width = settings.max_width,
        max_height = settings.max_height,
    );

    fs::write(out_dir.join("stream_config.rs"), generated).unwrap();
    println!("cargo:warning=stream.toml validated successfully");
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Panic with every collected error if there are any
fn report_errors(section: &str, errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: Invalid {:<48} ║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        format!("[{}] section in stream.toml", section),
        errors
            .iter()
            .map(|e| format!("║  • {:<62} ║", e))
            .collect::<Vec<_>>()
            .join("\n")
    );
}

fn integer_in(
    table: &toml::Value,
    key: &str,
    min: i64,
    max: i64,
    errors: &mut Vec<String>,
) -> Option<i64> {
    match table.get(key).and_then(|v| v.as_integer()) {
        Some(value) if (min..=max).contains(&value) => Some(value),
        Some(value) => {
            errors.push(format!("{} = {} (must be {}-{})", key, value, min, max));
            None
        }
        None => {
            errors.push(format!("'{}' missing or not an integer", key));
            None
        }
    }
}

fn string_in(
    table: &toml::Value,
    key: &str,
    min_len: usize,
    max_len: usize,
    errors: &mut Vec<String>,
) -> Option<String> {
    match table.get(key).and_then(|v| v.as_str()) {
        Some(value) if (min_len..=max_len).contains(&value.len()) => Some(value.to_string()),
        Some(_) => {
            errors.push(format!("'{}' must be {}-{} characters", key, min_len, max_len));
            None
        }
        None => {
            errors.push(format!("'{}' missing or not a string", key));
            None
        }
    }
}

fn validate(config: &toml::Value) -> StreamSettings {
    let empty = toml::Value::Table(toml::map::Map::new());

    let network = config.get("network").unwrap_or(&empty);
    let mut errors = Vec::new();
    let ssid = string_in(network, "ssid", 1, 32, &mut errors);
    let password = string_in(network, "password", 8, 63, &mut errors);
    let channel = integer_in(network, "channel", 1, 13, &mut errors);
    let prefix_len = integer_in(network, "prefix_len", 1, 30, &mut errors);
    let port = integer_in(network, "port", 1, 65535, &mut errors);
    let address = match network.get("address").and_then(|v| v.as_str()) {
        Some(text) => match text.parse::<Ipv4Addr>() {
            Ok(addr) => Some(addr),
            Err(_) => {
                errors.push(format!("address '{}' is not an IPv4 address", text));
                None
            }
        },
        None => {
            errors.push("'address' missing or not a string".to_string());
            None
        }
    };
    report_errors("network", &errors);

    let decoder = config.get("decoder").unwrap_or(&empty);
    let mut errors = Vec::new();
    let max_width = integer_in(decoder, "max_width", 16, PANEL_WIDTH, &mut errors);
    let max_height = integer_in(decoder, "max_height", 16, PANEL_HEIGHT, &mut errors);
    report_errors("decoder", &errors);

    // Every field is Some once both sections passed
    StreamSettings {
        ssid: ssid.unwrap(),
        password: password.unwrap(),
        channel: channel.unwrap() as u8,
        address: address.unwrap(),
        prefix_len: prefix_len.unwrap() as u8,
        port: port.unwrap() as u16,
        max_width: max_width.unwrap() as u16,
        max_height: max_height.unwrap() as u16,
    }
}

/// Copy the radio firmware into OUT_DIR for `include_bytes!`
///
/// Blobs are looked up in `CYW43_FIRMWARE_DIR` if set, otherwise in
/// `cyw43-firmware/` next to this script.
fn stage_radio_firmware(out_dir: &Path) {
    println!("cargo:rerun-if-env-changed=CYW43_FIRMWARE_DIR");

    let source = env::var("CYW43_FIRMWARE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("cyw43-firmware"));

    for blob in CYW43_BLOBS {
        let path = source.join(blob);
        println!("cargo:rerun-if-changed={}", path.display());

        if let Err(e) = fs::copy(&path, out_dir.join(blob)) {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: CYW43439 firmware blob missing                           ║\n\
                ║                                                                  ║\n\
                ║  Could not read {:<48} ║\n\
                ║  Error: {:<56} ║\n\
                ║                                                                  ║\n\
                ║  Copy 43439A0.bin and 43439A0_clm.bin from the cyw43 crate's     ║\n\
                ║  firmware/ directory, or point CYW43_FIRMWARE_DIR at them.       ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                path.display().to_string(),
                e.to_string()
            );
        }
    }
}
