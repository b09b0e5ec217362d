// SPDX-License-Identifier: GPL-3.0-only

//! Block device discovery through `lsblk`
//!
//! Every call spawns the listing tool and parses a fresh snapshot; results
//! are never cached because devices come and go between calls.

use std::process::Command;

use btrfs_types::BlockDevice;
use tracing::{debug, warn};

use crate::error::{Result, SysError};

const LSBLK_ARGS: &[&str] = &["--list", "--output", "NAME,SIZE,MOUNTPOINT"];

/// Discovers block devices and mount points
#[derive(Debug, Clone)]
pub struct DeviceCatalog {
    program: String,
}

impl Default for DeviceCatalog {
    fn default() -> Self {
        Self::new("lsblk")
    }
}

impl DeviceCatalog {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// List all block devices currently known to the system.
    ///
    /// An empty vector means no devices were found, not a failure.
    pub fn list_devices(&self) -> Result<Vec<BlockDevice>> {
        let output = self.run_capture()?;
        let devices = parse_lsblk(&output);
        debug!("Discovered {} block device(s)", devices.len());
        Ok(devices)
    }

    /// Distinct absolute mount points, in discovery order
    pub fn list_mounted_paths(&self) -> Result<Vec<String>> {
        Ok(mounted_paths(&self.list_devices()?))
    }

    fn run_capture(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .args(LSBLK_ARGS)
            .output()
            .map_err(|e| {
                warn!("Failed to run {}: {}", self.program, e);
                SysError::Discovery(format!("failed to run {}: {}", self.program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SysError::Discovery(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Mount points of `devices` that are absolute paths, without duplicates
pub fn mounted_paths(devices: &[BlockDevice]) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    for mount in devices.iter().filter_map(|device| device.mount_point.as_ref()) {
        if mount.starts_with('/') && !paths.contains(mount) {
            paths.push(mount.clone());
        }
    }
    paths
}

/// Parse `lsblk` NAME/SIZE/MOUNTPOINT output.
///
/// The first line is the column header and is skipped. Missing size or mount
/// point columns yield `None` rather than an error.
pub fn parse_lsblk(output: &str) -> Vec<BlockDevice> {
    output
        .lines()
        .skip(1)
        .filter_map(parse_lsblk_line)
        .collect()
}

fn parse_lsblk_line(line: &str) -> Option<BlockDevice> {
    let mut tokens = line.split_whitespace();
    let name = strip_tree_glyphs(tokens.next()?);
    if name.is_empty() {
        return None;
    }

    let rest: Vec<&str> = tokens.collect();
    let (size_bytes, mount_tokens) = match rest.split_first() {
        Some((first, tail)) if !looks_like_mount(first) => (parse_size(first), tail),
        _ => (None, rest.as_slice()),
    };

    let mount_point = if mount_tokens.is_empty() {
        None
    } else {
        Some(unescape_hex(&mount_tokens.join(" ")))
    };

    Some(BlockDevice {
        name: name.to_string(),
        size_bytes,
        mount_point,
    })
}

fn looks_like_mount(token: &str) -> bool {
    token.starts_with('/') || token.starts_with('[')
}

fn strip_tree_glyphs(token: &str) -> &str {
    token.trim_start_matches(|c: char| matches!(c, '├' | '└' | '│' | '─' | '|' | '`' | '-'))
}

/// Parse a size as printed by `lsblk`: plain bytes (`--bytes`) or a number
/// with a binary unit suffix (`512M`, `1.5T`, `20G`).
pub fn parse_size(token: &str) -> Option<u64> {
    let token = token.trim();
    let split = token
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(token.len());
    let (number, unit) = token.split_at(split);
    if number.is_empty() {
        return None;
    }

    let exponent = match unit.trim_end_matches("iB").trim_end_matches('B') {
        "" => 0,
        "K" | "k" => 1,
        "M" => 2,
        "G" => 3,
        "T" => 4,
        "P" => 5,
        "E" => 6,
        _ => return None,
    };

    if exponent == 0 {
        return number.parse::<u64>().ok();
    }

    let value: f64 = number.parse().ok()?;
    Some((value * 1024f64.powi(exponent)).round() as u64)
}

/// Decode `\xHH` escapes used by `lsblk` for unsafe characters in paths.
///
/// Escapes are raw bytes, so a multi-byte character arrives as several of
/// them and is reassembled before UTF-8 decoding.
fn unescape_hex(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut output = Vec::with_capacity(bytes.len());
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] == b'\\'
            && index + 3 < bytes.len()
            && bytes[index + 1] == b'x'
            && bytes[index + 2].is_ascii_hexdigit()
            && bytes[index + 3].is_ascii_hexdigit()
            && let Ok(decoded) = u8::from_str_radix(&value[index + 2..index + 4], 16)
        {
            output.push(decoded);
            index += 4;
            continue;
        }

        output.push(bytes[index]);
        index += 1;
    }

    String::from_utf8_lossy(&output).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "NAME        SIZE MOUNTPOINT
sda       931.5G
sda1        512M /boot/efi
sda2        931G /
sdb          20G
sdb1         20G /mnt/data
zram0         8G [SWAP]
";

    #[test]
    fn parses_single_mounted_device() {
        let devices = parse_lsblk("NAME SIZE MOUNTPOINT\nsda1   20G   /mnt/data\n");
        assert_eq!(
            devices,
            vec![BlockDevice {
                name: "sda1".to_string(),
                size_bytes: Some(20 * 1024 * 1024 * 1024),
                mount_point: Some("/mnt/data".to_string()),
            }]
        );
    }

    #[test]
    fn unmounted_devices_have_no_mount_point() {
        let devices = parse_lsblk(SAMPLE);
        assert_eq!(devices.len(), 6);
        assert_eq!(devices[0].name, "sda");
        assert_eq!(devices[0].mount_point, None);
        assert_eq!(devices[3].mount_point, None);
        assert_eq!(devices[5].mount_point.as_deref(), Some("[SWAP]"));
    }

    #[test]
    fn parsing_is_idempotent() {
        assert_eq!(parse_lsblk(SAMPLE), parse_lsblk(SAMPLE));
    }

    #[test]
    fn header_only_output_means_no_devices() {
        assert!(parse_lsblk("NAME SIZE MOUNTPOINT\n").is_empty());
        assert!(parse_lsblk("").is_empty());
    }

    #[test]
    fn tree_glyphs_and_escapes_are_removed() {
        let devices = parse_lsblk("NAME SIZE MOUNTPOINT\n└─sdc1 1T /mnt/my\\x20disk\n");
        assert_eq!(devices[0].name, "sdc1");
        assert_eq!(devices[0].mount_point.as_deref(), Some("/mnt/my disk"));
    }

    #[test]
    fn escaped_multibyte_characters_decode_as_utf8() {
        assert_eq!(unescape_hex("/media/caf\\xc3\\xa9"), "/media/café");
        assert_eq!(unescape_hex("/mnt/données"), "/mnt/données");
        assert_eq!(unescape_hex("/mnt/bad\\xzz"), "/mnt/bad\\xzz");
    }

    #[test]
    fn missing_size_column_keeps_mount_point() {
        let devices = parse_lsblk("NAME SIZE MOUNTPOINT\nloop0 /snap/core\n");
        assert_eq!(devices[0].size_bytes, None);
        assert_eq!(devices[0].mount_point.as_deref(), Some("/snap/core"));
    }

    #[test]
    fn sizes_use_binary_units() {
        assert_eq!(parse_size("4096"), Some(4096));
        assert_eq!(parse_size("512M"), Some(512 * 1024 * 1024));
        assert_eq!(parse_size("1.5K"), Some(1536));
        assert_eq!(parse_size("0B"), Some(0));
        assert_eq!(parse_size("abc"), None);
        assert_eq!(parse_size("12Q"), None);
    }

    #[test]
    fn mounted_paths_skip_swap_and_duplicates() {
        let mut devices = parse_lsblk(SAMPLE);
        devices.push(BlockDevice::new("sdb2", None, Some("/mnt/data".to_string())));
        assert_eq!(mounted_paths(&devices), vec!["/boot/efi", "/", "/mnt/data"]);
    }

    #[test]
    fn missing_tool_is_a_discovery_error() {
        let catalog = DeviceCatalog::new("/nonexistent/lsblk-for-tests");
        assert!(matches!(catalog.list_devices(), Err(SysError::Discovery(_))));
    }

    #[test]
    fn failing_tool_is_a_discovery_error() {
        let catalog = DeviceCatalog::new("false");
        assert!(matches!(catalog.list_devices(), Err(SysError::Discovery(_))));
    }
}
