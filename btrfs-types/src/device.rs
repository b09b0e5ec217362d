// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

/// A block device as reported by the system listing tool.
///
/// Produced fresh on every discovery call and never cached, since devices
/// can be hot-plugged or (un)mounted between calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDevice {
    /// Kernel name, e.g. `sda1` or `nvme0n1p2`
    pub name: String,
    /// Size in bytes, when the listing reported one
    pub size_bytes: Option<u64>,
    /// Mount point, `None` when unmounted
    pub mount_point: Option<String>,
}

impl BlockDevice {
    pub fn new(name: impl Into<String>, size_bytes: Option<u64>, mount_point: Option<String>) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            mount_point,
        }
    }

    /// Path of the device node (`/dev/<name>` unless the name is already a path)
    pub fn device_path(&self) -> String {
        device_path_for(&self.name)
    }

    pub fn is_mounted(&self) -> bool {
        self.mount_point.is_some()
    }
}

/// Normalize a device reference to a device node path.
///
/// Bare kernel names (`sda1`) gain a `/dev/` prefix, anything containing a
/// `/` is returned untouched.
pub fn device_path_for(name: &str) -> String {
    if name.contains('/') {
        name.to_string()
    } else {
        format!("/dev/{name}")
    }
}
