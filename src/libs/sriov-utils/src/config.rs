// Copyright (c) 2023 The SR-IOV utils contributors
//
// SPDX-License-Identifier: Apache-2.0
//

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const PCI_DEVICES_PATH: &str = "/sys/bus/pci/devices";
pub const PCI_DRIVERS_PATH: &str = "/sys/bus/pci/drivers";
pub const IOMMU_GROUPS_PATH: &str = "/sys/kernel/iommu_groups";

/// Sysfs roots the provider resolves every device, driver and IOMMU group
/// path against.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct SriovConfig {
    pub pci_devices_path: PathBuf,
    pub pci_drivers_path: PathBuf,
    pub iommu_groups_path: PathBuf,
}

impl Default for SriovConfig {
    fn default() -> Self {
        SriovConfig {
            pci_devices_path: PathBuf::from(PCI_DEVICES_PATH),
            pci_drivers_path: PathBuf::from(PCI_DRIVERS_PATH),
            iommu_groups_path: PathBuf::from(IOMMU_GROUPS_PATH),
        }
    }
}

impl SriovConfig {
    /// Lays the three roots out under `root` the way they sit under `/sys`.
    pub fn with_sysfs_root<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        SriovConfig {
            pci_devices_path: root.join("bus/pci/devices"),
            pci_drivers_path: root.join("bus/pci/drivers"),
            iommu_groups_path: root.join("kernel/iommu_groups"),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SriovConfig = toml::from_str(content)
            .map_err(|e| Error::InvalidConfig(format!("failed to parse toml: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the configuration from a TOML file, keys missing from the file
    /// keep their default value.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| Error::from_io(path, e))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, path) in &[
            ("pci_devices_path", &self.pci_devices_path),
            ("pci_drivers_path", &self.pci_drivers_path),
            ("iommu_groups_path", &self.iommu_groups_path),
        ] {
            if path.as_os_str().is_empty() {
                return Err(Error::InvalidConfig(format!("{} is empty", name)));
            }
        }
        Ok(())
    }
}
