// Copyright (c) 2023 The SR-IOV utils contributors
//
// SPDX-License-Identifier: Apache-2.0
//

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::config::SriovConfig;
use crate::error::{Error, Result};
use crate::pci::normalize_pci_address;
use crate::sysfs;

const TOTAL_VFS_FILE: &str = "sriov_totalvfs";
const CONFIGURED_VFS_FILE: &str = "sriov_numvfs";
const PHYSFN_LINK: &str = "physfn";
const VIRTFN_PREFIX: &str = "virtfn";
const NET_DIR: &str = "net";
const IOMMU_GROUP_LINK: &str = "iommu_group";
const IOMMU_GROUP_DEVICES_DIR: &str = "devices";
const DRIVER_LINK: &str = "driver";
const BIND_FILE: &str = "bind";
const UNBIND_FILE: &str = "unbind";

/// Queries and configures SR-IOV capable PCI devices.
///
/// Boolean probes never fail: any error, including a malformed address,
/// reads as `false`. Every other operation reports what went wrong.
/// Nothing is cached, each call goes back to sysfs, and dropping the
/// returned future abandons the operation.
#[async_trait]
pub trait SriovProvider: Send + Sync {
    /// Whether the device exposes `sriov_totalvfs`.
    async fn is_device_sriov_capable(&self, address: &str) -> bool;

    /// Whether the device is a VF, i.e. it has a `physfn` link.
    async fn is_sriov_virtual_function(&self, address: &str) -> bool;

    async fn get_configured_virtual_functions_number(&self, address: &str) -> Result<u32>;

    /// Whether at least one VF is configured on the device.
    async fn is_sriov_configured(&self, address: &str) -> bool;

    async fn get_sriov_virtual_functions_capacity(&self, address: &str) -> Result<u32>;

    /// Whether the device directory exists. Short addresses are expanded
    /// with the default domain; a malformed address is an error.
    async fn is_device_exists(&self, address: &str) -> Result<bool>;

    /// Network interface names of the device, sorted alphabetically.
    async fn get_net_interfaces_names(&self, address: &str) -> Result<Vec<String>>;

    /// Configure `count` VFs on the PF. Only positive counts are accepted.
    async fn create_virtual_functions(&self, address: &str, count: i32) -> Result<()>;

    /// PCI addresses of the PF's VFs, ordered by their `virtfn<N>` index.
    async fn get_virtual_functions_list(&self, address: &str) -> Result<Vec<String>>;

    async fn get_iommu_group_number(&self, address: &str) -> Result<u32>;

    /// PCI addresses of the members of an IOMMU group, sorted lexically.
    async fn get_iommu_group_devices(&self, group: u32) -> Result<Vec<String>>;

    /// Name of the driver bound to the device, `None` when unbound.
    async fn get_bound_driver(&self, address: &str) -> Result<Option<String>>;

    /// Unbind the device from its driver. Succeeds without writing when no
    /// driver is bound.
    async fn unbind_driver(&self, address: &str) -> Result<()>;

    async fn bind_driver(&self, address: &str, driver: &str) -> Result<()>;
}

/// [`SriovProvider`] backed by the kernel's sysfs tree.
#[derive(Clone, Debug)]
pub struct SysfsSriovProvider {
    pci_devices_path: PathBuf,
    pci_drivers_path: PathBuf,
    iommu_groups_path: PathBuf,
}

impl Default for SysfsSriovProvider {
    fn default() -> Self {
        Self::with_config(&SriovConfig::default())
    }
}

impl SysfsSriovProvider {
    pub fn new<P, Q, R>(pci_devices_path: P, pci_drivers_path: Q, iommu_groups_path: R) -> Self
    where
        P: Into<PathBuf>,
        Q: Into<PathBuf>,
        R: Into<PathBuf>,
    {
        SysfsSriovProvider {
            pci_devices_path: pci_devices_path.into(),
            pci_drivers_path: pci_drivers_path.into(),
            iommu_groups_path: iommu_groups_path.into(),
        }
    }

    pub fn from_config(config: &SriovConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_config(config))
    }

    fn with_config(config: &SriovConfig) -> Self {
        Self::new(
            config.pci_devices_path.clone(),
            config.pci_drivers_path.clone(),
            config.iommu_groups_path.clone(),
        )
    }

    /// Long form address and the directory it maps to. Does not touch the
    /// filesystem.
    fn device_path(&self, address: &str) -> Result<(String, PathBuf)> {
        let address = normalize_pci_address(address)?;
        let path = self.pci_devices_path.join(&address);
        Ok((address, path))
    }

    async fn existing_device_path(&self, address: &str) -> Result<(String, PathBuf)> {
        let (address, path) = self.device_path(address)?;
        sysfs::ensure_dir(&path).await?;
        Ok((address, path))
    }

    async fn probe(&self, address: &str, entry: &str) -> bool {
        match self.device_path(address) {
            Ok((_, path)) => sysfs::path_exists(&path.join(entry)).await,
            Err(e) => {
                debug!(sl!(), "probe {} on {:?}: {}", entry, address, e);
                false
            }
        }
    }

    async fn read_device_int(&self, address: &str, file: &str) -> Result<u32> {
        let (_, path) = self.device_path(address)?;
        sysfs::read_int(&path.join(file)).await
    }
}

// Parses the index out of a `virtfn<N>` entry name.
fn virtfn_index(name: &str) -> Option<u32> {
    name.strip_prefix(VIRTFN_PREFIX)?.parse().ok()
}

fn check_driver_name(driver: &str) -> Result<()> {
    if driver.is_empty() || driver.contains('/') || driver == "." || driver == ".." {
        return Err(Error::InvalidArgument(format!(
            "invalid driver name {:?}",
            driver
        )));
    }
    Ok(())
}

fn busy(path: &Path, reason: String) -> Error {
    Error::ConfigurationRejected {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::Other, reason),
    }
}

#[async_trait]
impl SriovProvider for SysfsSriovProvider {
    async fn is_device_sriov_capable(&self, address: &str) -> bool {
        self.probe(address, TOTAL_VFS_FILE).await
    }

    async fn is_sriov_virtual_function(&self, address: &str) -> bool {
        self.probe(address, PHYSFN_LINK).await
    }

    async fn get_configured_virtual_functions_number(&self, address: &str) -> Result<u32> {
        self.read_device_int(address, CONFIGURED_VFS_FILE).await
    }

    async fn is_sriov_configured(&self, address: &str) -> bool {
        match self.get_configured_virtual_functions_number(address).await {
            Ok(count) => count > 0,
            Err(e) => {
                debug!(sl!(), "read configured VFs of {:?}: {}", address, e);
                false
            }
        }
    }

    async fn get_sriov_virtual_functions_capacity(&self, address: &str) -> Result<u32> {
        self.read_device_int(address, TOTAL_VFS_FILE).await
    }

    async fn is_device_exists(&self, address: &str) -> Result<bool> {
        let (_, path) = self.device_path(address)?;
        match tokio::fs::metadata(&path).await {
            Ok(metadata) => Ok(metadata.is_dir()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::from_io(&path, e)),
        }
    }

    async fn get_net_interfaces_names(&self, address: &str) -> Result<Vec<String>> {
        let (_, path) = self.device_path(address)?;
        let mut names = sysfs::list_dir_names(&path.join(NET_DIR)).await?;
        names.sort();
        Ok(names)
    }

    async fn create_virtual_functions(&self, address: &str, count: i32) -> Result<()> {
        if count <= 0 {
            return Err(Error::InvalidArgument(format!(
                "number of virtual functions must be positive, got {}",
                count
            )));
        }
        let count = count as u32;

        let (address, path) = self.existing_device_path(address).await?;
        let numvfs_path = path.join(CONFIGURED_VFS_FILE);

        // The kernel only moves sriov_numvfs between zero and non-zero.
        let current = match sysfs::read_int::<u32>(&numvfs_path).await {
            Ok(current) => current,
            Err(e) if e.is_not_found() => 0,
            Err(e) => return Err(e),
        };
        if current == count {
            debug!(sl!(), "{} VFs already configured on {}", count, address);
            return Ok(());
        }
        if current != 0 {
            return Err(busy(
                &numvfs_path,
                format!(
                    "{} VFs already enabled on {}, reset to 0 before enabling {}",
                    current, address, count
                ),
            ));
        }

        sysfs::write_attr(&numvfs_path, &count.to_string()).await?;
        info!(sl!(), "created {} virtual functions on {}", count, address);
        Ok(())
    }

    async fn get_virtual_functions_list(&self, address: &str) -> Result<Vec<String>> {
        let (_, path) = self.existing_device_path(address).await?;

        let mut vfs = Vec::new();
        for name in sysfs::list_dir_names(&path).await? {
            let index = match virtfn_index(&name) {
                Some(index) => index,
                None => continue,
            };
            let link = path.join(&name);
            let vf = sysfs::read_link_name(&link)
                .await?
                .ok_or_else(|| Error::not_found(&link))?;
            vfs.push((index, vf));
        }

        vfs.sort_by_key(|(index, _)| *index);
        Ok(vfs.into_iter().map(|(_, vf)| vf).collect())
    }

    async fn get_iommu_group_number(&self, address: &str) -> Result<u32> {
        let (_, path) = self.existing_device_path(address).await?;
        let link = path.join(IOMMU_GROUP_LINK);

        let group = sysfs::read_link_name(&link)
            .await?
            .ok_or_else(|| Error::not_found(&link))?;

        group.parse().map_err(|source| Error::ParseError {
            path: link,
            content: group,
            source,
        })
    }

    async fn get_iommu_group_devices(&self, group: u32) -> Result<Vec<String>> {
        let path = self
            .iommu_groups_path
            .join(group.to_string())
            .join(IOMMU_GROUP_DEVICES_DIR);

        let mut devices = sysfs::list_dir_names(&path).await?;
        devices.sort();
        Ok(devices)
    }

    async fn get_bound_driver(&self, address: &str) -> Result<Option<String>> {
        let (_, path) = self.existing_device_path(address).await?;
        sysfs::read_link_name(&path.join(DRIVER_LINK)).await
    }

    async fn unbind_driver(&self, address: &str) -> Result<()> {
        let (address, path) = self.existing_device_path(address).await?;

        let driver = match sysfs::read_link_name(&path.join(DRIVER_LINK)).await? {
            Some(driver) => driver,
            None => {
                debug!(sl!(), "{} has no driver bound, skip unbind", address);
                return Ok(());
            }
        };

        let unbind_path = self.pci_drivers_path.join(&driver).join(UNBIND_FILE);
        sysfs::write_attr(&unbind_path, &address).await?;
        info!(sl!(), "unbound {} from driver {}", address, driver);
        Ok(())
    }

    async fn bind_driver(&self, address: &str, driver: &str) -> Result<()> {
        check_driver_name(driver)?;
        let (address, _) = self.existing_device_path(address).await?;

        let driver_path = self.pci_drivers_path.join(driver);
        sysfs::ensure_dir(&driver_path).await?;

        sysfs::write_attr(&driver_path.join(BIND_FILE), &address).await?;
        info!(sl!(), "bound {} to driver {}", address, driver);
        Ok(())
    }
}
