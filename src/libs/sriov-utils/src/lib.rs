// Copyright (c) 2023 The SR-IOV utils contributors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Query and configure SR-IOV capable PCI network devices through sysfs.
//!
//! [`SysfsSriovProvider`] turns PCI address level requests ("create 7 VFs on
//! this PF", "which driver is bound to this VF", "what IOMMU group is this
//! device in") into reads, writes and symlink resolutions under three
//! configurable roots, normally `/sys/bus/pci/devices`, `/sys/bus/pci/drivers`
//! and `/sys/kernel/iommu_groups`. The provider keeps no state: sysfs is the
//! only source of truth and is read again on every call.

#[macro_use]
extern crate slog;

logging::logger_with_subsystem!(sl, "sriov");

pub mod config;
pub mod error;
pub mod pci;
pub mod provider;
mod sysfs;

pub use config::SriovConfig;
pub use error::{Error, Result};
pub use pci::{normalize_pci_address, PciAddress};
pub use provider::{SriovProvider, SysfsSriovProvider};
