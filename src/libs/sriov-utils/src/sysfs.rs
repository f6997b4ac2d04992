// Copyright (c) 2023 The SR-IOV utils contributors
//
// SPDX-License-Identifier: Apache-2.0
//

use std::io;
use std::num::ParseIntError;
use std::path::Path;
use std::str::FromStr;

use tokio::fs;

use crate::error::{Error, Result};

pub(crate) async fn path_exists(path: &Path) -> bool {
    fs::metadata(path).await.is_ok()
}

/// Fails with NotFound unless `path` is an existing directory.
pub(crate) async fn ensure_dir(path: &Path) -> Result<()> {
    let metadata = fs::metadata(path)
        .await
        .map_err(|e| Error::from_io(path, e))?;
    if !metadata.is_dir() {
        return Err(Error::not_found(path));
    }
    Ok(())
}

/// Read a sysfs attribute holding a single decimal integer.
pub(crate) async fn read_int<T>(path: &Path) -> Result<T>
where
    T: FromStr<Err = ParseIntError>,
{
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| Error::from_io(path, e))?;
    let content = content.trim();

    content.parse::<T>().map_err(|source| Error::ParseError {
        path: path.to_path_buf(),
        content: content.to_string(),
        source,
    })
}

/// Returns the last component of the symlink target at `path`, or `None`
/// when there is no such link.
pub(crate) async fn read_link_name(path: &Path) -> Result<Option<String>> {
    let target = match fs::read_link(path).await {
        Ok(target) => target,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::from_io(path, e)),
    };

    Ok(target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned()))
}

/// Names of the entries directly under `path`, in readdir order.
pub(crate) async fn list_dir_names(path: &Path) -> Result<Vec<String>> {
    let mut dir = fs::read_dir(path)
        .await
        .map_err(|e| Error::from_io(path, e))?;

    let mut names = Vec::new();
    while let Some(entry) = dir
        .next_entry()
        .await
        .map_err(|e| Error::from_io(path, e))?
    {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

pub(crate) async fn write_attr(path: &Path, value: &str) -> Result<()> {
    fs::write(path, value)
        .await
        .map_err(|e| Error::from_write(path, e))
}
