// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::path::{Path, PathBuf};

use gsheet_core::{Error, FileRead, Result, Storage};
use log::debug;

/// StdFileRead reads files with `std::fs`.
///
/// Each [`Storage`] maps to a root directory. Paths are joined to the root
/// after stripping leading `/`, so `/key.json` on SD reads `<sd_root>/key.json`.
#[derive(Debug, Clone)]
pub struct StdFileRead {
    flash_root: PathBuf,
    sd_root: PathBuf,
}

impl Default for StdFileRead {
    fn default() -> Self {
        Self {
            flash_root: PathBuf::from("/"),
            sd_root: PathBuf::from("/"),
        }
    }
}

impl StdFileRead {
    /// Create a reader with both storages rooted at `/`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the directory backing [`Storage::Flash`].
    pub fn with_flash_root(mut self, root: impl AsRef<Path>) -> Self {
        self.flash_root = root.as_ref().to_path_buf();
        self
    }

    /// Set the directory backing [`Storage::Sd`].
    pub fn with_sd_root(mut self, root: impl AsRef<Path>) -> Self {
        self.sd_root = root.as_ref().to_path_buf();
        self
    }

    fn resolve(&self, storage: Storage, path: &str) -> PathBuf {
        let root = match storage {
            Storage::Flash => &self.flash_root,
            Storage::Sd => &self.sd_root,
        };
        root.join(path.trim_start_matches('/'))
    }
}

impl FileRead for StdFileRead {
    fn file_read(&self, storage: Storage, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(storage, path);
        debug!("reading {:?} file {}", storage, full.display());
        std::fs::read(&full).map_err(|e| {
            Error::unexpected(format!("failed to read file {}", full.display())).with_source(e)
        })
    }
}
