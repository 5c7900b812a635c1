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

use std::fmt::Debug;

use crate::Result;

/// Storage selects the medium a file lives on.
///
/// Devices usually mount internal flash and an SD card separately; a
/// [`FileRead`] implementation maps each to its own root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Storage {
    /// Internal flash filesystem.
    #[default]
    Flash,
    /// Removable SD card.
    Sd,
}

/// FileRead is used to read the file content entirely in `Vec<u8>`.
///
/// This could be used to load the service account key file at signing time.
pub trait FileRead: Debug + Send + Sync + 'static {
    /// Read the file content entirely in `Vec<u8>`.
    fn file_read(&self, storage: Storage, path: &str) -> Result<Vec<u8>>;
}
