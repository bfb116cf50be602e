// Copyright 2024 Wladimir Palant
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Sources the page file can be read from.

use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use preview_module_utils::pingora::{Error, ErrorType};
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// Asynchronous access to file contents
#[async_trait]
pub trait FileReader: Debug + Send + Sync {
    /// Reads the entire file. Failures are reported as `FileReadError`.
    async fn read(&self, path: &Path) -> Result<Bytes, Box<Error>>;
}

/// Reads files from disk
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskReader;

#[async_trait]
impl FileReader for DiskReader {
    async fn read(&self, path: &Path) -> Result<Bytes, Box<Error>> {
        let contents = tokio::fs::read(path).await.map_err(|err| {
            Error::because(
                ErrorType::FileReadError,
                format!("failed reading file {path:?}"),
                err,
            )
        })?;
        Ok(contents.into())
    }
}

/// Serves files from memory, e.g. build output that was never written to disk
#[derive(Debug, Clone, Default)]
pub struct MemoryReader {
    files: HashMap<PathBuf, Bytes>,
}

impl MemoryReader {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store containing the current contents of the given files on disk.
    pub fn preload(paths: &[impl AsRef<Path>]) -> Result<Self, Box<Error>> {
        let mut reader = Self::new();
        for path in paths {
            let path = path.as_ref();
            let contents = std::fs::read(path).map_err(|err| {
                Error::because(
                    ErrorType::InternalError,
                    format!("failed loading file {path:?} into memory"),
                    err,
                )
            })?;
            debug!("loaded {} bytes from {path:?} into memory", contents.len());
            reader.insert(path, contents);
        }
        Ok(reader)
    }

    /// Adds a file to the store or replaces its contents.
    pub fn insert(&mut self, path: impl Into<PathBuf>, contents: impl Into<Bytes>) {
        self.files.insert(path.into(), contents.into());
    }
}

#[async_trait]
impl FileReader for MemoryReader {
    async fn read(&self, path: &Path) -> Result<Bytes, Box<Error>> {
        self.files.get(path).cloned().ok_or_else(|| {
            Error::explain(
                ErrorType::FileReadError,
                format!("file {path:?} not found in memory"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;
    use test_log::test;

    #[test(tokio::test)]
    async fn memory() {
        let mut reader = MemoryReader::new();
        reader.insert("build/_index.html", "<html></html>");

        assert_eq!(
            reader.read(Path::new("build/_index.html")).await.unwrap(),
            "<html></html>"
        );

        let err = reader.read(Path::new("build/missing.html")).await.unwrap_err();
        assert_eq!(err.etype, ErrorType::FileReadError);
    }

    #[test(tokio::test)]
    async fn disk() {
        let path =
            std::env::temp_dir().join(format!("page-module-reader-{}.html", std::process::id()));
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"<html></html>")
            .unwrap();

        assert_eq!(DiskReader.read(&path).await.unwrap(), "<html></html>");

        let preloaded = MemoryReader::preload(&[&path]).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(preloaded.read(&path).await.unwrap(), "<html></html>");

        let err = DiskReader.read(&path).await.unwrap_err();
        assert_eq!(err.etype, ErrorType::FileReadError);

        let err = MemoryReader::preload(&[&path]).unwrap_err();
        assert_eq!(err.etype, ErrorType::InternalError);
    }
}
