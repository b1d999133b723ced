// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Local staging area for agent bootstrap files.
//!
//! Layout, mirrored into the container's working directory:
//!
//! ```text
//! <staging>/
//! ├── agent.jar
//! └── config/
//!     └── autoregister.properties
//! ```
//!
//! The directory is removed when the `StagingArea` is dropped, on every
//! exit path of the creation flow.

use crate::domain::registration::{RegistrationDescriptor, DESCRIPTOR_FILE_NAME};
use bytes::Bytes;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

pub const AGENT_ARTIFACT_NAME: &str = "agent.jar";
pub const CONFIG_DIR_NAME: &str = "config";

const STAGING_PREFIX: &str = "elastic-agent-staging-";

#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
}

impl StagingArea {
    /// Create a fresh staging directory under `root` holding the descriptor
    /// and a copy of the agent artifact.
    pub fn assemble(
        root: &Path,
        descriptor: &RegistrationDescriptor,
        artifact: &Path,
    ) -> io::Result<Self> {
        fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new().prefix(STAGING_PREFIX).tempdir_in(root)?;

        let config_dir = dir.path().join(CONFIG_DIR_NAME);
        fs::create_dir_all(&config_dir)?;
        fs::write(config_dir.join(DESCRIPTOR_FILE_NAME), descriptor.render())?;

        fs::copy(artifact, dir.path().join(AGENT_ARTIFACT_NAME)).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("cannot copy agent artifact {}: {}", artifact.display(), e),
            )
        })?;

        debug!(path = %dir.path().display(), "Assembled staging area");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Tar the staging area's contents with paths relative to its root.
    pub fn archive(&self) -> io::Result<Bytes> {
        let mut builder = tar::Builder::new(Vec::new());
        builder.follow_symlinks(true);
        builder.append_dir_all(".", self.dir.path())?;
        let data = builder.into_inner()?;
        Ok(Bytes::from(data))
    }

    /// Remove the staging directory, reporting failures instead of
    /// swallowing them as drop does.
    pub fn close(self) -> io::Result<PathBuf> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().inspect_err(|e| {
            warn!(path = %path.display(), "Failed to remove staging area: {}", e);
        })?;
        Ok(path)
    }
}
