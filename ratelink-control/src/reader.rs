use std::{
    fs::File,
    path::{Path, PathBuf},
};

use crate::{
    region::{Access, MappedRegion},
    ControlError, ControlSnapshot, ControlSource, ENABLED_FIELD, RATE_FIELD,
};

/// Read-only view of a control region written by an external controller.
///
/// Every accessor reads the live mapping, there is no caching. The mapping stays valid for as
/// long as this value lives, even if the controller removes the file.
#[derive(Debug)]
pub struct ControlChannel {
    path: PathBuf,
    region: MappedRegion,
}

impl ControlChannel {
    /// Maps the control region at `path` read-only.
    ///
    /// Fails if the file can't be opened, is shorter than
    /// [`CONTROL_REGION_SIZE`](crate::CONTROL_REGION_SIZE) bytes, or can't be mapped.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ControlError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|source| ControlError::Open { path: path.to_path_buf(), source })?;

        let region = MappedRegion::map(path, &file, Access::ReadOnly)?;

        Ok(Self { path: path.to_path_buf(), region })
    }

    /// The path this channel was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ControlSource for ControlChannel {
    #[inline]
    fn rate_bps(&self) -> u64 {
        self.region.load(RATE_FIELD)
    }

    #[inline]
    fn link_enabled(&self) -> bool {
        self.region.load(ENABLED_FIELD) == 1
    }

    fn snapshot(&self) -> ControlSnapshot {
        self.region.snapshot()
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
