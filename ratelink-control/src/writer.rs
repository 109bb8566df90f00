use std::{
    fs::{File, OpenOptions},
    io,
    path::{Path, PathBuf},
};

use crate::{
    region::{Access, MappedRegion},
    ControlError, ControlSnapshot, ControlSource, CONTROL_REGION_SIZE, ENABLED_FIELD, RATE_FIELD,
};

/// The controller side of a control region.
///
/// Controllers use this to publish a new rate or to switch the link on and off while links
/// are reading the same region through [`ControlChannel`](crate::ControlChannel).
#[derive(Debug)]
pub struct ControlWriter {
    path: PathBuf,
    region: MappedRegion,
}

impl ControlWriter {
    /// Creates a new control region at `path` holding `initial`.
    ///
    /// Fails with [`ControlError::AlreadyExists`] if something already lives at `path`, so two
    /// controllers never silently fight over the same region.
    pub fn create(path: impl AsRef<Path>, initial: ControlSnapshot) -> Result<Self, ControlError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|source| match source.kind() {
                io::ErrorKind::AlreadyExists => ControlError::AlreadyExists(path.to_path_buf()),
                _ => ControlError::Open { path: path.to_path_buf(), source },
            })?;

        file.set_len(CONTROL_REGION_SIZE as u64)?;

        let writer = Self::map(path, &file)?;
        writer.store(initial);

        tracing::debug!(?path, rate_bps = initial.rate_bps, enabled = initial.link_enabled, "created control region");

        Ok(writer)
    }

    /// Attaches to an existing control region at `path` for writing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ControlError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| ControlError::Open { path: path.to_path_buf(), source })?;

        Self::map(path, &file)
    }

    fn map(path: &Path, file: &File) -> Result<Self, ControlError> {
        let region = MappedRegion::map(path, file, Access::ReadWrite)?;
        Ok(Self { path: path.to_path_buf(), region })
    }

    /// Publishes a new link rate in bits per second.
    ///
    /// Zero is written as-is, but links treat it as a fatal configuration error. To take the
    /// link down temporarily use [`Self::set_enabled`] instead.
    pub fn set_rate_bps(&self, rate_bps: u64) {
        if rate_bps == 0 {
            tracing::warn!(path = ?self.path, "publishing a zero rate, readers will fail");
        }

        self.region.store(RATE_FIELD, rate_bps);
    }

    /// Switches the link on or off.
    pub fn set_enabled(&self, enabled: bool) {
        self.region.store(ENABLED_FIELD, enabled as u64);
    }

    /// Publishes both fields, rate first.
    pub fn store(&self, snapshot: ControlSnapshot) {
        let [rate, enabled] = snapshot.to_words();
        self.set_rate_bps(rate);
        self.region.store(ENABLED_FIELD, enabled);
    }

    /// Flushes the region to its backing file, for readers that don't share our page cache.
    pub fn sync(&self) -> Result<(), ControlError> {
        self.region
            .sync()
            .map_err(|source| ControlError::Map { path: self.path.clone(), source })
    }

    /// The control file this writer maps.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ControlSource for ControlWriter {
    fn rate_bps(&self) -> u64 {
        self.region.load(RATE_FIELD)
    }

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
