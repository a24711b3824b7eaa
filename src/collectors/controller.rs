use crate::domain::{DiskDriveStats, Presentation, StoragePool, VirtualDisk, VirtualDiskStats};
use anyhow::Result;

/// Bulk-fetch access to one storage controller.
///
/// Every call returns all current records of one type; each record carries
/// the controller's own integer index for the object it describes.
pub trait Controller: Send {
    /// Human-readable name used in logs and published records.
    fn host(&self) -> &str;

    fn firmware_version(&mut self) -> Result<String>;

    fn virtual_disk_stats(&mut self) -> Result<Vec<VirtualDiskStats>>;

    fn disk_drive_stats(&mut self) -> Result<Vec<DiskDriveStats>>;

    fn presentations(&mut self) -> Result<Vec<Presentation>>;

    fn storage_pools(&mut self) -> Result<Vec<StoragePool>>;

    fn virtual_disks(&mut self) -> Result<Vec<VirtualDisk>>;
}

impl<C: Controller + ?Sized> Controller for Box<C> {
    fn host(&self) -> &str {
        (**self).host()
    }

    fn firmware_version(&mut self) -> Result<String> {
        (**self).firmware_version()
    }

    fn virtual_disk_stats(&mut self) -> Result<Vec<VirtualDiskStats>> {
        (**self).virtual_disk_stats()
    }

    fn disk_drive_stats(&mut self) -> Result<Vec<DiskDriveStats>> {
        (**self).disk_drive_stats()
    }

    fn presentations(&mut self) -> Result<Vec<Presentation>> {
        (**self).presentations()
    }

    fn storage_pools(&mut self) -> Result<Vec<StoragePool>> {
        (**self).storage_pools()
    }

    fn virtual_disks(&mut self) -> Result<Vec<VirtualDisk>> {
        (**self).virtual_disks()
    }
}
