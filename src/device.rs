//! Raw device operations backing the eject stage.

use std::fs::File;
#[cfg(any(target_os = "macos", target_os = "linux"))]
use std::os::fd::AsRawFd;

use crate::Errno;

// Media eject request of the platform's block/removable-media driver.
#[cfg(any(target_os = "macos", target_os = "linux"))]
mod ioctl {
    #![allow(unreachable_pub, missing_docs)]

    #[cfg(target_os = "macos")]
    nix::ioctl_none!(media_eject, b'd', 21);

    #[cfg(target_os = "linux")]
    nix::ioctl_none_bad!(media_eject, 0x5309);
}

/// Open the device node read-only. The handle is closed by drop.
pub(crate) fn open(path: &str) -> Result<File, Errno> {
    File::open(path).map_err(|error| error.raw_os_error().map_or(Errno::EIO, Errno::from_raw))
}

/// Ask the driver to eject the media behind the open device node.
pub(crate) fn eject(device: &File) -> Result<(), Errno> {
    #[cfg(any(target_os = "macos", target_os = "linux"))]
    {
        unsafe { ioctl::media_eject(device.as_raw_fd()) }.map(drop)
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        let _ = device;
        Err(Errno::ENOTTY)
    }
}
