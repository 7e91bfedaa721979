//! Unmount request options.

use bitflags::bitflags;

bitflags! {
    /// Option bits accepted by an unmount request.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct UnmountOptions: u32 {
        /// Unmount the whole disk rather than a single volume.
        const WHOLE = 1 << 0;
        /// Unmount even if the volume is in use.
        const FORCE = 1 << 19;
    }
}
