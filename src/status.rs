//! Status codes surfaced to clients and exchanged with approval observers.
//!
//! The daemon keeps its own status space for conditions it detects itself,
//! and embeds UNIX errnos reported by helpers and ioctls into a reserved
//! region of that space so a single 32-bit code travels over the wire.

use std::fmt;

#[cfg(feature = "serializable")]
use serde::Deserialize;
#[cfg(feature = "serializable")]
use serde::Serialize;

use crate::Errno;

/// Region of the status space carrying an embedded kernel errno.
const ERRNO_SPACE: u32 = 0x1000_C000;

/// Mask selecting the errno bits within [`ERRNO_SPACE`].
const ERRNO_MASK: u32 = 0x3FFF;

/// A 32-bit status code.
///
/// Zero is success. Codes in the daemon's local space describe conditions
/// the engine detects itself ([`Status::BUSY`], [`Status::UNSUPPORTED`],
/// ...); [`Status::from_errno`] embeds a kernel errno reported by a
/// filesystem helper or an ioctl. A handful of reserved values are not
/// errors at all but in-band signals from approval observers; see
/// [`ApprovalSignal`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Status(u32);

impl Status {
    /// The operation completed.
    pub const SUCCESS: Status = Status(0);
    /// Unspecified failure.
    pub const ERROR: Status = Status(0xF8DA_0001);
    /// The target is in use, e.g. a mount of an already mounted volume.
    pub const BUSY: Status = Status(0xF8DA_0002);
    /// An argument was malformed.
    pub const BAD_ARGUMENT: Status = Status(0xF8DA_0003);
    /// The target is held exclusively by another party.
    pub const EXCLUSIVE_ACCESS: Status = Status(0xF8DA_0004);
    /// A required resource could not be obtained.
    pub const NO_RESOURCES: Status = Status(0xF8DA_0005);
    /// The target does not exist.
    pub const NOT_FOUND: Status = Status(0xF8DA_0006);
    /// The disk has no mounted volume.
    pub const NOT_MOUNTED: Status = Status(0xF8DA_0007);
    /// The operation was refused, e.g. a claim whose owner is gone.
    pub const NOT_PERMITTED: Status = Status(0xF8DA_0008);
    /// The caller failed the authorization check.
    pub const NOT_PRIVILEGED: Status = Status(0xF8DA_0009);
    /// The disk is not ready, e.g. its volume requires repair.
    pub const NOT_READY: Status = Status(0xF8DA_000A);
    /// The disk cannot be written.
    pub const NOT_WRITABLE: Status = Status(0xF8DA_000B);
    /// The operation is not meaningful for this disk.
    pub const UNSUPPORTED: Status = Status(0xF8DA_000C);

    /// Construct a status from its raw 32-bit code.
    pub const fn from_code(code: u32) -> Status {
        Status(code)
    }

    /// Embed a kernel errno into the status space.
    pub fn from_errno(errno: Errno) -> Status {
        Status(ERRNO_SPACE | (errno as i32 as u32 & ERRNO_MASK))
    }

    /// The raw 32-bit code.
    pub const fn code(self) -> u32 {
        self.0
    }

    /// Whether this is [`Status::SUCCESS`].
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }

    /// The embedded errno, if this status came from [`Status::from_errno`].
    pub fn errno(self) -> Option<Errno> {
        if self.0 & !ERRNO_MASK == ERRNO_SPACE {
            Some(Errno::from_raw((self.0 & ERRNO_MASK) as i32))
        } else {
            None
        }
    }

    fn name(self) -> Option<&'static str> {
        Some(match self {
            Status::SUCCESS => "Success",
            Status::ERROR => "Error",
            Status::BUSY => "Busy",
            Status::BAD_ARGUMENT => "BadArgument",
            Status::EXCLUSIVE_ACCESS => "ExclusiveAccess",
            Status::NO_RESOURCES => "NoResources",
            Status::NOT_FOUND => "NotFound",
            Status::NOT_MOUNTED => "NotMounted",
            Status::NOT_PERMITTED => "NotPermitted",
            Status::NOT_PRIVILEGED => "NotPrivileged",
            Status::NOT_READY => "NotReady",
            Status::NOT_WRITABLE => "NotWritable",
            Status::UNSUPPORTED => "Unsupported",
            _ => return None,
        })
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = self.name() {
            write!(f, "Status::{name}")
        } else if let Some(errno) = self.errno() {
            write!(f, "Status::from_errno({errno:?})")
        } else {
            write!(f, "Status({:#010X})", self.0)
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010X}", self.0)
    }
}

/// In-band control signals an approval observer may answer with.
///
/// These ride in the status field of a dissenter but are not vetoes: the
/// engine consumes them and adjusts the pipeline instead of failing the
/// request. The numeric values are a wire contract with deployed observers
/// and must never change.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ApprovalSignal {
    /// Run the authorization stage before proceeding.
    RequireAuthorization,
    /// Mount read-only instead of read-write (mount only).
    MountReadOnly,
    /// Mount read-only, and run the authorization stage (mount only).
    MountReadOnlyRequireAuthorization,
}

impl ApprovalSignal {
    /// Interpret a status code as a signal, if it is one.
    pub fn from_status(status: Status) -> Option<ApprovalSignal> {
        match status.code() {
            0xF8DA_FF01 => Some(ApprovalSignal::RequireAuthorization),
            0xF8DA_FF02 => Some(ApprovalSignal::MountReadOnly),
            0xF8DA_FF03 => Some(ApprovalSignal::MountReadOnlyRequireAuthorization),
            _ => None,
        }
    }

    /// The status code carrying this signal.
    pub const fn status(self) -> Status {
        match self {
            ApprovalSignal::RequireAuthorization => Status(0xF8DA_FF01),
            ApprovalSignal::MountReadOnly => Status(0xF8DA_FF02),
            ApprovalSignal::MountReadOnlyRequireAuthorization => Status(0xF8DA_FF03),
        }
    }
}
