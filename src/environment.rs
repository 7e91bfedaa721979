//! The seam between the engine and its collaborators.
//!
//! Approval observers, the authorization service, the filesystem helpers,
//! the mount point manager, the notification fan-out and the client
//! completion queue all live outside the arbitration core. The engine
//! reaches every one of them through this trait, and every method has a
//! default body, so an embedder implements only the pieces it has.

use std::fs::File;

use log::warn;

use crate::AuthorizeOptions;
use crate::CallbackRef;
use crate::DescriptionKey;
use crate::DiskRef;
use crate::Dissenter;
use crate::Errno;
use crate::Filesystem;
use crate::Status;
use crate::device;
use crate::reply::ApprovalReply;
use crate::reply::AuthorizeReply;
use crate::reply::MountReply;
use crate::reply::RenameReply;
use crate::reply::UnmountReply;

/// A named right checked by the authorization service.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Right {
    /// The right to mount a volume.
    Mount,
    /// The right to unmount a volume.
    Unmount,
}

impl Right {
    /// The policy database name of this right.
    pub fn name(self) -> &'static str {
        match self {
            Right::Mount => "system.volume.mount",
            Right::Unmount => "system.volume.unmount",
        }
    }
}

/// What the mount point manager is asked to do.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MountPointAction {
    /// Create a fresh mount point directory.
    Make,
    /// Move an existing mount point to match a new volume name.
    Move,
    /// Remove a mount point directory.
    Remove,
}

/// The collaborators the engine invokes.
///
/// The approval, authorization and helper methods are asynchronous: they
/// receive a consume-once reply handle and may answer it from inside the
/// call or hold on to it and answer later, as long as the answer happens
/// on the scheduler thread. The remaining methods are synchronous.
///
/// Defaults: approvals raise no objection, authorization succeeds, the
/// filesystem helpers fail with `ENOTSUP`, the device methods perform the
/// real syscalls, and the notification hooks do nothing.
pub trait Environment {
    /// Ask the owning session to release its claim on `disk`.
    fn claim_release(&self, _disk: &DiskRef, _owner: &CallbackRef, reply: ApprovalReply) {
        reply.respond(None);
    }

    /// Ask the observer set whether `disk` may be ejected.
    fn eject_approval(&self, _disk: &DiskRef, reply: ApprovalReply) {
        reply.respond(None);
    }

    /// Ask the observer set whether `disk` may be mounted.
    fn mount_approval(&self, _disk: &DiskRef, reply: ApprovalReply) {
        reply.respond(None);
    }

    /// Ask the observer set whether `disk` may be unmounted.
    fn unmount_approval(&self, _disk: &DiskRef, reply: ApprovalReply) {
        reply.respond(None);
    }

    /// Check `right` for the requesting user against the policy service.
    fn authorize(
        &self,
        _disk: &DiskRef,
        _user_uid: u32,
        _user_gid: u32,
        _right: Right,
        _options: AuthorizeOptions,
        reply: AuthorizeReply,
    ) {
        reply.respond(Status::SUCCESS);
    }

    /// Mount `disk`, at `mountpoint` if given, else wherever the mounter
    /// chooses. `arguments` is the client's mount argument string.
    fn mount(
        &self,
        disk: &DiskRef,
        mountpoint: Option<&str>,
        arguments: Option<&str>,
        reply: MountReply,
    ) {
        warn!(
            "[Not Implemented] mount(disk: {}, mountpoint: {mountpoint:?}, arguments: {arguments:?})",
            disk.id()
        );
        reply.error(Errno::ENOTSUP);
    }

    /// Unmount the volume at `mountpoint`. `arguments` carries the
    /// [`UNMOUNT_ARGUMENT_FORCE`](crate::UNMOUNT_ARGUMENT_FORCE) token
    /// when the client asked to unmount even if busy.
    fn unmount(
        &self,
        filesystem: &Filesystem,
        mountpoint: &str,
        arguments: Option<&str>,
        reply: UnmountReply,
    ) {
        warn!(
            "[Not Implemented] unmount(filesystem: {}, mountpoint: {mountpoint:?}, arguments: {arguments:?})",
            filesystem.name()
        );
        reply.error(Errno::ENOTSUP);
    }

    /// Rename the volume at `mountpoint` to `name`.
    fn rename(&self, filesystem: &Filesystem, mountpoint: &str, name: &str, reply: RenameReply) {
        warn!(
            "[Not Implemented] rename(filesystem: {}, mountpoint: {mountpoint:?}, name: {name:?})",
            filesystem.name()
        );
        reply.error(Errno::ENOTSUP);
    }

    /// Re-read `disk`'s on-disk state. Synchronous.
    fn refresh(&self, _disk: &DiskRef) -> Status {
        Status::SUCCESS
    }

    /// Open the raw device node read-only.
    fn device_open(&self, path: &str) -> Result<File, Errno> {
        device::open(path)
    }

    /// Issue the media eject request on an open device node.
    fn device_eject(&self, device: &File) -> Result<(), Errno> {
        device::eject(device)
    }

    /// Have the mount point manager act for `disk`, returning the
    /// resulting mount point URL where one is produced.
    fn create_mount_point(&self, _disk: &DiskRef, _action: MountPointAction) -> Option<String> {
        None
    }

    /// Remove the mount point directory at `mountpoint`.
    fn remove_mount_point(&self, _mountpoint: &str) {}

    /// Tell observers which description fields of `disk` changed.
    fn description_changed(&self, _disk: &DiskRef, _keys: &[DescriptionKey]) {}

    /// Tell observers `disk` is gone.
    fn disappeared(&self, _disk: &DiskRef) {}

    /// Record `disk`'s state in the daemon log.
    fn disk_log(&self, _disk: &DiskRef) {}

    /// Deliver a request completion to the client behind `callback`.
    fn deliver(&self, _callback: &CallbackRef, _disk: &DiskRef, _dissenter: Option<&Dissenter>) {}
}
