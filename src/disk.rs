//! The disk registry records the engine reads and writes.
//!
//! A disk is a logical volume or media surface tracked by the daemon. The
//! arrival notifier populates the table and the description; the engine
//! only consumes specific description fields and flips specific state
//! flags, so the description is a typed record rather than a free-form
//! dictionary.

use std::cell::Cell;
use std::cell::RefCell;
use std::rc::Rc;

#[cfg(feature = "serializable")]
use serde::Deserialize;
#[cfg(feature = "serializable")]
use serde::Serialize;

use crate::CallbackRef;
use crate::DiskState;
use crate::UnitRef;

/// Shared handle to a [`Disk`].
pub type DiskRef = Rc<Disk>;

/// Opaque descriptor of the filesystem backing a volume, handed to the
/// unmount and rename helpers so they can pick the right tool.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Filesystem {
    name: String,
}

impl Filesystem {
    /// Create a descriptor for the named filesystem type.
    pub fn new(name: impl Into<String>) -> Filesystem {
        Filesystem { name: name.into() }
    }

    /// The filesystem type name, e.g. `"hfs"` or `"msdos"`.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Keys of the disk description, used to report which fields changed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum DescriptionKey {
    /// [`Description::volume_path`]
    VolumePath,
    /// [`Description::volume_mountable`]
    VolumeMountable,
    /// [`Description::volume_name`]
    VolumeName,
    /// [`Description::media_whole`]
    MediaWhole,
    /// [`Description::media_path`]
    MediaPath,
}

/// The description fields the engine consumes.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Description {
    /// Mount point URL of the volume, when mounted.
    pub volume_path: Option<String>,
    /// Whether the volume can be mounted at all.
    pub volume_mountable: Option<bool>,
    /// The volume's name.
    pub volume_name: Option<String>,
    /// Whether this disk is the whole media (and therefore ejectable).
    pub media_whole: Option<bool>,
    /// Registry path of the backing media; absent once the media is gone.
    pub media_path: Option<String>,
}

/// A disk tracked by the daemon.
#[derive(Debug)]
pub struct Disk {
    id: String,
    unit: UnitRef,
    filesystem: Filesystem,
    device_path: Option<String>,
    description: RefCell<Description>,
    state: Cell<DiskState>,
    claim: RefCell<Option<CallbackRef>>,
    bypath: RefCell<Option<String>>,
}

impl Disk {
    /// Register a disk with its backing unit, filesystem and description.
    ///
    /// `device_path` is the raw device node opened for the eject ioctl,
    /// absent for purely synthetic disks.
    pub fn new(
        id: impl Into<String>,
        unit: &UnitRef,
        filesystem: Filesystem,
        device_path: Option<&str>,
        description: Description,
    ) -> DiskRef {
        Rc::new(Disk {
            id: id.into(),
            unit: unit.clone(),
            filesystem,
            device_path: device_path.map(str::to_string),
            description: RefCell::new(description),
            state: Cell::new(DiskState::empty()),
            claim: RefCell::new(None),
            bypath: RefCell::new(None),
        })
    }

    /// The stable identifier, e.g. the BSD name.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The hardware unit beneath this disk.
    pub fn unit(&self) -> &UnitRef {
        &self.unit
    }

    /// The filesystem backing this disk's volume.
    pub fn filesystem(&self) -> &Filesystem {
        &self.filesystem
    }

    /// The raw device node path, if the disk has one.
    pub fn device_path(&self) -> Option<String> {
        self.device_path.clone()
    }

    /// A snapshot of the description.
    pub fn description(&self) -> Description {
        self.description.borrow().clone()
    }

    /// The volume's mount point URL, when mounted.
    pub fn volume_path(&self) -> Option<String> {
        self.description.borrow().volume_path.clone()
    }

    /// Whether the volume can be mounted.
    pub fn volume_mountable(&self) -> Option<bool> {
        self.description.borrow().volume_mountable
    }

    /// The volume's name.
    pub fn volume_name(&self) -> Option<String> {
        self.description.borrow().volume_name.clone()
    }

    /// Whether this disk is the whole media.
    pub fn media_whole(&self) -> Option<bool> {
        self.description.borrow().media_whole
    }

    /// Registry path of the backing media.
    pub fn media_path(&self) -> Option<String> {
        self.description.borrow().media_path.clone()
    }

    /// Update the mount point URL in the description.
    pub fn set_volume_path(&self, volume_path: Option<String>) {
        self.description.borrow_mut().volume_path = volume_path;
    }

    /// Update the volume name in the description.
    pub fn set_volume_name(&self, volume_name: Option<String>) {
        self.description.borrow_mut().volume_name = volume_name;
    }

    /// Whether all of `flags` are set.
    pub fn state(&self, flags: DiskState) -> bool {
        self.state.get().contains(flags)
    }

    /// Set or clear `flags`.
    pub fn set_state(&self, flags: DiskState, value: bool) {
        let mut state = self.state.get();
        state.set(flags, value);
        self.state.set(state);
    }

    /// The claim-release callback of the owning session, if claimed.
    pub fn claim(&self) -> Option<CallbackRef> {
        self.claim.borrow().clone()
    }

    /// Install or clear the claim.
    pub fn set_claim(&self, claim: Option<CallbackRef>) {
        *self.claim.borrow_mut() = claim;
    }

    /// The mount point registered for by-path lookups.
    pub fn bypath(&self) -> Option<String> {
        self.bypath.borrow().clone()
    }

    /// Register or clear the by-path mount point.
    pub fn set_bypath(&self, bypath: Option<String>) {
        *self.bypath.borrow_mut() = bypath;
    }
}
