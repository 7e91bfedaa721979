//! The request record.
//!
//! A request captures one disk-level operation a client asked for, along
//! with the staging bits, the recorded dissent and the optional link group
//! the engine maintains while driving it through its stages.

use std::cell::Cell;
use std::cell::RefCell;
use std::rc::Rc;

use num_enum::IntoPrimitive;
use num_enum::TryFromPrimitive;
#[cfg(feature = "serializable")]
use serde::Deserialize;
#[cfg(feature = "serializable")]
use serde::Serialize;
use smallvec::SmallVec;

use crate::CallbackRef;
use crate::DiskRef;
use crate::Dissenter;
use crate::RequestState;
use crate::UnmountOptions;

/// Shared handle to a [`Request`].
pub type RequestRef = Rc<Request>;

/// An ordered batch of sibling requests completed as one.
pub type RequestLink = SmallVec<[RequestRef; 2]>;

/// The operation a request asks for.
///
/// Converts to and from its wire integer so an IPC layer can decode the
/// kind it receives before building the typed [`Arguments`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
#[repr(u32)]
pub enum RequestKind {
    /// Take advisory exclusive ownership of a disk.
    Claim,
    /// Eject the media beneath a disk.
    Eject,
    /// Mount a disk's volume.
    Mount,
    /// Re-read a disk's on-disk state.
    Refresh,
    /// Rename a disk's volume.
    Rename,
    /// Unmount a disk's volume.
    Unmount,
}

/// Kind-specific request arguments.
///
/// The variant determines the request kind, so a request can never carry
/// arguments that do not fit its operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Arguments {
    /// Claim: the claim-release callback the requesting session registers.
    Claim {
        /// Client-side address of the release callback.
        address: u64,
        /// Client-side context word of the release callback.
        context: u64,
    },
    /// Eject: no arguments.
    Eject,
    /// Mount: optional mount point and mount argument string.
    Mount {
        /// Mount point URL, or `None` to let the mounter pick one.
        mountpoint: Option<String>,
        /// Comma-separated mount argument tokens.
        arguments: Option<String>,
    },
    /// Refresh: no arguments.
    Refresh,
    /// Rename: the new volume name.
    Rename {
        /// The new name; a missing name is unsupported.
        name: Option<String>,
    },
    /// Unmount: option bits.
    Unmount {
        /// The unmount options.
        options: UnmountOptions,
    },
}

impl Arguments {
    /// The request kind these arguments belong to.
    pub fn kind(&self) -> RequestKind {
        match self {
            Arguments::Claim { .. } => RequestKind::Claim,
            Arguments::Eject => RequestKind::Eject,
            Arguments::Mount { .. } => RequestKind::Mount,
            Arguments::Refresh => RequestKind::Refresh,
            Arguments::Rename { .. } => RequestKind::Rename,
            Arguments::Unmount { .. } => RequestKind::Unmount,
        }
    }
}

/// One in-flight disk operation.
#[derive(Debug)]
pub struct Request {
    disk: DiskRef,
    arguments: Arguments,
    user_uid: u32,
    user_gid: u32,
    callback: RefCell<Option<CallbackRef>>,
    state: Cell<RequestState>,
    dissenter: RefCell<Option<Dissenter>>,
    link: RefCell<Option<RequestLink>>,
}

impl Request {
    /// Create a request against `disk` on behalf of the given user.
    ///
    /// `callback` is the client destination the completion is delivered
    /// to; a request without one completes silently.
    pub fn new(
        disk: &DiskRef,
        arguments: Arguments,
        user_uid: u32,
        user_gid: u32,
        callback: Option<CallbackRef>,
    ) -> RequestRef {
        Rc::new(Request {
            disk: disk.clone(),
            arguments,
            user_uid,
            user_gid,
            callback: RefCell::new(callback),
            state: Cell::new(RequestState::empty()),
            dissenter: RefCell::new(None),
            link: RefCell::new(None),
        })
    }

    /// The operation this request asks for.
    pub fn kind(&self) -> RequestKind {
        self.arguments.kind()
    }

    /// The target disk.
    pub fn disk(&self) -> DiskRef {
        self.disk.clone()
    }

    /// The kind-specific arguments.
    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// UID of the requesting user.
    pub fn user_uid(&self) -> u32 {
        self.user_uid
    }

    /// GID of the requesting user.
    pub fn user_gid(&self) -> u32 {
        self.user_gid
    }

    /// The client completion destination.
    pub fn callback(&self) -> Option<CallbackRef> {
        self.callback.borrow().clone()
    }

    /// Replace the client completion destination.
    pub fn set_callback(&self, callback: Option<CallbackRef>) {
        *self.callback.borrow_mut() = callback;
    }

    /// Whether all of `flags` are set.
    pub fn state(&self, flags: RequestState) -> bool {
        self.state.get().contains(flags)
    }

    /// Set or clear `flags`.
    pub fn set_state(&self, flags: RequestState, value: bool) {
        let mut state = self.state.get();
        state.set(flags, value);
        self.state.set(state);
    }

    /// All staging bits at once.
    pub fn state_bits(&self) -> RequestState {
        self.state.get()
    }

    /// The recorded dissent, if any.
    pub fn dissenter(&self) -> Option<Dissenter> {
        self.dissenter.borrow().clone()
    }

    /// Record or clear the dissent.
    pub fn set_dissenter(&self, dissenter: Option<Dissenter>) {
        *self.dissenter.borrow_mut() = dissenter;
    }

    /// The link group, if this request leads one.
    pub fn link(&self) -> Option<RequestLink> {
        self.link.borrow().clone()
    }

    /// Attach or detach a link group.
    pub fn set_link(&self, link: Option<RequestLink>) {
        *self.link.borrow_mut() = link;
    }
}
