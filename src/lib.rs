//! Request arbitration engine for removable-media daemons.
//!
//! A daemon mediating access to removable and mountable block devices
//! cannot execute a client's claim, eject, mount, refresh, rename or
//! unmount immediately: each must pass through approval (veto by
//! interested observers), authorization (privilege check) and finally
//! execution against kernel and filesystem primitives, while many such
//! requests are in flight against the same or different disks. This crate
//! implements that arbitration core — the staged, resumable state machine
//! per request, the per-disk and per-unit exclusion, the sentinel-aware
//! dissent policy and the linked request groups — and leaves the data
//! plane (observers, authorization, mount helpers, IPC) behind the
//! [`Environment`] trait.
//!
//! The engine assumes a cooperative single-threaded scheduler: all engine
//! state is `!Send`, and asynchronous collaborators post their results
//! back onto the scheduler thread through the reply handles, waking the
//! scheduler via [`StageSignal`].

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub use nix::errno::Errno;

pub use crate::callback::Callback;
pub use crate::callback::CallbackRef;
pub use crate::callback::Session;
pub use crate::callback::SessionRef;
pub use crate::disk::Description;
pub use crate::disk::DescriptionKey;
pub use crate::disk::Disk;
pub use crate::disk::DiskRef;
pub use crate::disk::Filesystem;
pub use crate::dissenter::Dissenter;
pub use crate::engine::Engine;
pub use crate::environment::Environment;
pub use crate::environment::MountPointAction;
pub use crate::environment::Right;
pub use crate::flags::authorize_options::AuthorizeOptions;
pub use crate::flags::disk_state::DiskState;
pub use crate::flags::request_state::RequestState;
pub use crate::flags::unit_state::UnitState;
pub use crate::flags::unmount_options::UnmountOptions;
pub use crate::mount_options::MOUNT_ARGUMENT_UPDATE;
pub use crate::mount_options::ROOT_MOUNT_POINT;
pub use crate::mount_options::UNMOUNT_ARGUMENT_FORCE;
pub use crate::mount_options::contains_argument;
pub use crate::reply::ApprovalReply;
pub use crate::reply::AuthorizeReply;
pub use crate::reply::MountReply;
pub use crate::reply::RenameReply;
pub use crate::reply::UnmountReply;
pub use crate::request::Arguments;
pub use crate::request::Request;
pub use crate::request::RequestKind;
pub use crate::request::RequestLink;
pub use crate::request::RequestRef;
pub use crate::signal::StageSignal;
pub use crate::status::ApprovalSignal;
pub use crate::status::Status;
pub use crate::unit::Unit;
pub use crate::unit::UnitRef;

mod callback;
mod device;
mod disk;
mod dissenter;
mod engine;
mod environment;
mod flags;
mod mount_options;
mod reply;
mod request;
mod signal;
mod status;
mod unit;
