//! Shared mock environment and helpers for the lifecycle tests.

#![allow(dead_code)]

use std::cell::Cell;
use std::cell::RefCell;
use std::fs::File;
use std::rc::Rc;

use diskarbiter::ApprovalReply;
use diskarbiter::AuthorizeOptions;
use diskarbiter::AuthorizeReply;
use diskarbiter::Callback;
use diskarbiter::CallbackRef;
use diskarbiter::Description;
use diskarbiter::DescriptionKey;
use diskarbiter::Disk;
use diskarbiter::DiskRef;
use diskarbiter::DiskState;
use diskarbiter::Dissenter;
use diskarbiter::Engine;
use diskarbiter::Environment;
use diskarbiter::Errno;
use diskarbiter::Filesystem;
use diskarbiter::MountPointAction;
use diskarbiter::MountReply;
use diskarbiter::RenameReply;
use diskarbiter::RequestRef;
use diskarbiter::Right;
use diskarbiter::SessionRef;
use diskarbiter::Status;
use diskarbiter::UnitRef;
use diskarbiter::UnmountReply;

/// Mount point the mock mounter falls back to when the request names none
/// and the disk is not already mounted.
pub const DEFAULT_MOUNT_POINT: &str = "file://localhost/Volumes/Untitled";

/// Everything the engine asked of the environment, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    ClaimRelease { disk: String, owner_address: u64 },
    EjectApproval { disk: String },
    MountApproval { disk: String },
    UnmountApproval { disk: String },
    Authorize { disk: String, uid: u32, right: Right },
    Mount { disk: String, mountpoint: Option<String>, arguments: Option<String> },
    Unmount { mountpoint: String, arguments: Option<String> },
    Rename { mountpoint: String, name: String },
    Refresh { disk: String },
    DeviceOpen { path: String },
    DeviceEject,
    CreateMountPoint { disk: String, action: MountPointAction },
    RemoveMountPoint { mountpoint: String },
    DescriptionChanged { disk: String, keys: Vec<DescriptionKey> },
    Disappeared { disk: String },
    DiskLog { disk: String },
    Delivered { disk: String, dissenter: Option<Dissenter> },
}

/// A reply handle the mock held on to instead of answering inline.
pub enum Deferred {
    Approval(ApprovalReply),
    Authorize(AuthorizeReply),
    Mount(MountReply, String),
    Unmount(UnmountReply),
    Rename(RenameReply),
}

/// Scripted environment: responses are configured up front, every hook
/// invocation is recorded, and replies are answered inline unless the
/// matching `defer_*` switch is on, in which case they park in `deferred`
/// until [`TestEnv::flush`].
pub struct TestEnv {
    pub events: RefCell<Vec<Event>>,
    pub approval_response: RefCell<Option<Dissenter>>,
    pub authorize_status: Cell<Status>,
    pub mount_result: RefCell<Option<Result<String, Errno>>>,
    pub unmount_error: Cell<Option<Errno>>,
    pub rename_error: Cell<Option<Errno>>,
    pub refresh_status: Cell<Status>,
    pub eject_error: Cell<Option<Errno>>,
    pub created_mount_point: RefCell<Option<String>>,
    pub defer_approvals: Cell<bool>,
    pub defer_helpers: Cell<bool>,
    pub deferred: RefCell<Vec<Deferred>>,
}

impl TestEnv {
    pub fn new() -> Rc<TestEnv> {
        Rc::new(TestEnv {
            events: RefCell::new(Vec::new()),
            approval_response: RefCell::new(None),
            authorize_status: Cell::new(Status::SUCCESS),
            mount_result: RefCell::new(None),
            unmount_error: Cell::new(None),
            rename_error: Cell::new(None),
            refresh_status: Cell::new(Status::SUCCESS),
            eject_error: Cell::new(None),
            created_mount_point: RefCell::new(None),
            defer_approvals: Cell::new(false),
            defer_helpers: Cell::new(false),
            deferred: RefCell::new(Vec::new()),
        })
    }

    fn record(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    fn answer_approval(&self, reply: ApprovalReply) {
        if self.defer_approvals.get() {
            self.deferred.borrow_mut().push(Deferred::Approval(reply));
        } else {
            reply.respond(self.approval_response.borrow_mut().take());
        }
    }

    /// Answer every parked reply with the currently scripted responses.
    pub fn flush(&self) {
        let parked: Vec<Deferred> = self.deferred.borrow_mut().drain(..).collect();
        for deferred in parked {
            match deferred {
                Deferred::Approval(reply) => {
                    reply.respond(self.approval_response.borrow_mut().take());
                }
                Deferred::Authorize(reply) => reply.respond(self.authorize_status.get()),
                Deferred::Mount(reply, fallback) => {
                    match self.mount_result.borrow_mut().take() {
                        Some(Ok(mountpoint)) => reply.ok(mountpoint),
                        Some(Err(errno)) => reply.error(errno),
                        None => reply.ok(fallback),
                    }
                }
                Deferred::Unmount(reply) => match self.unmount_error.take() {
                    Some(errno) => reply.error(errno),
                    None => reply.ok(),
                },
                Deferred::Rename(reply) => match self.rename_error.take() {
                    Some(errno) => reply.error(errno),
                    None => reply.ok(),
                },
            }
        }
    }

    /// The completions delivered so far, in order.
    pub fn delivered(&self) -> Vec<Option<Dissenter>> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Event::Delivered { dissenter, .. } => Some(dissenter.clone()),
                _ => None,
            })
            .collect()
    }

    /// How many recorded events satisfy `predicate`.
    pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.events.borrow().iter().filter(|event| predicate(event)).count()
    }
}

impl Environment for TestEnv {
    fn claim_release(&self, disk: &DiskRef, owner: &CallbackRef, reply: ApprovalReply) {
        self.record(Event::ClaimRelease {
            disk: disk.id().into(),
            owner_address: owner.address(),
        });
        self.answer_approval(reply);
    }

    fn eject_approval(&self, disk: &DiskRef, reply: ApprovalReply) {
        self.record(Event::EjectApproval { disk: disk.id().into() });
        self.answer_approval(reply);
    }

    fn mount_approval(&self, disk: &DiskRef, reply: ApprovalReply) {
        self.record(Event::MountApproval { disk: disk.id().into() });
        self.answer_approval(reply);
    }

    fn unmount_approval(&self, disk: &DiskRef, reply: ApprovalReply) {
        self.record(Event::UnmountApproval { disk: disk.id().into() });
        self.answer_approval(reply);
    }

    fn authorize(
        &self,
        disk: &DiskRef,
        user_uid: u32,
        _user_gid: u32,
        right: Right,
        _options: AuthorizeOptions,
        reply: AuthorizeReply,
    ) {
        self.record(Event::Authorize {
            disk: disk.id().into(),
            uid: user_uid,
            right,
        });
        if self.defer_approvals.get() {
            self.deferred.borrow_mut().push(Deferred::Authorize(reply));
        } else {
            reply.respond(self.authorize_status.get());
        }
    }

    fn mount(
        &self,
        disk: &DiskRef,
        mountpoint: Option<&str>,
        arguments: Option<&str>,
        reply: MountReply,
    ) {
        self.record(Event::Mount {
            disk: disk.id().into(),
            mountpoint: mountpoint.map(str::to_string),
            arguments: arguments.map(str::to_string),
        });
        let fallback = mountpoint
            .map(str::to_string)
            .or_else(|| disk.volume_path())
            .unwrap_or_else(|| DEFAULT_MOUNT_POINT.to_string());
        if self.defer_helpers.get() {
            self.deferred.borrow_mut().push(Deferred::Mount(reply, fallback));
        } else {
            match self.mount_result.borrow_mut().take() {
                Some(Ok(mountpoint)) => reply.ok(mountpoint),
                Some(Err(errno)) => reply.error(errno),
                None => reply.ok(fallback),
            }
        }
    }

    fn unmount(
        &self,
        _filesystem: &Filesystem,
        mountpoint: &str,
        arguments: Option<&str>,
        reply: UnmountReply,
    ) {
        self.record(Event::Unmount {
            mountpoint: mountpoint.into(),
            arguments: arguments.map(str::to_string),
        });
        if self.defer_helpers.get() {
            self.deferred.borrow_mut().push(Deferred::Unmount(reply));
        } else {
            match self.unmount_error.take() {
                Some(errno) => reply.error(errno),
                None => reply.ok(),
            }
        }
    }

    fn rename(&self, _filesystem: &Filesystem, mountpoint: &str, name: &str, reply: RenameReply) {
        self.record(Event::Rename {
            mountpoint: mountpoint.into(),
            name: name.into(),
        });
        if self.defer_helpers.get() {
            self.deferred.borrow_mut().push(Deferred::Rename(reply));
        } else {
            match self.rename_error.take() {
                Some(errno) => reply.error(errno),
                None => reply.ok(),
            }
        }
    }

    fn refresh(&self, disk: &DiskRef) -> Status {
        self.record(Event::Refresh { disk: disk.id().into() });
        self.refresh_status.get()
    }

    fn device_open(&self, path: &str) -> Result<File, Errno> {
        self.record(Event::DeviceOpen { path: path.into() });
        File::open("/dev/null").map_err(|_| Errno::EIO)
    }

    fn device_eject(&self, _device: &File) -> Result<(), Errno> {
        self.record(Event::DeviceEject);
        match self.eject_error.take() {
            Some(errno) => Err(errno),
            None => Ok(()),
        }
    }

    fn create_mount_point(&self, disk: &DiskRef, action: MountPointAction) -> Option<String> {
        self.record(Event::CreateMountPoint {
            disk: disk.id().into(),
            action,
        });
        self.created_mount_point.borrow().clone()
    }

    fn remove_mount_point(&self, mountpoint: &str) {
        self.record(Event::RemoveMountPoint {
            mountpoint: mountpoint.into(),
        });
    }

    fn description_changed(&self, disk: &DiskRef, keys: &[DescriptionKey]) {
        self.record(Event::DescriptionChanged {
            disk: disk.id().into(),
            keys: keys.to_vec(),
        });
    }

    fn disappeared(&self, disk: &DiskRef) {
        self.record(Event::Disappeared { disk: disk.id().into() });
    }

    fn disk_log(&self, disk: &DiskRef) {
        self.record(Event::DiskLog { disk: disk.id().into() });
    }

    fn deliver(&self, _callback: &CallbackRef, disk: &DiskRef, dissenter: Option<&Dissenter>) {
        self.record(Event::Delivered {
            disk: disk.id().into(),
            dissenter: dissenter.cloned(),
        });
    }
}

/// An engine wired to the mock, with the disk table empty.
pub fn engine(env: &Rc<TestEnv>) -> Engine {
    let _ = env_logger::builder().is_test(true).try_init();
    Engine::new(env.clone())
}

/// A disk that has completed arrival processing.
pub fn appeared_disk(unit: &UnitRef, id: &str, description: Description) -> DiskRef {
    let disk = Disk::new(id, unit, Filesystem::new("hfs"), Some("/dev/null"), description);
    disk.set_state(DiskState::STAGED_APPEAR, true);
    disk
}

/// Description of a healthy mounted volume.
pub fn mounted_description(mountpoint: &str) -> Description {
    Description {
        volume_path: Some(mountpoint.into()),
        volume_mountable: Some(true),
        volume_name: Some("Untitled".into()),
        media_whole: Some(true),
        media_path: Some("IOService:/usb/media".into()),
    }
}

/// Description of a healthy volume that is not mounted yet.
pub fn unmounted_description() -> Description {
    Description {
        volume_path: None,
        volume_mountable: Some(true),
        volume_name: Some("Untitled".into()),
        media_whole: Some(true),
        media_path: Some("IOService:/usb/media".into()),
    }
}

/// A client completion callback into `session`.
pub fn client(session: &SessionRef) -> CallbackRef {
    Callback::new(session, 0x4000, 0)
}

/// Re-dispatch `request` until it reports terminal, asserting the staging
/// bits only ever grow. Panics when the request fails to settle, which in
/// these tests means the pipeline wedged.
pub fn pump(engine: &Engine, request: &RequestRef) -> usize {
    let mut previous = request.state_bits();
    for round in 0..32 {
        let done = engine.dispatch(request);
        let state = request.state_bits();
        assert!(
            state.contains(previous),
            "staging bits went backwards: {previous:?} -> {state:?}"
        );
        previous = state;
        if done {
            return round + 1;
        }
    }
    panic!("request did not settle");
}
