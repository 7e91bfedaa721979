//! The request lifecycle engine.
//!
//! One entry point, [`Engine::dispatch`], advances a request by one stage.
//! Each kind handler is re-entrant: guarded by the request's staging bits,
//! it resumes at the first stage that has not run yet, so the surrounding
//! scheduler simply re-dispatches every pending request whenever the stage
//! signal is raised. A handler either completes a stage synchronously and
//! falls through, or arms a reply handle and yields.
//!
//! Exclusion is two-level: a disk advances at most one request at a time
//! (`DiskState::COMMAND_ACTIVE`), and at most one device-altering execute
//! stage runs per hardware unit (`UnitState::COMMAND_ACTIVE`).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use log::debug;
use log::warn;

use crate::ApprovalSignal;
use crate::Arguments;
use crate::AuthorizeOptions;
use crate::Callback;
use crate::DiskRef;
use crate::DiskState;
use crate::Dissenter;
use crate::Environment;
use crate::Errno;
use crate::MOUNT_ARGUMENT_UPDATE;
use crate::RequestKind;
use crate::RequestRef;
use crate::RequestState;
use crate::Right;
use crate::StageSignal;
use crate::Status;
use crate::UNMOUNT_ARGUMENT_FORCE;
use crate::UnitState;
use crate::UnmountOptions;
use crate::contains_argument;
use crate::reply::ApprovalReply;
use crate::reply::AuthorizeReply;
use crate::reply::MountReply;
use crate::reply::RenameReply;
use crate::reply::UnmountReply;

struct Shared {
    environment: Rc<dyn Environment>,
    signal: StageSignal,
    disks: RefCell<Vec<DiskRef>>,
}

/// The arbitration engine: the disk table, the collaborator environment
/// and the stage signal, behind a cheaply clonable handle.
#[derive(Clone)]
pub struct Engine {
    shared: Rc<Shared>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("disks", &self.shared.disks.borrow().len())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create an engine talking to the given environment.
    pub fn new(environment: Rc<dyn Environment>) -> Engine {
        Engine {
            shared: Rc::new(Shared {
                environment,
                signal: StageSignal::new(),
                disks: RefCell::new(Vec::new()),
            }),
        }
    }

    /// The collaborator environment.
    pub fn environment(&self) -> &Rc<dyn Environment> {
        &self.shared.environment
    }

    /// The signal the engine raises to wake the dispatcher loop.
    pub fn signal(&self) -> &StageSignal {
        &self.shared.signal
    }

    /// Add a disk to the disk table.
    pub fn add_disk(&self, disk: &DiskRef) {
        self.shared.disks.borrow_mut().push(disk.clone());
    }

    /// Remove a disk from the disk table.
    pub fn remove_disk(&self, disk: &DiskRef) {
        self.shared
            .disks
            .borrow_mut()
            .retain(|entry| !Rc::ptr_eq(entry, disk));
    }

    /// A snapshot of the disk table.
    pub fn disks(&self) -> Vec<DiskRef> {
        self.shared.disks.borrow().clone()
    }

    /// Advance `request` by one stage.
    ///
    /// Returns `true` once the request has been dispatched to completion —
    /// either delivered already, or handed to a helper whose completion
    /// callback will deliver it — and the scheduler may drop it from its
    /// pending list. Returns `false` while the request is still pending:
    /// gated out, yielded awaiting a probe, or suspended on a reply.
    pub fn dispatch(&self, request: &RequestRef) -> bool {
        let disk = request.disk();

        if disk.state(DiskState::COMMAND_ACTIVE) {
            return false;
        }
        if !disk.state(DiskState::STAGED_APPEAR) {
            return false;
        }

        match request.kind() {
            RequestKind::Claim => self.claim(request),
            RequestKind::Eject => self.eject(request),
            RequestKind::Mount => self.mount(request),
            RequestKind::Refresh => self.refresh(request),
            RequestKind::Rename => self.rename(request),
            RequestKind::Unmount => self.unmount(request),
        }
    }

    /// Deliver `status` to the request's client callback, honoring link
    /// groups. A non-success status is wrapped in a fresh dissenter.
    pub fn dispatch_completion(&self, request: &RequestRef, status: Status) {
        if status.is_success() {
            self.complete(request, None);
        } else {
            self.complete(request, Some(&Dissenter::new(status)));
        }
    }

    /// Invoke the client callback with the reported outcome. A linked
    /// request reports its own dissenter if it has one, else the first
    /// dissenter found among its linked siblings, in order.
    fn complete(&self, request: &RequestRef, dissenter: Option<&Dissenter>) {
        let Some(callback) = request.callback() else {
            return;
        };
        let disk = request.disk();

        let mut reported = dissenter.cloned();
        if let Some(link) = request.link() {
            reported = request.dissenter();
            if reported.is_none() {
                for subrequest in &link {
                    reported = subrequest.dissenter();
                    if reported.is_some() {
                        break;
                    }
                }
            }
        }

        self.shared
            .environment
            .deliver(&callback, &disk, reported.as_ref());
    }

    fn claim(&self, request: &RequestRef) -> bool {
        let disk = request.disk();

        // Commence the claim release.
        if !request.state(RequestState::STAGED_APPROVE) {
            let owner = disk.claim();

            disk.set_state(DiskState::COMMAND_ACTIVE, true);
            request.set_state(RequestState::STAGED_APPROVE, true);

            let reply = ApprovalReply::new(self.clone(), request.clone());
            match owner {
                Some(callback) if callback.address() != 0 => {
                    self.shared.environment.claim_release(&disk, &callback, reply);
                }
                Some(_) => {
                    // The owning session is gone; nobody can release.
                    reply.respond(Some(Dissenter::new(Status::NOT_PERMITTED)));
                }
                None => reply.respond(None),
            }

            return false;
        }

        if let Some(dissenter) = request.dissenter() {
            self.complete(request, Some(&dissenter));
            self.shared.signal.raise();
            return true;
        }

        // Commence the claim.
        disk.set_state(DiskState::COMMAND_ACTIVE, true);
        disk.set_claim(None);

        if let Some(callback) = request.callback() {
            if let Some(session) = callback.session() {
                if let Arguments::Claim { address, context } = request.arguments() {
                    disk.set_claim(Some(Callback::new(&session, *address, *context)));
                }
            }
        }

        debug!("  claimed disk, id = {}, success.", disk.id());
        self.dispatch_completion(request, Status::SUCCESS);
        disk.set_state(DiskState::COMMAND_ACTIVE, false);
        self.shared.signal.raise();
        true
    }

    fn eject(&self, request: &RequestRef) -> bool {
        let disk = request.disk();

        // Commence the eject approval.
        if !request.state(RequestState::STAGED_APPROVE) {
            let mut status = Status::SUCCESS;

            // Only whole media can be ejected.
            if disk.media_whole() != Some(true) {
                status = Status::UNSUPPORTED;
            }

            if !status.is_success() {
                self.dispatch_completion(request, status);
                self.shared.signal.raise();
                return true;
            }

            disk.set_state(DiskState::COMMAND_ACTIVE, true);
            request.set_state(RequestState::STAGED_APPROVE, true);
            self.shared
                .environment
                .eject_approval(&disk, ApprovalReply::new(self.clone(), request.clone()));
            return false;
        }

        // Commence the eject authorization.
        if !request.state(RequestState::STAGED_AUTHORIZE) {
            let mut status = Status::SUCCESS;

            if let Some(dissenter) = request.dissenter() {
                if ApprovalSignal::from_status(dissenter.status())
                    == Some(ApprovalSignal::RequireAuthorization)
                {
                    request.set_dissenter(None);
                    status = Status::NOT_PRIVILEGED;
                }
            }

            request.set_state(RequestState::STAGED_AUTHORIZE, true);

            if !status.is_success() {
                disk.set_state(DiskState::COMMAND_ACTIVE, true);
                self.shared.environment.authorize(
                    &disk,
                    request.user_uid(),
                    request.user_gid(),
                    Right::Unmount,
                    AuthorizeOptions::FORCE | AuthorizeOptions::INTERACT,
                    AuthorizeReply::new(self.clone(), request.clone()),
                );
                return false;
            }
        }

        if let Some(dissenter) = request.dissenter() {
            self.complete(request, Some(&dissenter));
            self.shared.signal.raise();
            return true;
        }

        // Commence the eject.
        let unit = disk.unit().clone();
        if unit.state(UnitState::COMMAND_ACTIVE) {
            return false;
        }

        disk.set_state(DiskState::COMMAND_ACTIVE, true);
        unit.set_state(UnitState::COMMAND_ACTIVE, true);
        debug!("  ejected disk, id = {}, ongoing.", disk.id());

        let status = match disk.device_path() {
            None => Status::from_errno(Errno::ENOENT),
            Some(path) => match self.shared.environment.device_open(&path) {
                Err(errno) => Status::from_errno(errno),
                Ok(device) => {
                    let mut status = Status::SUCCESS;
                    if !unit.state(UnitState::EJECTED) {
                        // A driver with no eject op is fine: the unmount
                        // that preceded us already did all there is to do.
                        status = match self.shared.environment.device_eject(&device) {
                            Ok(()) | Err(Errno::ENOTTY) => Status::SUCCESS,
                            Err(errno) => Status::from_errno(errno),
                        };
                        if status.is_success() {
                            unit.set_state(UnitState::EJECTED, true);
                        }
                    }
                    status
                }
            },
        };

        if status.is_success() {
            debug!("  ejected disk, id = {}, success.", disk.id());
        } else {
            debug!("  ejected disk, id = {}, failure.", disk.id());
            warn!("unable to eject {} (status code {status}).", disk.id());
        }

        self.dispatch_completion(request, status);
        unit.set_state(UnitState::COMMAND_ACTIVE, false);
        disk.set_state(DiskState::COMMAND_ACTIVE, false);
        self.shared.signal.raise();
        true
    }

    fn mount(&self, request: &RequestRef) -> bool {
        let disk = request.disk();
        let unit = disk.unit().clone();

        // Any mount attempt revokes the unit's ejected latch, even one
        // that goes on to fail its probe.
        unit.set_state(UnitState::EJECTED, false);

        if request.link().is_some() && unit.state(UnitState::COMMAND_ACTIVE) {
            return false;
        }

        // Commence the probe.
        if !request.state(RequestState::STAGED_PROBE) {
            if disk.volume_path().is_none() {
                request.set_state(RequestState::STAGED_PROBE, true);
                disk.set_state(DiskState::STAGED_PROBE, false);
                self.shared.signal.raise();
                return false;
            }
        } else if !disk.state(DiskState::STAGED_PROBE) {
            return false;
        }

        // Commence the mount approval.
        if !request.state(RequestState::STAGED_APPROVE) {
            let mut status = Status::SUCCESS;

            if disk.volume_mountable() == Some(false) {
                status = Status::UNSUPPORTED;
            }

            // A mounted volume may only be mounted again as an update.
            if disk.volume_path().is_some() {
                match request.arguments() {
                    Arguments::Mount {
                        arguments: Some(arguments),
                        ..
                    } => {
                        if !contains_argument(arguments, "-u")
                            && !contains_argument(arguments, MOUNT_ARGUMENT_UPDATE)
                        {
                            status = Status::BUSY;
                        }
                    }
                    _ => status = Status::BUSY,
                }
            }

            if disk.state(DiskState::REQUIRE_REPAIR) {
                request.set_dissenter(Some(Dissenter::new(Status::NOT_READY)));
                status = Status::NOT_READY;
            }

            if !status.is_success() {
                self.dispatch_completion(request, status);
                self.shared.signal.raise();
                return true;
            }

            disk.set_state(DiskState::COMMAND_ACTIVE, true);
            request.set_state(RequestState::STAGED_APPROVE, true);
            self.shared
                .environment
                .mount_approval(&disk, ApprovalReply::new(self.clone(), request.clone()));
            return false;
        }

        // Commence the mount authorization.
        if !request.state(RequestState::STAGED_AUTHORIZE) {
            let mut status = Status::SUCCESS;

            if let Some(dissenter) = request.dissenter() {
                match ApprovalSignal::from_status(dissenter.status()) {
                    Some(ApprovalSignal::RequireAuthorization) => {
                        request.set_dissenter(None);
                        status = Status::NOT_PRIVILEGED;
                    }
                    Some(ApprovalSignal::MountReadOnlyRequireAuthorization) => {
                        status = Status::NOT_PRIVILEGED;
                    }
                    _ => {}
                }
            }

            request.set_state(RequestState::STAGED_AUTHORIZE, true);

            if !status.is_success() {
                disk.set_state(DiskState::COMMAND_ACTIVE, true);
                self.shared.environment.authorize(
                    &disk,
                    request.user_uid(),
                    request.user_gid(),
                    Right::Mount,
                    AuthorizeOptions::FORCE | AuthorizeOptions::INTERACT,
                    AuthorizeReply::new(self.clone(), request.clone()),
                );
                return false;
            }
        }

        // Apply the read-only preference the observers asked for.
        if let Some(dissenter) = request.dissenter() {
            match ApprovalSignal::from_status(dissenter.status()) {
                Some(ApprovalSignal::MountReadOnly)
                | Some(ApprovalSignal::MountReadOnlyRequireAuthorization) => {
                    disk.set_state(DiskState::MOUNT_PREFERENCE_NO_WRITE, true);
                    request.set_dissenter(None);
                }
                _ => {}
            }
        }

        if let Some(dissenter) = request.dissenter() {
            self.complete(request, Some(&dissenter));
            self.shared.signal.raise();
            return true;
        }

        // Commence the mount.
        if unit.state(UnitState::COMMAND_ACTIVE) {
            return false;
        }

        let (mountpoint, arguments) = match request.arguments() {
            Arguments::Mount {
                mountpoint,
                arguments,
            } => (mountpoint.clone(), arguments.clone()),
            _ => (None, None),
        };

        disk.set_state(DiskState::COMMAND_ACTIVE, true);
        unit.set_state(UnitState::COMMAND_ACTIVE, true);
        debug!("  mounted disk, id = {}, ongoing.", disk.id());

        self.shared.environment.mount(
            &disk,
            mountpoint.as_deref(),
            arguments.as_deref(),
            MountReply::new(self.clone(), request.clone()),
        );
        true
    }

    fn refresh(&self, request: &RequestRef) -> bool {
        let disk = request.disk();

        // Commence the refresh.
        let mut status = Status::SUCCESS;

        if disk.volume_mountable() == Some(false) {
            status = Status::UNSUPPORTED;
        }

        if !status.is_success() {
            self.dispatch_completion(request, status);
            self.shared.signal.raise();
            return true;
        }

        disk.set_state(DiskState::COMMAND_ACTIVE, true);

        let status = if self.shared.environment.refresh(&disk).is_success() {
            Status::SUCCESS
        } else {
            Status::from_errno(Errno::ENOTSUP)
        };

        self.dispatch_completion(request, status);
        disk.set_state(DiskState::COMMAND_ACTIVE, false);
        self.shared.signal.raise();
        true
    }

    fn rename(&self, request: &RequestRef) -> bool {
        let disk = request.disk();
        let unit = disk.unit().clone();

        // Commence the rename.
        if unit.state(UnitState::COMMAND_ACTIVE) {
            return false;
        }

        let mountpoint = disk.volume_path();
        let name = match request.arguments() {
            Arguments::Rename { name } => name.clone(),
            _ => None,
        };

        let mut status = Status::SUCCESS;

        if disk.volume_mountable() == Some(false) {
            status = Status::UNSUPPORTED;
        }
        if mountpoint.is_none() {
            status = Status::NOT_MOUNTED;
        }
        if name.is_none() {
            status = Status::UNSUPPORTED;
        }

        if !status.is_success() {
            self.dispatch_completion(request, status);
            self.shared.signal.raise();
            return true;
        }

        if let (Some(mountpoint), Some(name)) = (mountpoint, name) {
            disk.set_state(DiskState::COMMAND_ACTIVE, true);
            unit.set_state(UnitState::COMMAND_ACTIVE, true);
            debug!("  renamed disk, id = {}, ongoing.", disk.id());

            self.shared.environment.rename(
                disk.filesystem(),
                &mountpoint,
                &name,
                RenameReply::new(self.clone(), request.clone()),
            );
        }
        true
    }

    fn unmount(&self, request: &RequestRef) -> bool {
        let disk = request.disk();

        if request.link().is_some() && disk.unit().state(UnitState::COMMAND_ACTIVE) {
            return false;
        }

        // Commence the unmount approval.
        if !request.state(RequestState::STAGED_APPROVE) {
            let mut status = Status::SUCCESS;

            if disk.volume_mountable() == Some(false) {
                status = Status::UNSUPPORTED;
            }
            if disk.volume_path().is_none() {
                status = Status::NOT_MOUNTED;
            }

            if !status.is_success() {
                self.dispatch_completion(request, status);
                self.shared.signal.raise();
                return true;
            }

            disk.set_state(DiskState::COMMAND_ACTIVE, true);
            request.set_state(RequestState::STAGED_APPROVE, true);
            self.shared
                .environment
                .unmount_approval(&disk, ApprovalReply::new(self.clone(), request.clone()));
            return false;
        }

        // Commence the unmount authorization.
        if !request.state(RequestState::STAGED_AUTHORIZE) {
            let mut status = Status::SUCCESS;

            if let Some(dissenter) = request.dissenter() {
                if ApprovalSignal::from_status(dissenter.status())
                    == Some(ApprovalSignal::RequireAuthorization)
                {
                    request.set_dissenter(None);
                    status = Status::NOT_PRIVILEGED;
                }
            }

            request.set_state(RequestState::STAGED_AUTHORIZE, true);

            if !status.is_success() {
                disk.set_state(DiskState::COMMAND_ACTIVE, true);
                self.shared.environment.authorize(
                    &disk,
                    request.user_uid(),
                    request.user_gid(),
                    Right::Unmount,
                    AuthorizeOptions::FORCE | AuthorizeOptions::INTERACT,
                    AuthorizeReply::new(self.clone(), request.clone()),
                );
                return false;
            }
        }

        if let Some(dissenter) = request.dissenter() {
            self.complete(request, Some(&dissenter));
            self.shared.signal.raise();
            return true;
        }

        // Commence the unmount.
        let unit = disk.unit().clone();
        if unit.state(UnitState::COMMAND_ACTIVE) {
            return false;
        }

        let options = match request.arguments() {
            Arguments::Unmount { options } => *options,
            _ => UnmountOptions::empty(),
        };

        if let Some(mountpoint) = disk.volume_path() {
            disk.set_state(DiskState::COMMAND_ACTIVE, true);
            unit.set_state(UnitState::COMMAND_ACTIVE, true);
            debug!("  unmounted disk, id = {}, ongoing.", disk.id());

            self.shared.environment.unmount(
                disk.filesystem(),
                &mountpoint,
                options
                    .contains(UnmountOptions::FORCE)
                    .then_some(UNMOUNT_ARGUMENT_FORCE),
                UnmountReply::new(self.clone(), request.clone()),
            );
        }
        true
    }
}
