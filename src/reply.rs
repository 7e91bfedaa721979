//! Consume-once reply handles for the engine's asynchronous stages.
//!
//! A handler suspends by arming one of these and returning; the handle
//! owns the strong request reference across the suspension, and answering
//! it performs the engine-side bookkeeping: record the outcome, release
//! the disk (and unit, for execute stages), raise the stage signal and
//! drop the retain. Each handle answers at most once. A handle dropped
//! unanswered deliberately wedges the pipeline for its disk — the engine
//! has no timeouts — so the drop is logged.

use log::debug;
use log::warn;
use smallvec::SmallVec;

use crate::ApprovalSignal;
use crate::Arguments;
use crate::DescriptionKey;
use crate::DiskState;
use crate::Dissenter;
use crate::Errno;
use crate::MountPointAction;
use crate::ROOT_MOUNT_POINT;
use crate::RequestKind;
use crate::RequestRef;
use crate::Status;
use crate::UnitState;
use crate::engine::Engine;

#[derive(Debug)]
struct ReplyState {
    engine: Engine,
    request: RequestRef,
}

/// Complete an execute stage that held the unit: deliver the outcome,
/// release unit and disk, wake the scheduler.
fn finish_unit_command(engine: &Engine, request: &RequestRef, status: Status) {
    let disk = request.disk();
    engine.dispatch_completion(request, status);
    disk.unit().set_state(UnitState::COMMAND_ACTIVE, false);
    disk.set_state(DiskState::COMMAND_ACTIVE, false);
    engine.signal().raise();
}

/// Response handle for an approval round-trip.
///
/// Observers answer with `None` (no objection) or a dissenter. The answer
/// is recorded on the request per the dissent policy: a claim release is
/// recorded unconditionally; for the other hooks a non-root caller gets
/// the answer verbatim, while sentinel-carrying answers are recorded for
/// every caller (read-only sentinels only on mount).
#[derive(Debug)]
pub struct ApprovalReply {
    state: Option<ReplyState>,
}

impl ApprovalReply {
    pub(crate) fn new(engine: Engine, request: RequestRef) -> ApprovalReply {
        ApprovalReply {
            state: Some(ReplyState { engine, request }),
        }
    }

    /// Record the observer set's answer and resume the pipeline.
    pub fn respond(mut self, response: Option<Dissenter>) {
        let ReplyState { engine, request } = self.state.take().expect("reply answered once");
        let disk = request.disk();

        match request.kind() {
            RequestKind::Claim => request.set_dissenter(response),
            kind => {
                if request.user_uid() != 0 {
                    request.set_dissenter(response.clone());
                }
                if let Some(dissenter) = response {
                    match ApprovalSignal::from_status(dissenter.status()) {
                        Some(ApprovalSignal::RequireAuthorization) => {
                            request.set_dissenter(Some(dissenter));
                        }
                        Some(_) if kind == RequestKind::Mount => {
                            request.set_dissenter(Some(dissenter));
                        }
                        _ => {}
                    }
                }
            }
        }

        disk.set_state(DiskState::COMMAND_ACTIVE, false);
        engine.signal().raise();
    }
}

impl Drop for ApprovalReply {
    fn drop(&mut self) {
        if let Some(state) = &self.state {
            warn!(
                "approval for {:?} request on disk {} dropped without an answer",
                state.request.kind(),
                state.request.disk().id()
            );
        }
    }
}

/// Response handle for an authorization check.
#[derive(Debug)]
pub struct AuthorizeReply {
    state: Option<ReplyState>,
}

impl AuthorizeReply {
    pub(crate) fn new(engine: Engine, request: RequestRef) -> AuthorizeReply {
        AuthorizeReply {
            state: Some(ReplyState { engine, request }),
        }
    }

    /// Record the policy service's verdict and resume the pipeline. A
    /// non-success status becomes the request's dissenter.
    pub fn respond(mut self, status: Status) {
        let ReplyState { engine, request } = self.state.take().expect("reply answered once");
        if !status.is_success() {
            request.set_dissenter(Some(Dissenter::new(status)));
        }
        request.disk().set_state(DiskState::COMMAND_ACTIVE, false);
        engine.signal().raise();
    }
}

impl Drop for AuthorizeReply {
    fn drop(&mut self) {
        if let Some(state) = &self.state {
            warn!(
                "authorization for {:?} request on disk {} dropped without a verdict",
                state.request.kind(),
                state.request.disk().id()
            );
        }
    }
}

/// Completion handle for the mount helper.
#[derive(Debug)]
pub struct MountReply {
    state: Option<ReplyState>,
}

impl MountReply {
    pub(crate) fn new(engine: Engine, request: RequestRef) -> MountReply {
        MountReply {
            state: Some(ReplyState { engine, request }),
        }
    }

    /// The volume was mounted at `mountpoint`.
    pub fn ok(mut self, mountpoint: impl Into<String>) {
        let ReplyState { engine, request } = self.state.take().expect("reply answered once");
        let disk = request.disk();
        let mountpoint = mountpoint.into();

        disk.set_bypath(Some(mountpoint.clone()));
        disk.set_volume_path(Some(mountpoint));
        debug!("  mounted disk, id = {}, success.", disk.id());
        engine.environment().disk_log(&disk);
        engine
            .environment()
            .description_changed(&disk, &[DescriptionKey::VolumePath]);

        finish_unit_command(&engine, &request, Status::SUCCESS);
    }

    /// The mount helper failed with `errno`.
    pub fn error(mut self, errno: Errno) {
        let ReplyState { engine, request } = self.state.take().expect("reply answered once");
        let disk = request.disk();
        let status = Status::from_errno(errno);

        debug!("  mounted disk, id = {}, failure.", disk.id());
        warn!("unable to mount {} (status code {status}).", disk.id());
        request.set_dissenter(Some(Dissenter::new(status)));

        finish_unit_command(&engine, &request, status);
    }
}

impl Drop for MountReply {
    fn drop(&mut self) {
        if let Some(state) = &self.state {
            warn!(
                "mount of disk {} dropped without a result",
                state.request.disk().id()
            );
        }
    }
}

/// Completion handle for the unmount helper.
#[derive(Debug)]
pub struct UnmountReply {
    state: Option<ReplyState>,
}

impl UnmountReply {
    pub(crate) fn new(engine: Engine, request: RequestRef) -> UnmountReply {
        UnmountReply {
            state: Some(ReplyState { engine, request }),
        }
    }

    /// The volume was unmounted.
    pub fn ok(mut self) {
        let ReplyState { engine, request } = self.state.take().expect("reply answered once");
        let disk = request.disk();

        if let Some(mountpoint) = disk.volume_path() {
            engine.environment().remove_mount_point(&mountpoint);
        }
        disk.set_bypath(None);
        debug!("  unmounted disk, id = {}, success.", disk.id());

        if disk.media_path().is_some() {
            disk.set_volume_path(None);
            engine
                .environment()
                .description_changed(&disk, &[DescriptionKey::VolumePath]);
        } else {
            // The media is gone; the unmount was the disk's last rite.
            debug!("  removed disk, id = {}.", disk.id());
            engine.environment().disappeared(&disk);
            disk.set_volume_path(None);
            disk.set_state(DiskState::ZOMBIE, true);
            engine.remove_disk(&disk);
        }

        finish_unit_command(&engine, &request, Status::SUCCESS);
    }

    /// The unmount helper failed with `errno`.
    pub fn error(mut self, errno: Errno) {
        let ReplyState { engine, request } = self.state.take().expect("reply answered once");
        let disk = request.disk();
        let status = Status::from_errno(errno);

        debug!("  unmounted disk, id = {}, failure.", disk.id());
        warn!("unable to unmount {} (status code {status}).", disk.id());
        request.set_dissenter(Some(Dissenter::new(status)));

        finish_unit_command(&engine, &request, status);
    }
}

impl Drop for UnmountReply {
    fn drop(&mut self) {
        if let Some(state) = &self.state {
            warn!(
                "unmount of disk {} dropped without a result",
                state.request.disk().id()
            );
        }
    }
}

/// Completion handle for the rename helper.
#[derive(Debug)]
pub struct RenameReply {
    state: Option<ReplyState>,
}

impl RenameReply {
    pub(crate) fn new(engine: Engine, request: RequestRef) -> RenameReply {
        RenameReply {
            state: Some(ReplyState { engine, request }),
        }
    }

    /// The volume was renamed.
    pub fn ok(mut self) {
        let ReplyState { engine, request } = self.state.take().expect("reply answered once");
        let disk = request.disk();

        if let Arguments::Rename { name: Some(name) } = request.arguments() {
            if disk.volume_name().as_deref() != Some(name.as_str()) {
                let mut keys: SmallVec<[DescriptionKey; 2]> = SmallVec::new();

                disk.set_volume_name(Some(name.clone()));
                keys.push(DescriptionKey::VolumeName);

                // A volume mounted at the filesystem root keeps its mount
                // point; anything else moves with the name.
                if disk.volume_path().as_deref() == Some(ROOT_MOUNT_POINT) {
                    if let Some(mountpoint) = engine
                        .environment()
                        .create_mount_point(&disk, MountPointAction::Move)
                    {
                        disk.set_bypath(Some(mountpoint));
                    }
                } else if let Some(mountpoint) = engine
                    .environment()
                    .create_mount_point(&disk, MountPointAction::Move)
                {
                    disk.set_bypath(Some(mountpoint.clone()));
                    disk.set_volume_path(Some(mountpoint));
                    keys.push(DescriptionKey::VolumePath);
                }

                engine.environment().description_changed(&disk, &keys);
            }
        }
        debug!("  renamed disk, id = {}, success.", disk.id());

        finish_unit_command(&engine, &request, Status::SUCCESS);
    }

    /// The rename helper failed with `errno`.
    pub fn error(mut self, errno: Errno) {
        let ReplyState { engine, request } = self.state.take().expect("reply answered once");
        let disk = request.disk();
        let status = Status::from_errno(errno);

        debug!("  renamed disk, id = {}, failure.", disk.id());
        warn!("unable to rename {} (status code {status}).", disk.id());

        finish_unit_command(&engine, &request, status);
    }
}

impl Drop for RenameReply {
    fn drop(&mut self) {
        if let Some(state) = &self.state {
            warn!(
                "rename of disk {} dropped without a result",
                state.request.disk().id()
            );
        }
    }
}
