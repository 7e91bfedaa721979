//! Eject request lifecycle.

mod common;

use common::*;
use diskarbiter::ApprovalSignal;
use diskarbiter::Arguments;
use diskarbiter::Description;
use diskarbiter::Dissenter;
use diskarbiter::Errno;
use diskarbiter::Request;
use diskarbiter::Right;
use diskarbiter::Session;
use diskarbiter::Status;
use diskarbiter::Unit;
use diskarbiter::UnitState;
use diskarbiter::UnmountOptions;

fn eject_request(
    disk: &diskarbiter::DiskRef,
    uid: u32,
) -> (diskarbiter::SessionRef, diskarbiter::RequestRef) {
    let session = Session::new("client");
    let request = Request::new(disk, Arguments::Eject, uid, uid, Some(client(&session)));
    (session, request)
}

#[test]
fn eject_without_whole_media_is_unsupported() {
    let env = TestEnv::new();
    let engine = engine(&env);
    let unit = Unit::new();

    for media_whole in [None, Some(false)] {
        let disk = appeared_disk(
            &unit,
            "disk5",
            Description {
                media_whole,
                ..unmounted_description()
            },
        );
        let (_session, request) = eject_request(&disk, 501);
        pump(&engine, &request);
    }

    assert_eq!(
        env.delivered(),
        vec![
            Some(Dissenter::new(Status::UNSUPPORTED)),
            Some(Dissenter::new(Status::UNSUPPORTED)),
        ]
    );
    assert_eq!(env.count(|e| matches!(e, Event::DeviceOpen { .. })), 0);
}

#[test]
fn eject_opens_the_device_and_latches_the_unit() {
    let env = TestEnv::new();
    let engine = engine(&env);
    let unit = Unit::new();
    let disk = appeared_disk(&unit, "disk5", unmounted_description());
    let (_session, request) = eject_request(&disk, 501);

    pump(&engine, &request);

    assert_eq!(env.count(|e| matches!(e, Event::DeviceOpen { .. })), 1);
    assert_eq!(env.count(|e| matches!(e, Event::DeviceEject)), 1);
    assert!(unit.state(UnitState::EJECTED));
    assert_eq!(env.delivered(), vec![None]);
}

#[test]
fn drivers_without_an_eject_op_count_as_ejected() {
    let env = TestEnv::new();
    let engine = engine(&env);
    let unit = Unit::new();
    let disk = appeared_disk(&unit, "disk5", unmounted_description());
    env.eject_error.set(Some(Errno::ENOTTY));
    let (_session, request) = eject_request(&disk, 501);

    pump(&engine, &request);

    assert_eq!(env.delivered(), vec![None]);
    assert!(unit.state(UnitState::EJECTED));
}

#[test]
fn eject_failure_surfaces_the_errno() {
    let env = TestEnv::new();
    let engine = engine(&env);
    let unit = Unit::new();
    let disk = appeared_disk(&unit, "disk5", unmounted_description());
    env.eject_error.set(Some(Errno::EIO));
    let (_session, request) = eject_request(&disk, 501);

    pump(&engine, &request);

    let delivered = env.delivered();
    assert_eq!(delivered.len(), 1);
    let dissenter = delivered[0].clone().expect("a dissenter");
    assert_eq!(dissenter.status().errno(), Some(Errno::EIO));
    assert!(!unit.state(UnitState::EJECTED));
}

#[test]
fn an_already_ejected_unit_skips_the_ioctl() {
    let env = TestEnv::new();
    let engine = engine(&env);
    let unit = Unit::new();
    unit.set_state(UnitState::EJECTED, true);
    let disk = appeared_disk(&unit, "disk5", unmounted_description());
    let (_session, request) = eject_request(&disk, 501);

    pump(&engine, &request);

    assert_eq!(env.count(|e| matches!(e, Event::DeviceOpen { .. })), 1);
    assert_eq!(env.count(|e| matches!(e, Event::DeviceEject)), 0);
    assert_eq!(env.delivered(), vec![None]);
}

#[test]
fn authorization_signal_checks_the_unmount_right() {
    let env = TestEnv::new();
    let engine = engine(&env);
    let unit = Unit::new();
    let disk = appeared_disk(&unit, "disk5", unmounted_description());
    *env.approval_response.borrow_mut() =
        Some(Dissenter::new(ApprovalSignal::RequireAuthorization.status()));
    let (_session, request) = eject_request(&disk, 0);

    pump(&engine, &request);

    assert_eq!(
        env.count(|e| matches!(e, Event::Authorize { right: Right::Unmount, .. })),
        1
    );
    // Authorization succeeded, so the eject went ahead.
    assert_eq!(env.count(|e| matches!(e, Event::DeviceEject)), 1);
    assert_eq!(env.delivered(), vec![None]);
}

#[test]
fn denied_authorization_reports_not_privileged() {
    let env = TestEnv::new();
    let engine = engine(&env);
    let unit = Unit::new();
    let disk = appeared_disk(&unit, "disk5", unmounted_description());
    *env.approval_response.borrow_mut() =
        Some(Dissenter::new(ApprovalSignal::RequireAuthorization.status()));
    env.authorize_status.set(Status::NOT_PRIVILEGED);
    let (_session, request) = eject_request(&disk, 501);

    pump(&engine, &request);

    assert_eq!(
        env.delivered(),
        vec![Some(Dissenter::new(Status::NOT_PRIVILEGED))]
    );
    assert_eq!(env.count(|e| matches!(e, Event::DeviceOpen { .. })), 0);
}

#[test]
fn execute_stages_are_serialized_per_unit() {
    let env = TestEnv::new();
    let engine = engine(&env);
    let unit = Unit::new();
    let mounted = appeared_disk(
        &unit,
        "disk6s1",
        mounted_description("file://localhost/Volumes/Stick"),
    );
    let whole = appeared_disk(&unit, "disk6", unmounted_description());

    // Park an unmount of one disk in its execute stage, holding the unit.
    env.defer_helpers.set(true);
    let session = Session::new("client");
    let unmount = Request::new(
        &mounted,
        Arguments::Unmount {
            options: UnmountOptions::empty(),
        },
        501,
        501,
        Some(client(&session)),
    );
    pump(&engine, &unmount);
    assert!(unit.state(UnitState::COMMAND_ACTIVE));

    // The eject of the sibling disk clears approval and authorization but
    // must not reach the device while the unit is held.
    let (_session2, eject) = eject_request(&whole, 501);
    assert!(!engine.dispatch(&eject));
    assert!(!engine.dispatch(&eject));
    assert_eq!(env.count(|e| matches!(e, Event::DeviceOpen { .. })), 0);

    env.flush();
    assert!(!unit.state(UnitState::COMMAND_ACTIVE));

    assert!(engine.dispatch(&eject));
    assert_eq!(env.count(|e| matches!(e, Event::DeviceOpen { .. })), 1);
    assert_eq!(env.delivered(), vec![None, None]);
}
