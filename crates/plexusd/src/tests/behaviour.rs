//! Behavioural tests for the server bootstrap sequence.

use std::cell::RefCell;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use crate::forward::PeerId;

use super::support::{HealthEvent, TestWorld};

#[fixture]
fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}

#[given("a healthy configuration loader for a group of {size}")]
fn given_healthy_loader(world: &RefCell<TestWorld>, size: u16) {
    world.borrow_mut().use_successful_loader(size);
}

#[given("a failing configuration loader")]
fn given_failing_loader(world: &RefCell<TestWorld>) {
    world.borrow_mut().use_failing_loader();
}

#[when("the server bootstrap runs")]
fn when_bootstrap_runs(world: &RefCell<TestWorld>) {
    world.borrow_mut().bootstrap();
}

#[when("the console sends \"{text}\"")]
fn when_console_sends(world: &RefCell<TestWorld>, text: String) {
    world.borrow_mut().serve_console(&format!("{text}\n"));
}

#[then("bootstrap succeeds")]
fn then_bootstrap_succeeds(world: &RefCell<TestWorld>) {
    let world = world.borrow();
    assert!(
        world.bootstrap_error().is_none(),
        "bootstrap error: {:?}",
        world.bootstrap_error()
    );
    assert!(world.daemon_started(), "daemon should have been initialised");
}

#[then("bootstrap fails with exit status {status}")]
fn then_bootstrap_fails(world: &RefCell<TestWorld>, status: u8) {
    let world = world.borrow();
    let error = world
        .bootstrap_error()
        .expect("bootstrap succeeded unexpectedly");
    assert_eq!(error.exit_status(), status);
}

#[then("the console output mentions \"{text}\"")]
fn then_console_output(world: &RefCell<TestWorld>, text: String) {
    let world = world.borrow();
    let output = world.console_output();
    assert!(output.contains(&text), "console output: {output}");
}

#[then("the reporter recorded bootstrap start")]
fn then_reporter_start(world: &RefCell<TestWorld>) {
    assert!(
        world
            .borrow()
            .reporter
            .events()
            .contains(&HealthEvent::BootstrapStarting),
        "bootstrap start event missing"
    );
}

#[then("the reporter recorded bootstrap success")]
fn then_reporter_success(world: &RefCell<TestWorld>) {
    assert!(
        world
            .borrow()
            .reporter
            .events()
            .contains(&HealthEvent::BootstrapSucceeded),
        "bootstrap success event missing"
    );
}

#[then("the reporter recorded bootstrap failure")]
fn then_reporter_failure(world: &RefCell<TestWorld>) {
    let events = world.borrow().reporter.events();
    let failed = events
        .iter()
        .any(|event| matches!(event, HealthEvent::BootstrapFailed(_)));
    assert!(failed, "bootstrap failure event missing: {events:?}");
}

#[then("the reporter recorded a group of {size} processes")]
fn then_reporter_group(world: &RefCell<TestWorld>, size: usize) {
    let events = world.borrow().reporter.events();
    let console = PeerId::new(u16::try_from(size - 1).expect("group size fits"));
    assert!(
        events.contains(&HealthEvent::GroupReady { size, console }),
        "group ready event missing: {events:?}"
    );
}

#[scenario(path = "tests/features/daemon_bootstrap.feature")]
fn daemon_bootstrap(world: RefCell<TestWorld>) {
    let _ = world;
}
