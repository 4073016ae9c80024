#![cfg(target_os = "windows")]

use std::{sync::mpsc, time::Duration};

use clipchat_client::instance::{
    ActivationEvent, InstanceError, LockOutcome, acquire_lock, signal_primary,
};

fn unique(kind: &str) -> String {
    format!("Local\\ClipChat-Test-{kind}-{}", std::process::id())
}

#[test]
fn second_lock_sees_the_first() {
    let name = unique("Lock");
    let first = acquire_lock(&name).expect("first acquire");
    assert!(matches!(first, LockOutcome::Primary(_)));

    let second = acquire_lock(&name).expect("second acquire");
    assert!(matches!(second, LockOutcome::AlreadyRunning));

    drop(first);
    let third = acquire_lock(&name).expect("acquire after release");
    assert!(matches!(third, LockOutcome::Primary(_)));
}

#[test]
fn signal_wakes_the_listener() {
    let name = unique("Activate");
    let (tx, rx) = mpsc::channel();
    ActivationEvent::create(&name)
        .expect("create")
        .listen(move || {
            let _ = tx.send(());
        })
        .expect("listen");

    signal_primary(&name).expect("signal");
    rx.recv_timeout(Duration::from_secs(5))
        .expect("listener woke up");

    signal_primary(&name).expect("signal again");
    rx.recv_timeout(Duration::from_secs(5))
        .expect("listener woke up twice");
}

#[test]
fn signal_before_listening_is_not_lost() {
    let name = unique("Early");
    let event = ActivationEvent::create(&name).expect("create");
    signal_primary(&name).expect("signal while the UI is still starting");

    let (tx, rx) = mpsc::channel();
    event
        .listen(move || {
            let _ = tx.send(());
        })
        .expect("listen");
    rx.recv_timeout(Duration::from_secs(5))
        .expect("pending signal delivered");
}

#[test]
fn signal_without_primary_fails() {
    let err = signal_primary(&unique("Nobody")).expect_err("no listener");
    assert!(matches!(err, InstanceError::OpenEvent { .. }));
}
