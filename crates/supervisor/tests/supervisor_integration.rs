//! 감독자 통합 테스트
//!
//! `/bin/sh -c` 스크립트를 스캐너 대신 실행합니다.

use std::time::Duration;

use ironscan_core::types::{ScanId, Severity};
use ironscan_supervisor::{
    ExitOutcome, ProcessSupervisor, ResourceLimits, ScanEvent, ScanHandle, ScannerCommand,
    SupervisorEvent, SupervisorSettings,
};

fn settings(script: &str) -> SupervisorSettings {
    SupervisorSettings {
        command: ScannerCommand::new("/bin/sh", vec!["-c".to_owned(), script.to_owned()]),
        stop_grace: Duration::from_millis(500),
        monitor_interval: Duration::from_millis(50),
        limits: ResourceLimits {
            max_memory_bytes: None,
            max_cpu_percent: 10_000.0,
            cpu_violation_samples: 5,
        },
        max_concurrent_scans: 2,
    }
}

fn start(supervisor: &ProcessSupervisor) -> ScanHandle {
    let slot = supervisor
        .gate()
        .try_acquire()
        .unwrap()
        .expect("slot available");
    supervisor
        .spawn(slot, ScanId::new(), vec!["10.0.0.1".to_owned()], Default::default())
        .unwrap()
}

async fn collect(handle: &mut ScanHandle) -> (Vec<ScanEvent>, ExitOutcome) {
    let mut events = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(10), handle.events.recv())
            .await
            .expect("event within timeout")
            .expect("channel open until exit");
        match event {
            SupervisorEvent::Scan(e) => events.push(e),
            SupervisorEvent::Exited(report) => return (events, report.outcome()),
        }
    }
}

#[tokio::test]
async fn streams_events_in_order_then_reports_clean_exit() {
    let script = r#"
cat > /dev/null
echo '{"kind":"host_progress","host":"10.0.0.1","completed":1,"total":2}'
echo '{"kind":"result","host":"10.0.0.1","vt_oid":"1.1","severity":"high"}'
echo 'garbage line'
echo '{"kind":"log","message":"halfway"}'
echo '{"kind":"result","host":"10.0.0.1","vt_oid":"1.2","severity":2.0}'
echo '{"kind":"host_done","host":"10.0.0.1"}'
echo 'stderr noise' >&2
exit 0
"#;
    let supervisor = ProcessSupervisor::new(settings(script));
    let mut handle = start(&supervisor);
    let (events, outcome) = collect(&mut handle).await;

    assert_eq!(outcome, ExitOutcome::Clean);
    assert_eq!(events.len(), 4);
    assert!(matches!(&events[0], ScanEvent::HostProgress { percent: 50, .. }));
    match (&events[1], &events[2]) {
        (ScanEvent::Result(a), ScanEvent::Result(b)) => {
            assert_eq!(a.vt_oid, "1.1");
            assert_eq!(a.severity, Severity::High);
            assert_eq!(b.vt_oid, "1.2");
            assert_eq!(b.severity, Severity::Low);
        }
        other => panic!("unexpected events: {other:?}"),
    }
    assert!(matches!(&events[3], ScanEvent::HostProgress { percent: 100, .. }));
}

#[tokio::test]
async fn non_utf8_output_is_skipped_without_losing_later_results() {
    let script = r#"
cat > /dev/null
echo '{"kind":"result","host":"10.0.0.1","vt_oid":"1.1","severity":"low"}'
printf '\377\376 not utf8\n'
printf 'bad \377 stderr\n' >&2
echo '{"kind":"result","host":"10.0.0.1","vt_oid":"1.2","severity":"medium"}'
echo '{"kind":"host_done","host":"10.0.0.1"}'
exit 0
"#;
    let supervisor = ProcessSupervisor::new(settings(script));
    let mut handle = start(&supervisor);
    let (events, outcome) = collect(&mut handle).await;

    assert_eq!(outcome, ExitOutcome::Clean);
    assert_eq!(events.len(), 3);
    match (&events[0], &events[1]) {
        (ScanEvent::Result(a), ScanEvent::Result(b)) => {
            assert_eq!(a.vt_oid, "1.1");
            assert_eq!(b.vt_oid, "1.2");
        }
        other => panic!("unexpected events: {other:?}"),
    }
    assert!(matches!(&events[2], ScanEvent::HostProgress { percent: 100, .. }));
}

#[tokio::test]
async fn partial_results_arrive_before_exit() {
    let script = r#"
echo '{"kind":"result","host":"h","vt_oid":"1.1","severity":"low"}'
sleep 30
"#;
    let supervisor = ProcessSupervisor::new(settings(script));
    let mut handle = start(&supervisor);

    let first = tokio::time::timeout(Duration::from_secs(5), handle.events.recv())
        .await
        .expect("partial result streamed")
        .expect("open");
    assert!(matches!(first, SupervisorEvent::Scan(ScanEvent::Result(_))));

    handle.stopper.stop();
    let (_, outcome) = collect(&mut handle).await;
    assert_eq!(outcome, ExitOutcome::Stopped);
}

#[tokio::test]
async fn nonzero_exit_is_failure() {
    let supervisor = ProcessSupervisor::new(settings("exit 3"));
    let mut handle = start(&supervisor);
    let (_, outcome) = collect(&mut handle).await;
    assert_eq!(
        outcome,
        ExitOutcome::Failed("scanner exited with status 3".to_owned())
    );
}

#[tokio::test]
async fn stop_escalates_for_stubborn_scanner() {
    let supervisor =
        ProcessSupervisor::new(settings("trap '' TERM; while true; do sleep 0.1; done"));
    let mut handle = start(&supervisor);
    tokio::time::sleep(Duration::from_millis(100)).await;

    handle.stopper.stop();
    let (_, outcome) = collect(&mut handle).await;
    assert_eq!(outcome, ExitOutcome::Stopped);
}

#[tokio::test]
async fn memory_limit_terminates_scanner() {
    let mut s = settings("sleep 30");
    s.limits.max_memory_bytes = Some(1);
    let supervisor = ProcessSupervisor::new(s);
    let mut handle = start(&supervisor);

    let (_, outcome) = collect(&mut handle).await;
    match outcome {
        ExitOutcome::LimitExceeded(reason) => {
            assert!(reason.starts_with("resource limit exceeded: memory"));
        }
        other => panic!("expected limit violation, got {other:?}"),
    }
}

#[tokio::test]
async fn slot_is_released_after_exit() {
    let supervisor = ProcessSupervisor::new(settings("exit 0"));
    let mut a = start(&supervisor);
    let mut b = start(&supervisor);
    assert!(supervisor.gate().try_acquire().unwrap().is_none());

    collect(&mut a).await;
    collect(&mut b).await;
    assert_eq!(supervisor.gate().in_use(), 0);
}
