use rigwatch::{
    ClientError, ClientMonitorConfig, Event, EventKind, EventService, Monitor, RangeThreshold,
    SimulatedClient, Stats,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::Receiver;

const TICK: Duration = Duration::from_secs(10);

fn drain(rx: &mut Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn for_client<'a>(events: &'a [Event], name: &str) -> Vec<&'a Event> {
    events.iter().filter(|e| e.client == name).collect()
}

fn hashrate_policy(check_fails: u32, reboot_fails: u32) -> Arc<ClientMonitorConfig> {
    Arc::new(
        ClientMonitorConfig::default()
            .with_threshold(Arc::new(RangeThreshold::at_least("hashrate_ghs", 10_000.0)))
            .with_check_fails_before_reboot(check_fails)
            .with_reboot_fails_before_power_cycle(reboot_fails)
            .with_reboot_interval(Duration::from_secs(120))
            .with_stats_interval(TICK)
            .with_state_interval(TICK),
    )
}

/// Full ladder: failing checks, failing reboots, power cycle, recovery.
#[tokio::test(start_paused = true)]
async fn escalates_from_checks_to_power_cycle_and_recovers() {
    let rig = Arc::new(
        SimulatedClient::new("rig-ladder")
            .with_power_cycle(true)
            .with_baseline(Stats::empty().with("hashrate_ghs", 13_500.0)),
    );
    for _ in 0..2 {
        rig.push_stats(Ok(Stats::empty().with("hashrate_ghs", 0.0)));
    }
    for _ in 0..2 {
        rig.push_reboot(Err(ClientError::Timeout { elapsed_ms: 30_000 }));
    }

    let events = EventService::new();
    let mut delivered = events.subscribe();
    let mut monitor = Monitor::new(events);
    monitor.add_client(rig.clone(), hashrate_policy(1, 1)).unwrap();
    monitor.start().unwrap();

    // t=10,20 checks fail; t=30 REBOOTING, reboot fails; t=40 reboot fails;
    // t=50 POWERCYCLING, power cycle succeeds; t=60 back to RUNNING
    tokio::time::sleep(Duration::from_secs(65)).await;
    assert_eq!(rig.reboot_calls(), 2);
    assert_eq!(rig.power_cycle_calls(), 1);

    let all = drain(&mut delivered);
    let transitions: Vec<&str> = all
        .iter()
        .filter_map(|e| e.message())
        .filter(|m| m.starts_with("transitioning"))
        .collect();
    assert_eq!(
        transitions,
        vec![
            "transitioning to REBOOTING state...",
            "transitioning to POWERCYCLING state...",
            "transitioning to RUNNING state...",
        ]
    );

    let emails: Vec<(&str, &str)> = all
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::Email { subject, body } => Some((subject.as_str(), body.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(emails.len(), 3);
    assert_eq!(emails[0].0, "FAILED to Reboot");
    assert_eq!(
        emails[0].1,
        "Client was unable to be restarted due to error: timed out after 30000ms"
    );
    assert_eq!(emails[2].0, "SUCCESSFULLY Power Cycled");
    assert!(emails[2]
        .1
        .contains("hashrate_ghs = 0 is below minimum 10000"));

    // Healthy again: checks resume and nothing escalates
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(rig.power_cycle_calls(), 1);
    assert_eq!(rig.reboot_calls(), 2);

    monitor.stop().unwrap();
    assert_eq!(monitor.wait().await, 1);
}

/// Without power-cycle capability the supervisor keeps retrying reboots.
#[tokio::test(start_paused = true)]
async fn reboot_retried_when_power_cycle_unavailable() {
    let rig = Arc::new(SimulatedClient::new("rig-nopdu").with_baseline(Stats::empty()));
    for _ in 0..10 {
        rig.push_reboot(Err(ClientError::Rejected("ssh refused".into())));
    }

    let events = EventService::new();
    let mut delivered = events.subscribe();
    let mut monitor = Monitor::new(events);
    // Missing metric counts as a violation
    monitor.add_client(rig.clone(), hashrate_policy(0, 0)).unwrap();
    monitor.start().unwrap();

    tokio::time::sleep(Duration::from_secs(55)).await;
    assert_eq!(rig.reboot_calls(), 4);
    assert_eq!(rig.power_cycle_calls(), 0);

    let all = drain(&mut delivered);
    let failed = all
        .iter()
        .filter(|e| e.subject() == Some("FAILED to Reboot"))
        .count();
    assert_eq!(failed, 4);

    monitor.stop().unwrap();
    monitor.wait().await;
}

/// Clients escalate independently of each other.
#[tokio::test(start_paused = true)]
async fn clients_escalate_independently() {
    let sick = Arc::new(SimulatedClient::new("rig-sick").with_baseline(Stats::empty()));
    let fine = Arc::new(
        SimulatedClient::new("rig-fine")
            .with_baseline(Stats::empty().with("hashrate_ghs", 12_000.0)),
    );

    let events = EventService::new();
    let mut delivered = events.subscribe();
    let mut monitor = Monitor::new(events);
    monitor.add_client(sick.clone(), hashrate_policy(2, 3)).unwrap();
    monitor.add_client(fine.clone(), hashrate_policy(2, 3)).unwrap();
    monitor.start().unwrap();

    tokio::time::sleep(Duration::from_secs(45)).await;
    assert_eq!(sick.reboot_calls(), 1);
    assert_eq!(fine.reboot_calls(), 0);
    assert_eq!(fine.stats_calls(), 4);

    let all = drain(&mut delivered);
    assert!(for_client(&all, "rig-fine").iter().all(|e| e.is_log()));
    assert_eq!(
        for_client(&all, "rig-sick")
            .iter()
            .filter(|e| e.is_error())
            .count(),
        3
    );

    monitor.stop().unwrap();
    assert_eq!(monitor.wait().await, 2);
}
