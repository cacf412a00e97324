use meshaddr_core::{InterfaceId, Ipv6Address, SubsystemConfig};
use meshaddrd::{Daemon, TickStats};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tempfile::TempDir;

const CONFIG: &str = r#"
fast_tick_ms = 10
slow_tick_ms = 1000

[[interfaces]]
id = 1
name = "wpan0"
dad_transmits = 1
retrans_timer_ms = 100
dad_delay_min_ticks = 1
dad_delay_max_ticks = 1

[[interfaces.static_addresses]]
address = "fe80::1"
skip_dad = true

[[interfaces.static_addresses]]
address = "2001:db8::1"
source = "slaac"
valid_lifetime = 7200
preferred_lifetime = 1800

[[policy_entries]]
prefix = "2001:db8::/32"
precedence = 45
label = 14
"#;

fn addr(s: &str) -> Ipv6Address {
    s.parse().unwrap()
}

fn write_config(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("meshaddrd.toml");
    std::fs::write(&path, CONFIG).unwrap();
    path
}

#[test]
fn test_from_path_seeds_static_addresses() {
    let dir = TempDir::new().unwrap();
    let daemon = Daemon::from_path(write_config(&dir)).unwrap();

    let subsystem = daemon.subsystem();
    assert_eq!(subsystem.interface_ids(), vec![InterfaceId(1)]);
    assert!(subsystem.is_assigned(InterfaceId(1), &addr("fe80::1")));
    assert!(subsystem.is_tentative(InterfaceId(1), &addr("2001:db8::1")));
    assert_eq!(subsystem.get_policy(&addr("2001:db8::5")).label, 14);
    // the skip-DAD address reported DAD_COMPLETE
    assert_eq!(daemon.notifications(), 1);
}

#[test]
fn test_missing_config_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let daemon = Daemon::from_path(dir.path().join("absent.toml")).unwrap();
    assert_eq!(daemon.config(), &SubsystemConfig::default());
    assert!(daemon.subsystem().interface_ids().is_empty());
}

#[test]
fn test_invalid_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "fast_tick_ms = 0\n").unwrap();
    assert!(Daemon::from_path(&path).is_err());

    std::fs::write(&path, "fast_tick_ms = [\n").unwrap();
    assert!(Daemon::from_path(&path).is_err());
}

#[tokio::test]
async fn test_run_completes_dad_and_stops_on_shutdown() {
    let dir = TempDir::new().unwrap();
    let mut daemon = Daemon::from_path(write_config(&dir)).unwrap();

    let stats = daemon
        .run(tokio::time::sleep(Duration::from_millis(500)))
        .await;
    assert!(stats.fast_ticks >= 2);
    assert!(daemon
        .subsystem()
        .is_assigned(InterfaceId(1), &addr("2001:db8::1")));
    assert_eq!(
        daemon.select_source(InterfaceId(1), &addr("2001:4860::8888")),
        Some(addr("2001:db8::1"))
    );

    daemon.shutdown().unwrap();
    assert!(daemon.subsystem().interface_ids().is_empty());
}

#[tokio::test]
async fn test_immediate_shutdown_runs_no_ticks() {
    let mut daemon = Daemon::new(SubsystemConfig::default()).unwrap();
    let stats = daemon.run(async {}).await;
    assert_eq!(stats, TickStats::default());
}
