//! Sensor datagrams over loopback UDP through the whole monitor.

use std::sync::Arc;
use std::time::Duration;

use pulse_monitor::config::{AppConfig, TransportConfig};
use pulse_monitor::engine::{MonitorHandle, SystemClock, UdpSampleSource};
use pulse_monitor::managers::StopResult;
use pulse_monitor::session::{Profile, Sex};
use pulse_monitor::storage::MemorySessionStore;
use tokio::net::UdpSocket;
use tokio::time::timeout;

fn config() -> AppConfig {
    AppConfig {
        transport: TransportConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            recv_timeout_ms: 50,
            ..TransportConfig::default()
        },
        ..AppConfig::default()
    }
}

fn profile() -> Profile {
    Profile {
        name: "Noor".into(),
        surname: None,
        age: Some(45),
        birth_date: None,
        mass_kg: Some(82.0),
        height_cm: Some(181.0),
        sex: Some(Sex::Male),
    }
}

#[tokio::test]
async fn datagrams_become_pulses_and_a_session_record() {
    let config = config();
    let store = Arc::new(MemorySessionStore::new());
    let handle = Arc::new(MonitorHandle::with_parts(
        config.clone(),
        Arc::new(SystemClock::default()),
        store.clone(),
    ));
    let source = UdpSampleSource::bind(&config.transport)
        .await
        .expect("bind loopback");
    let target = source.local_addr();

    handle.start_session(Some(profile())).expect("start session");
    let mut pulses = handle.subscribe_pulses();
    let runner = {
        let handle = Arc::clone(&handle);
        tokio::spawn(async move { handle.run(Box::new(source)).await })
    };

    let sensor = UdpSocket::bind("127.0.0.1:0").await.expect("sensor socket");
    for payload in ["1000", "2500", "not-a-number", "900", "2600", "2700", "800", "2100"] {
        sensor
            .send_to(payload.as_bytes(), target)
            .await
            .expect("send datagram");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    for expected in 1..=3u64 {
        let event = timeout(Duration::from_secs(2), pulses.recv())
            .await
            .expect("pulse within timeout")
            .expect("pulse channel open");
        assert_eq!(event.sequence, expected);
    }
    assert!(handle.sensor_connected());

    let finalized = handle.shutdown();
    let result = timeout(Duration::from_secs(2), runner)
        .await
        .expect("run loop exits after shutdown")
        .expect("run task joined");
    assert!(result.is_ok());

    match finalized {
        Some(StopResult::Completed { summary, persisted }) => {
            assert!(persisted);
            assert_eq!(summary.total_pulses, 3);
        }
        other => panic!("expected a finalized session, got {other:?}"),
    }
    assert_eq!(store.all().expect("records").len(), 1);
    assert_eq!(handle.telemetry().counters().samples_rejected, 1);
}

#[tokio::test]
async fn bind_failure_is_reported() {
    let taken = std::net::UdpSocket::bind("127.0.0.1:0").expect("reserve port");
    let transport = TransportConfig {
        bind_addr: taken.local_addr().expect("addr").to_string(),
        ..TransportConfig::default()
    };
    let err = UdpSampleSource::bind(&transport)
        .await
        .err()
        .expect("second bind fails");
    assert_eq!(pulse_monitor::error::ErrorCode::code(&err), 4001);
}
