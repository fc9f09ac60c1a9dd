use picomotor_core::config::{ConfigError, DriverConfig, TransportConfig};
use picomotor_core::simulator::SimulatorConfig;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_from_file() {
    let file = write_config(
        r#"{
            "transport": { "kind": "usb", "product_id": 16385 },
            "poll_interval_ms": 25
        }"#,
    );
    let config = DriverConfig::from_file(file.path()).unwrap();
    assert_eq!(
        config.transport,
        TransportConfig::Usb {
            vendor_id: 0x104d,
            product_id: 0x4001,
            timeout_ms: 1000,
        }
    );
    assert_eq!(config.poll_interval_ms, 25);
}

#[test]
fn test_empty_object_uses_defaults() {
    let file = write_config("{}");
    let config = DriverConfig::from_file(file.path()).unwrap();
    assert_eq!(config, DriverConfig::default());
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = DriverConfig::from_file(dir.path().join("missing.json"));
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn test_invalid_json() {
    let file = write_config("{ transport: ");
    let result = DriverConfig::from_file(file.path());
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
fn test_round_trip_through_json() {
    let config = DriverConfig {
        transport: TransportConfig::Simulated(SimulatorConfig {
            done_probability: 0.75,
            seed: Some(8),
        }),
        poll_interval_ms: 3,
    };
    let text = serde_json::to_string(&config).unwrap();
    let back: DriverConfig = serde_json::from_str(&text).unwrap();
    assert_eq!(back, config);
}

#[tokio::test]
async fn test_connect_from_file() {
    let file = write_config(
        r#"{ "transport": { "kind": "simulated", "done_probability": 1.0 }, "poll_interval_ms": 2 }"#,
    );
    let config = DriverConfig::from_file(file.path()).unwrap();
    let mut ctrl = config.connect().await.unwrap();
    assert_eq!(ctrl.poll_interval(), Duration::from_millis(2));

    ctrl.set_relative(1, 5).await.unwrap();
    ctrl.finish(Some(1)).await.unwrap();
    assert_eq!(ctrl.position(1).await.unwrap(), 5);
    ctrl.close().await.unwrap();
}
