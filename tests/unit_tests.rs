use mp_envsensor::{
    absolute_humidity,
    error::PluginError,
    hardware::{ClimateSensor, DeviceSet, LightSensor, Platform, SensorModel, StatusLamps},
    output, Collector, MetricsPlugin, PluginConfig, Profile, Result,
};
use embedded_hal::digital::{ErrorType, OutputPin};
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Shared state a test inspects after the collector has run.
#[derive(Clone, Default)]
struct Probe {
    success_lit: Arc<AtomicBool>,
    failure_lit: Arc<AtomicBool>,
    acquisitions: Arc<AtomicUsize>,
    shutdowns: Arc<AtomicUsize>,
    inventories: Arc<Mutex<Vec<Vec<SensorModel>>>>,
}

struct Lamp(Arc<AtomicBool>);

impl ErrorType for Lamp {
    type Error = Infallible;
}

impl OutputPin for Lamp {
    fn set_low(&mut self) -> std::result::Result<(), Self::Error> {
        self.0.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn set_high(&mut self) -> std::result::Result<(), Self::Error> {
        self.0.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// A climate sensor with a scripted answer for each channel; `None` fails.
#[derive(Clone)]
struct ScriptedClimate {
    model: SensorModel,
    temperature: Option<f64>,
    humidity: Option<f64>,
    pressure: Option<Option<f64>>,
    shutdowns: Arc<AtomicUsize>,
}

fn answer(model: SensorModel, value: Option<f64>) -> Result<f64> {
    value.ok_or_else(|| PluginError::bus_error(format!("{} did not acknowledge", model)))
}

impl ClimateSensor for ScriptedClimate {
    fn model(&self) -> SensorModel {
        self.model
    }

    fn temperature(&mut self) -> Result<f64> {
        answer(self.model, self.temperature)
    }

    fn humidity(&mut self) -> Result<f64> {
        answer(self.model, self.humidity)
    }

    fn pressure(&mut self) -> Option<Result<f64>> {
        self.pressure.map(|p| answer(self.model, p))
    }

    fn shutdown(&mut self) -> Result<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Clone)]
struct ScriptedLight {
    channels: Option<(u16, u16)>,
    shutdowns: Arc<AtomicUsize>,
}

impl LightSensor for ScriptedLight {
    fn model(&self) -> SensorModel {
        SensorModel::Tsl2561
    }

    fn luminosity(&mut self) -> Result<(u16, u16)> {
        self.channels
            .ok_or_else(|| PluginError::bus_error("TSL2561 did not acknowledge"))
    }

    fn lux(&self, broadband: u16, infrared: u16) -> u32 {
        mp_envsensor::hardware::tsl2561::calculate_lux(
            mp_envsensor::hardware::tsl2561::Gain::X16,
            mp_envsensor::hardware::tsl2561::IntegrationTime::Ms402,
            broadband,
            infrared,
        )
    }

    fn shutdown(&mut self) -> Result<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Panicking;

impl ClimateSensor for Panicking {
    fn model(&self) -> SensorModel {
        SensorModel::Sht2x
    }

    fn temperature(&mut self) -> Result<f64> {
        panic!("driver bug");
    }

    fn humidity(&mut self) -> Result<f64> {
        Ok(0.0)
    }
}

/// Platform that builds a fresh device set from scripts on every acquisition.
struct FakePlatform {
    probe: Probe,
    climate: Vec<ScriptedClimate>,
    light: Vec<ScriptedLight>,
    acquire_error: Option<&'static str>,
    lamp_error: bool,
    panic_on_read: bool,
}

impl FakePlatform {
    fn healthy(probe: &Probe) -> Self {
        let climate = |model, pressure| ScriptedClimate {
            model,
            temperature: Some(20.0),
            humidity: Some(50.0),
            pressure,
            shutdowns: probe.shutdowns.clone(),
        };
        Self {
            probe: probe.clone(),
            climate: vec![
                climate(SensorModel::Bme280, Some(Some(101325.0))),
                climate(SensorModel::Sht2x, None),
            ],
            light: vec![ScriptedLight {
                channels: Some((1000, 0)),
                shutdowns: probe.shutdowns.clone(),
            }],
            acquire_error: None,
            lamp_error: false,
            panic_on_read: false,
        }
    }
}

impl Platform for FakePlatform {
    fn status_lamps(&self) -> Result<StatusLamps> {
        if self.lamp_error {
            return Err(PluginError::gpio_error("pin 17 is busy"));
        }
        Ok(StatusLamps::new(
            Box::new(Lamp(self.probe.success_lit.clone())),
            Box::new(Lamp(self.probe.failure_lit.clone())),
        ))
    }

    fn acquire(&self, inventory: &[SensorModel]) -> Result<DeviceSet> {
        self.probe.acquisitions.fetch_add(1, Ordering::SeqCst);
        self.probe.inventories.lock().unwrap().push(inventory.to_vec());
        if let Some(message) = self.acquire_error {
            return Err(PluginError::bus_error(message));
        }

        let mut devices = DeviceSet::new();
        for sensor in self.climate.iter().filter(|s| inventory.contains(&s.model)) {
            devices.push_climate(Box::new(sensor.clone()));
        }
        if inventory.contains(&SensorModel::Tsl2561) {
            for sensor in &self.light {
                devices.push_light(Box::new(sensor.clone()));
            }
        }
        if self.panic_on_read {
            devices.push_climate(Box::new(Panicking));
        }
        Ok(devices)
    }
}

fn collector(platform: FakePlatform, profile: Profile) -> Collector<FakePlatform> {
    Collector::new(platform, PluginConfig::default().with_profile(profile))
}

/// Test a full healthy cycle with model-qualified keys
#[tokio::test]
async fn test_qualified_cycle_reports_every_sensor() {
    let probe = Probe::default();
    let collector = collector(FakePlatform::healthy(&probe), Profile::Qualified);

    let snapshot = collector.fetch_metrics().await.expect("cycle should succeed");

    assert_eq!(snapshot.len(), 10);
    assert_eq!(snapshot.get("temperature.BME280.value"), Some(20.0));
    assert_eq!(snapshot.get("pressure.BME280.value"), Some(1013.25));
    assert_eq!(snapshot.get("humidity.SHT2x.value"), Some(50.0));
    let ah = snapshot.get("abs_humidity.SHT2x.value").unwrap();
    assert_eq!(ah, absolute_humidity(20.0, 50.0));
    assert_eq!(snapshot.get("raw_illum.TSL2561.broadband"), Some(1000.0));
    assert_eq!(snapshot.get("raw_illum.TSL2561.infrared"), Some(0.0));
    assert_eq!(snapshot.get("illuminance.TSL2561.value"), Some(30.0));
    assert!(!snapshot.contains_key("pressure.SHT2x.value"));

    let schema = collector.graph_definition();
    for key in snapshot.keys() {
        assert!(schema.declares(key), "{} is not declared", key);
    }
}

/// Test the flat profile binds its own inventory and emits declared keys only
#[tokio::test]
async fn test_flat_cycle_uses_bare_keys() {
    let probe = Probe::default();
    let collector = collector(FakePlatform::healthy(&probe), Profile::Flat);

    let snapshot = collector.fetch_metrics().await.unwrap();

    let keys = snapshot.sorted_keys();
    assert_eq!(
        keys,
        ["abs_humidity", "broadband", "humidity", "illuminance", "infrared", "pressure", "temperature"]
    );
    let schema = collector.graph_definition();
    assert!(snapshot.keys().all(|k| schema.declares(k)));
    assert_eq!(
        probe.inventories.lock().unwrap()[0],
        vec![SensorModel::Bme280, SensorModel::Tsl2561]
    );
}

/// Test that one failing device does not blank out the others
#[tokio::test]
async fn test_failed_device_only_drops_its_own_keys() {
    let probe = Probe::default();
    let mut platform = FakePlatform::healthy(&probe);
    platform.climate[0].temperature = None;
    platform.climate[0].humidity = None;
    platform.climate[0].pressure = Some(None);

    let snapshot = collector(platform, Profile::Qualified).fetch_metrics().await.unwrap();

    assert!(!snapshot.keys().any(|k| k.contains(".BME280.")));
    assert!(snapshot.contains_key("temperature.SHT2x.value"));
    assert!(snapshot.contains_key("abs_humidity.SHT2x.value"));
    assert!(snapshot.contains_key("illuminance.TSL2561.value"));
}

/// Test that derived humidity needs both raw readings from the same device
#[tokio::test]
async fn test_abs_humidity_requires_same_device_readings() {
    let probe = Probe::default();
    let mut platform = FakePlatform::healthy(&probe);
    platform.climate[0].humidity = None;
    platform.climate[1].temperature = None;

    let snapshot = collector(platform, Profile::Qualified).fetch_metrics().await.unwrap();

    assert!(snapshot.contains_key("temperature.BME280.value"));
    assert!(snapshot.contains_key("humidity.SHT2x.value"));
    assert!(!snapshot.contains_key("abs_humidity.BME280.value"));
    assert!(!snapshot.contains_key("abs_humidity.SHT2x.value"));
}

/// Test that the three light keys appear or vanish together
#[tokio::test]
async fn test_light_keys_are_all_or_nothing() {
    let probe = Probe::default();
    let mut platform = FakePlatform::healthy(&probe);
    platform.light[0].channels = None;

    let snapshot = collector(platform, Profile::Qualified).fetch_metrics().await.unwrap();

    assert!(!snapshot.contains_key("raw_illum.TSL2561.broadband"));
    assert!(!snapshot.contains_key("raw_illum.TSL2561.infrared"));
    assert!(!snapshot.contains_key("illuminance.TSL2561.value"));
    assert!(snapshot.contains_key("temperature.BME280.value"));
}

/// Test that acquisition failure is an error, not an empty snapshot
#[tokio::test]
async fn test_acquisition_failure_is_cycle_error() {
    let probe = Probe::default();
    let mut platform = FakePlatform::healthy(&probe);
    platform.acquire_error = Some("could not open /dev/i2c-1");

    let err = collector(platform, Profile::Qualified)
        .fetch_metrics()
        .await
        .expect_err("acquisition failure must surface");

    assert!(err.is_acquisition());
    assert!(err.to_string().starts_with("Failed to fetch metrics:"));
    assert!(err.to_string().contains("could not open /dev/i2c-1"));
    assert!(!probe.success_lit.load(Ordering::SeqCst));
    assert!(probe.failure_lit.load(Ordering::SeqCst));
}

/// Test that the lamps report a successful cycle
#[tokio::test]
async fn test_lamps_after_success() {
    let probe = Probe::default();
    probe.failure_lit.store(true, Ordering::SeqCst);

    collector(FakePlatform::healthy(&probe), Profile::Qualified)
        .fetch_metrics()
        .await
        .unwrap();

    assert!(probe.success_lit.load(Ordering::SeqCst));
    assert!(!probe.failure_lit.load(Ordering::SeqCst));
}

/// Test that unclaimable lamps fail the cycle before any device is touched
#[tokio::test]
async fn test_lamp_failure_is_cycle_error() {
    let probe = Probe::default();
    let mut platform = FakePlatform::healthy(&probe);
    platform.lamp_error = true;

    let err = collector(platform, Profile::Qualified).fetch_metrics().await.unwrap_err();

    assert!(matches!(err, PluginError::Acquisition(_)));
    assert_eq!(probe.acquisitions.load(Ordering::SeqCst), 0);
}

/// Test that every cycle re-acquires devices and releases them before returning
#[tokio::test]
async fn test_devices_acquired_and_released_per_cycle() {
    let probe = Probe::default();
    let collector = collector(FakePlatform::healthy(&probe), Profile::Qualified);

    collector.fetch_metrics().await.unwrap();
    assert_eq!(probe.acquisitions.load(Ordering::SeqCst), 1);
    assert_eq!(probe.shutdowns.load(Ordering::SeqCst), 3);

    collector.fetch_metrics().await.unwrap();
    assert_eq!(probe.acquisitions.load(Ordering::SeqCst), 2);
    assert_eq!(probe.shutdowns.load(Ordering::SeqCst), 6);
}

/// Test that a panicking driver ends the cycle with an error and still releases devices
#[tokio::test]
async fn test_worker_panic_is_reported() {
    let probe = Probe::default();
    let mut platform = FakePlatform::healthy(&probe);
    platform.panic_on_read = true;

    let err = collector(platform, Profile::Qualified).fetch_metrics().await.unwrap_err();

    assert!(matches!(err, PluginError::Worker(_)));
    assert!(err.is_acquisition());
    assert_eq!(probe.shutdowns.load(Ordering::SeqCst), 3);
}

/// Test the values written for a collected snapshot
#[tokio::test]
async fn test_collected_values_render_as_plugin_lines() {
    let probe = Probe::default();
    let collector = Collector::new(
        FakePlatform::healthy(&probe),
        PluginConfig::new("room").with_profile(Profile::Qualified),
    );
    let snapshot = collector.fetch_metrics().await.unwrap();

    let mut out = Vec::new();
    let lines = output::write_values(
        &mut out,
        collector.metric_key_prefix(),
        &collector.graph_definition(),
        &snapshot,
        1700000000,
    )
    .unwrap();

    assert_eq!(lines, snapshot.len());
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("room.pressure.BME280.value\t1013.250000\t1700000000\n"));
    assert!(text.contains("room.illuminance.TSL2561.value\t30\t1700000000\n"));
    assert!(text.lines().all(|line| line.starts_with("room.")));
}

/// Test the absolute humidity reference points
#[test]
fn test_absolute_humidity_reference_values() {
    assert!((absolute_humidity(20.0, 50.0) - 8.64).abs() < 0.005);
    assert!((absolute_humidity(0.0, 100.0) - 4.85).abs() < 0.005);
}

/// Test PluginError creation and formatting
#[test]
fn test_plugin_error_types() {
    let bus = PluginError::bus_error("no ACK");
    assert!(bus.to_string().contains("no ACK"));

    let device = PluginError::device_error("SHT2x", "checksum mismatch");
    assert_eq!(device.to_string(), "SHT2x error: checksum mismatch");

    let wrapped = PluginError::acquisition(PluginError::gpio_error("pin busy"));
    assert_eq!(wrapped.to_string(), "Failed to fetch metrics: GPIO error: pin busy");
    assert!(wrapped.is_acquisition());
    assert!(!bus.is_acquisition());

    let config = PluginError::config_error("Invalid profile");
    assert!(config.to_string().contains("Invalid profile"));
}

/// Test PluginConfig builder pattern
#[test]
fn test_plugin_config() {
    let config = PluginConfig::default()
        .with_prefix("greenhouse")
        .with_tempfile(Some("/tmp/mackerel-plugin-envsensor".into()))
        .with_profile(Profile::Flat);

    assert_eq!(config.metric_key_prefix(), "greenhouse");
    assert_eq!(
        config.tempfile.as_deref(),
        Some(std::path::Path::new("/tmp/mackerel-plugin-envsensor"))
    );
    assert_eq!(config.profile, Profile::Flat);
}
