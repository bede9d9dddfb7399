//! The collection cycle: acquire, read, assemble, release.

use crate::config::PluginConfig;
use crate::error::{PluginError, Result};
use crate::hardware::{DeviceSet, Platform};
use crate::metrics::{
    data::{Category, MetricSnapshot},
    humidity::checked_absolute_humidity,
    schema::{GraphSchema, Profile},
    traits::MetricsPlugin,
};
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

/// Collects one snapshot per call from the sensors of a [`Platform`].
///
/// Nothing is kept between cycles: devices are acquired at the start of
/// every cycle and released before it returns.
pub struct Collector<P> {
    platform: P,
    config: PluginConfig,
}

impl<P: Platform> Collector<P> {
    /// Create a new collector for `platform`.
    pub fn new(platform: P, config: PluginConfig) -> Self {
        Self { platform, config }
    }

    /// Run one collection cycle.
    pub async fn collect_snapshot(&self) -> Result<MetricSnapshot> {
        let profile = self.config.profile;
        debug!(%profile, "starting collection cycle");

        let mut lamps = self.platform.status_lamps().map_err(|e| {
            error!("Failed to claim status lamps: {}", e);
            PluginError::acquisition(e)
        })?;
        lamps.clear_failure();

        let devices = match self.platform.acquire(profile.inventory()) {
            Ok(devices) => devices,
            Err(e) => {
                error!("Failed to acquire sensors: {}", e);
                lamps.signal_failed();
                return Err(PluginError::acquisition(e));
            }
        };
        lamps.signal_running();

        // Device reads block, so they run off the async executor. The worker
        // hands back exactly one snapshot, then returns the devices.
        let (tx, rx) = oneshot::channel();
        let worker = tokio::task::spawn_blocking(move || {
            let mut devices = devices;
            let snapshot = read_devices(&mut devices, profile);
            if tx.send(snapshot).is_err() {
                warn!("collection cycle abandoned before the snapshot was delivered");
            }
            devices
        });

        let snapshot = match rx.await {
            Ok(snapshot) => snapshot,
            Err(_) => {
                lamps.signal_failed();
                let reason = match worker.await {
                    Err(e) if e.is_panic() => "sensor read panicked".to_string(),
                    Err(e) => e.to_string(),
                    Ok(_) => "worker finished without a snapshot".to_string(),
                };
                error!("Collection worker failed: {}", reason);
                return Err(PluginError::worker_error(reason));
            }
        };

        match worker.await {
            Ok(devices) => devices.release(),
            Err(e) => warn!("collection worker did not return its devices: {}", e),
        }

        debug!(metrics = snapshot.len(), "collection cycle finished");
        Ok(snapshot)
    }
}

impl<P: Platform> MetricsPlugin for Collector<P> {
    fn metric_key_prefix(&self) -> &str {
        self.config.metric_key_prefix()
    }

    fn graph_definition(&self) -> GraphSchema {
        self.config.profile.schema()
    }

    async fn fetch_metrics(&self) -> Result<MetricSnapshot> {
        self.collect_snapshot().await
    }
}

/// Read every device once and assemble the snapshot.
///
/// A failed reading drops its key and anything derived from it; the other
/// readings are unaffected.
pub fn read_devices(devices: &mut DeviceSet, profile: Profile) -> MetricSnapshot {
    let mut snapshot = MetricSnapshot::new();

    for sensor in devices.climate_sensors() {
        let model = sensor.model();

        let temperature = sensor
            .temperature()
            .map_err(|e| warn!(%model, "temperature read failed: {}", e))
            .ok();
        if let Some(t) = temperature {
            snapshot.insert(profile.key(Category::Temperature, model, "value"), t);
        }

        match sensor.pressure() {
            Some(Ok(pascal)) => {
                snapshot.insert(profile.key(Category::Pressure, model, "value"), pascal / 100.0)
            }
            Some(Err(e)) => warn!(%model, "pressure read failed: {}", e),
            None => {}
        }

        let humidity = sensor
            .humidity()
            .map_err(|e| warn!(%model, "humidity read failed: {}", e))
            .ok();
        if let Some(rh) = humidity {
            snapshot.insert(profile.key(Category::Humidity, model, "value"), rh);
        }

        if let (Some(t), Some(rh)) = (temperature, humidity) {
            match checked_absolute_humidity(t, rh) {
                Some(ah) => snapshot.insert(profile.key(Category::AbsHumidity, model, "value"), ah),
                None => warn!(%model, t, rh, "absolute humidity is not finite, skipped"),
            }
        }
    }

    for sensor in devices.light_sensors() {
        let model = sensor.model();
        match sensor.luminosity() {
            Ok((broadband, infrared)) => {
                let lux = sensor.lux(broadband, infrared);
                snapshot.insert(
                    profile.key(Category::RawIllum, model, "broadband"),
                    broadband as f64,
                );
                snapshot.insert(
                    profile.key(Category::RawIllum, model, "infrared"),
                    infrared as f64,
                );
                snapshot.insert(profile.key(Category::Illuminance, model, "value"), lux as f64);
            }
            Err(e) => warn!(%model, "luminosity read failed: {}", e),
        }
    }

    snapshot
}
