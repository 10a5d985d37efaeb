use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;
use std::ops::RangeInclusive;
use tracing::{info, warn};

use crate::error::CollectionError;
use crate::job::collector::{Collected, Collector};
use crate::job::models::{DataQuality, NewReading};

/// Name the weather job is registered under
pub const WEATHER_JOB: &str = "weather_collection";

const TEMPERATURE_RANGE: RangeInclusive<f64> = 18.0..=32.0;
const HUMIDITY_RANGE: RangeInclusive<f64> = 40.0..=85.0;
const PRESSURE_RANGE: RangeInclusive<f64> = 1010.0..=1025.0;
const CONDITIONS: [&str; 5] = ["Sunny", "Cloudy", "Partly cloudy", "Rainy", "Drizzle"];

/// Substitute values recorded while the station is unreachable
const FALLBACK_TEMPERATURE: f64 = 22.5;
const FALLBACK_HUMIDITY: f64 = 65.0;
const FALLBACK_PRESSURE: f64 = 1013.0;
const FALLBACK_CONDITION: &str = "Partly cloudy";

/// Physically plausible bounds used to grade a reading
const PLAUSIBLE_TEMPERATURE_C: RangeInclusive<f64> = -10.0..=50.0;
const PLAUSIBLE_HUMIDITY_PCT: RangeInclusive<f64> = 0.0..=100.0;

/// Simulated weather station for one city
///
/// Produces temperature (the reading's value), humidity, pressure and a sky
/// description, each rounded to one decimal.
///
/// With probability `outage_rate` the station is unreachable and a fixed
/// substitute reading is recorded with [`DataQuality::Degraded`].
pub struct WeatherCollector {
    city: String,
    outage_rate: f64,
}

impl WeatherCollector {
    pub fn new(city: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            outage_rate: 0.0,
        }
    }

    /// Clamped to `0.0..=1.0`; NaN counts as zero
    pub fn with_outage_rate(mut self, outage_rate: f64) -> Self {
        self.outage_rate = if outage_rate.is_nan() { 0.0 } else { outage_rate.clamp(0.0, 1.0) };
        self
    }

    fn sample(&self) -> Result<NewReading, CollectionError> {
        let mut rng = rand::thread_rng();
        if rng.gen_bool(self.outage_rate) {
            warn!("Weather station for {} unreachable, recording fallback values", self.city);
            return Ok(fallback(&self.city));
        }

        let temperature = round1(rng.gen_range(TEMPERATURE_RANGE));
        let humidity = round1(rng.gen_range(HUMIDITY_RANGE));
        let pressure = round1(rng.gen_range(PRESSURE_RANGE));
        let description = CONDITIONS
            .choose(&mut rng)
            .ok_or_else(|| CollectionError::Other("no sky conditions configured".to_string()))?;

        Ok(grade(&self.city, temperature, humidity, pressure, description))
    }
}

#[async_trait]
impl Collector for WeatherCollector {
    async fn collect(&self) -> Result<Collected, CollectionError> {
        let reading = self.sample()?;
        info!(
            "Collected weather for {}: {}°C, {}",
            self.city, reading.value, reading.details["description"]
        );
        Ok(Collected::reading(reading))
    }
}

/// Build a reading and grade it against the plausible ranges
pub fn grade(city: &str, temperature: f64, humidity: f64, pressure: f64, description: &str) -> NewReading {
    let quality = DataQuality::assess(temperature, PLAUSIBLE_TEMPERATURE_C)
        .and(DataQuality::assess(humidity, PLAUSIBLE_HUMIDITY_PCT));

    NewReading::new(city, temperature, quality).with_details(json!({
        "humidity": humidity,
        "pressure": pressure,
        "description": description,
        "source": "station",
    }))
}

fn fallback(city: &str) -> NewReading {
    NewReading::new(city, FALLBACK_TEMPERATURE, DataQuality::Degraded).with_details(json!({
        "humidity": FALLBACK_HUMIDITY,
        "pressure": FALLBACK_PRESSURE,
        "description": FALLBACK_CONDITION,
        "source": "fallback",
    }))
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
