pub mod weather;

pub use weather::{WeatherCollector, WEATHER_JOB};
