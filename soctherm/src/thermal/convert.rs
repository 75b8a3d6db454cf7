//! Conversion between the on-die sensor reading and the modeled hotspot
//! temperature.
//!
//! The die's hottest point sits away from the sensor; the gradient between
//! them is modeled linearly. The slope is carried multiplied by 1000 so the
//! whole model stays in integer milli-°C.

#[derive(Debug, Clone, Copy)]
pub struct HotspotModel {
    /// Gradient slope, multiplied by 1000.
    pub slope: i64,
    /// Gradient offset in milli-°C.
    pub offset: i64,
}

impl HotspotModel {
    /// Sensor reading to hotspot temperature.
    pub fn to_hotspot(&self, sensor_temp: i64) -> i64 {
        sensor_temp + (sensor_temp * self.slope / 1000 + self.offset)
    }

    /// Hotspot temperature back to the equivalent sensor reading. Used to
    /// program the sensor-level threshold registers from hotspot-level
    /// thresholds.
    pub fn to_sensor(&self, hotspot_temp: i64) -> i64 {
        (hotspot_temp - self.offset) * 1000 / (1000 + self.slope)
    }
}
