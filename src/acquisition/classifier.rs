//! PM2.5 air-quality classification.

use std::fmt;

/// Air-quality bucket derived from smoothed PM2.5 (µg/m³).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AirQuality {
    Excellent = 1,
    Good = 2,
    Fair = 3,
    Inferior = 4,
    Poor = 5,
}

impl AirQuality {
    /// Ordinal exposed to the property store (1..=5).
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            AirQuality::Excellent => "Excellent",
            AirQuality::Good => "Good",
            AirQuality::Fair => "Fair",
            AirQuality::Inferior => "Inferior",
            AirQuality::Poor => "Poor",
        }
    }
}

impl fmt::Display for AirQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bands are closed on the upper end; anything above 150 (or non-finite) is Poor.
pub fn classify(pm2_5: f64) -> AirQuality {
    if pm2_5 <= 15.0 {
        AirQuality::Excellent
    } else if pm2_5 <= 40.0 {
        AirQuality::Good
    } else if pm2_5 <= 65.0 {
        AirQuality::Fair
    } else if pm2_5 <= 150.0 {
        AirQuality::Inferior
    } else {
        AirQuality::Poor
    }
}
