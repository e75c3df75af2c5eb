use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use crate::reader::RawStatus;

const MOUSE_GLYPH: &str = "\u{1F5B1}\u{FE0F}";

static BATTERY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(Charging|Discharging)\s*\[.*\]\s*(\d+)\s*%").expect("battery pattern is valid")
});

/// One battery reading. `percent` is taken from the device as-is and is not
/// clamped to 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryReading {
    Unavailable,
    Level { percent: u32, charging: bool },
}

impl fmt::Display for BatteryReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "unavailable"),
            Self::Level { percent, charging } => {
                let state = if *charging { "charging" } else { "discharging" };
                write!(f, "{percent}% ({state})")
            }
        }
    }
}

/// Icon selection for a reading, ordered from no reading up to full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IconBucket {
    Unavailable,
    Empty,
    Low25,
    Mid50,
    High75,
    Full100,
}

impl IconBucket {
    pub const ALL: [IconBucket; 6] = [
        IconBucket::Unavailable,
        IconBucket::Empty,
        IconBucket::Low25,
        IconBucket::Mid50,
        IconBucket::High75,
        IconBucket::Full100,
    ];

    /// File stem of the icon asset for this bucket.
    pub fn asset_name(self) -> &'static str {
        match self {
            Self::Unavailable => "battery_unavailable",
            Self::Empty => "battery_empty",
            Self::Low25 => "battery_25",
            Self::Mid50 => "battery_50",
            Self::High75 => "battery_75",
            Self::Full100 => "battery_100",
        }
    }

    /// Fill level used when drawing a fallback icon.
    pub fn fill_fraction(self) -> Option<f32> {
        match self {
            Self::Unavailable => None,
            Self::Empty => Some(0.0),
            Self::Low25 => Some(0.25),
            Self::Mid50 => Some(0.5),
            Self::High75 => Some(0.75),
            Self::Full100 => Some(1.0),
        }
    }
}

impl fmt::Display for IconBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.asset_name())
    }
}

/// Parse `rivalcfg --battery-level` output, e.g. `Charging [|||||     ] 52 %`.
pub fn parse_text(text: &str) -> BatteryReading {
    let Some(caps) = BATTERY_PATTERN.captures(text) else {
        return BatteryReading::Unavailable;
    };
    match caps[2].parse::<u32>() {
        Ok(percent) => BatteryReading::Level {
            percent,
            charging: &caps[1] == "Charging",
        },
        Err(_) => BatteryReading::Unavailable,
    }
}

pub fn parse(raw: &RawStatus) -> BatteryReading {
    match raw.text() {
        Some(text) if !text.is_empty() => parse_text(text),
        _ => BatteryReading::Unavailable,
    }
}

pub fn bucket_for(reading: &BatteryReading) -> IconBucket {
    match *reading {
        BatteryReading::Unavailable => IconBucket::Unavailable,
        BatteryReading::Level { percent, .. } => match percent {
            100.. => IconBucket::Full100,
            75.. => IconBucket::High75,
            50.. => IconBucket::Mid50,
            25.. => IconBucket::Low25,
            _ => IconBucket::Empty,
        },
    }
}

pub fn tooltip_for(reading: &BatteryReading) -> String {
    match *reading {
        BatteryReading::Unavailable => format!(
            "{MOUSE_GLYPH} Unable to get the battery level. Is the mouse turned on?"
        ),
        BatteryReading::Level { percent, charging } => {
            let state = if charging { "Charging" } else { "Discharging" };
            format!("{MOUSE_GLYPH} {state}: {percent}%")
        }
    }
}
