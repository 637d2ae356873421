use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub const VHF_COM_MIN_MHZ: f64 = 118.000;
pub const VHF_COM_MAX_MHZ: f64 = 136.990;
pub const ILS_MIN_MHZ: f64 = 108.00;
pub const ILS_MAX_MHZ: f64 = 111.95;
pub const MAX_REMARKS: usize = 5;

/// Structured data pulled out of a chart's text layer.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedData {
    pub runways: Vec<Runway>,
    pub frequencies: Vec<Frequency>,
    pub ils: Option<Vec<IlsEntry>>,
    pub minima: Option<Minima>,
    pub pattern_altitude: Option<Altitude>,
    pub remarks: Option<Vec<String>>,
}

impl ExtractedData {
    pub fn is_empty(&self) -> bool {
        self.runways.is_empty()
            && self.frequencies.is_empty()
            && self.ils.is_none()
            && self.minima.is_none()
            && self.pattern_altitude.is_none()
            && self.remarks.is_none()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Surface {
    Asphalt,
    Grass,
    Concrete,
    Gravel,
    Unknown,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Runway {
    /// Designator such as `09L`.
    pub identifier: String,
    /// Magnetic orientation (QFU) in degrees, 1..=360.
    pub orientation: u16,
    /// Metres; 0 means unknown.
    pub length_m: u32,
    /// Metres; 0 means unknown.
    pub width_m: u32,
    pub surface: Surface,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrequencyRole {
    Tower,
    Ground,
    #[serde(rename = "ATIS")]
    Atis,
    Approach,
    Info,
}

impl Display for FrequencyRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FrequencyRole::Tower => write!(f, "Tower"),
            FrequencyRole::Ground => write!(f, "Ground"),
            FrequencyRole::Atis => write!(f, "ATIS"),
            FrequencyRole::Approach => write!(f, "Approach"),
            FrequencyRole::Info => write!(f, "Info"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Frequency {
    pub role: FrequencyRole,
    /// MHz, within the VHF COM band.
    pub value: f64,
    pub hours: Option<String>,
    pub phone: Option<String>,
}

impl Frequency {
    /// Value in kHz, the key used for deduplication.
    pub fn khz(&self) -> u32 {
        mhz_to_khz(self.value)
    }
}

pub fn mhz_to_khz(mhz: f64) -> u32 {
    // Frequencies are bounded well inside u32 range once validated.
    (mhz * 1000.0).round().clamp(0.0, f64::from(u32::MAX)) as u32
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IlsCategory {
    I,
    II,
    III,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IlsEntry {
    pub runway: String,
    pub frequency: f64,
    pub identifier: String,
    pub category: IlsCategory,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Minima {
    pub circling: Option<u32>,
    pub straight: Option<u32>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AltitudeUnit {
    Feet,
    Meters,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Altitude {
    pub value: u32,
    pub unit: AltitudeUnit,
}

/// Manual correction. Every present field replaces the stored one; empty
/// lists clear optional sections.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedDataPatch {
    pub runways: Option<Vec<Runway>>,
    pub frequencies: Option<Vec<Frequency>>,
    pub ils: Option<Vec<IlsEntry>>,
    pub minima: Option<Minima>,
    pub pattern_altitude: Option<Altitude>,
    pub remarks: Option<Vec<String>>,
}

impl ExtractedDataPatch {
    pub fn apply(self, mut data: ExtractedData) -> ExtractedData {
        if let Some(runways) = self.runways {
            data.runways = runways;
        }
        if let Some(frequencies) = self.frequencies {
            data.frequencies = frequencies;
        }
        if let Some(ils) = self.ils {
            data.ils = (!ils.is_empty()).then_some(ils);
        }
        if let Some(minima) = self.minima {
            data.minima = (minima.circling.is_some() || minima.straight.is_some()).then_some(minima);
        }
        if let Some(altitude) = self.pattern_altitude {
            data.pattern_altitude = Some(altitude);
        }
        if let Some(mut remarks) = self.remarks {
            remarks.truncate(MAX_REMARKS);
            data.remarks = (!remarks.is_empty()).then_some(remarks);
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tower(value: f64) -> Frequency {
        Frequency {
            role: FrequencyRole::Tower,
            value,
            hours: None,
            phone: None,
        }
    }

    #[test]
    fn khz_rounds_float_noise() {
        assert_eq!(tower(118.25).khz(), 118_250);
        assert_eq!(tower(118.250_000_1).khz(), 118_250);
    }

    #[test]
    fn patch_replaces_only_present_fields() {
        let original = ExtractedData {
            frequencies: vec![tower(118.25)],
            remarks: Some(vec!["Avoid overflying the village".to_string()]),
            ..Default::default()
        };
        let patch = ExtractedDataPatch {
            minima: Some(Minima {
                circling: Some(1200),
                straight: None,
            }),
            remarks: Some(Vec::new()),
            ..Default::default()
        };

        let patched = patch.apply(original);
        assert_eq!(patched.frequencies, vec![tower(118.25)]);
        assert_eq!(patched.minima.and_then(|m| m.circling), Some(1200));
        assert!(patched.remarks.is_none());
    }

    #[test]
    fn patch_caps_remarks() {
        let patch = ExtractedDataPatch {
            remarks: Some((0..8).map(|i| format!("remark number {i}")).collect()),
            ..Default::default()
        };
        let patched = patch.apply(ExtractedData::default());
        assert_eq!(patched.remarks.map(|r| r.len()), Some(MAX_REMARKS));
    }

    #[test]
    fn atis_role_serializes_uppercase() {
        let json = serde_json::to_string(&FrequencyRole::Atis).expect("serialize");
        assert_eq!(json, "\"ATIS\"");
    }
}
