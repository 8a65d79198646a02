//! Adapters from platform scan results to [`RawDetection`].

use serde::{Deserialize, Serialize};

use crate::prelude::{EmitterType, RawDetection};

pub const HIDDEN_SSID: &str = "<hidden>";
pub const UNKNOWN_NAME: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiScanResult {
    pub ssid: Option<String>,
    pub bssid: Option<String>,
    pub level: i32,
}

impl From<WifiScanResult> for RawDetection {
    fn from(result: WifiScanResult) -> Self {
        let name = result
            .ssid
            .filter(|ssid| !ssid.trim().is_empty())
            .unwrap_or_else(|| HIDDEN_SSID.to_string());
        RawDetection::new(
            EmitterType::Wifi,
            name,
            result.bssid.unwrap_or_default(),
            result.level,
        )
    }
}

/// A classic discovery hit or a BLE advertisement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioSighting {
    pub name: Option<String>,
    pub address: String,
    pub rssi: i32,
}

impl RadioSighting {
    fn into_detection(self, emitter: EmitterType) -> RawDetection {
        let name = self
            .name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_NAME.to_string());
        RawDetection::new(emitter, name, self.address, self.rssi)
    }

    pub fn bluetooth(self) -> RawDetection {
        self.into_detection(EmitterType::Bt)
    }

    pub fn ble(self) -> RawDetection {
        self.into_detection(EmitterType::Ble)
    }
}

/// Registered serving-cell identity, per radio technology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tech", rename_all = "lowercase")]
pub enum CellIdentity {
    Lte { mcc: String, mnc: String, tac: i32, pci: i32, ci: i64 },
    Nr { mcc: String, mnc: String, tac: i32, pci: i32, nci: i64 },
    Wcdma { mcc: String, mnc: String, lac: i32, cid: i64, psc: i32 },
    Gsm { mcc: String, mnc: String, lac: i32, cid: i64, arfcn: i32 },
    Cdma { sid: i32, nid: i32, bid: i32 },
}

impl CellIdentity {
    /// Human-readable description used as the sighting name.
    pub fn name(&self) -> String {
        match self {
            CellIdentity::Lte { mcc, mnc, tac, pci, ci } => {
                format!("LTE mccmnc={}{} tac={} pci={} cid={}", mcc, mnc, tac, pci, ci)
            }
            CellIdentity::Nr { mcc, mnc, tac, pci, nci } => {
                format!("NR mccmnc={}{} tac={} pci={} nci={}", mcc, mnc, tac, pci, nci)
            }
            CellIdentity::Wcdma { mcc, mnc, lac, cid, psc } => {
                format!("WCDMA mccmnc={}{} lac={} cid={} psc={}", mcc, mnc, lac, cid, psc)
            }
            CellIdentity::Gsm { mcc, mnc, lac, cid, arfcn } => {
                format!("GSM mccmnc={}{} lac={} cid={} arfcn={}", mcc, mnc, lac, cid, arfcn)
            }
            CellIdentity::Cdma { sid, nid, bid } => {
                format!("CDMA sid={} nid={} bid={}", sid, nid, bid)
            }
        }
    }

    /// Stable identifier; the same cell always yields the same id.
    pub fn id(&self) -> String {
        match self {
            CellIdentity::Lte { tac, pci, ci, .. } => format!("lte:{}:{}:{}", ci, pci, tac),
            CellIdentity::Nr { tac, pci, nci, .. } => format!("nr:{}:{}:{}", nci, pci, tac),
            CellIdentity::Wcdma { lac, cid, psc, .. } => format!("wcdma:{}:{}:{}", cid, lac, psc),
            CellIdentity::Gsm { lac, cid, arfcn, .. } => format!("gsm:{}:{}:{}", cid, lac, arfcn),
            CellIdentity::Cdma { sid, nid, bid } => format!("cdma:{}:{}:{}", bid, nid, sid),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellInfo {
    pub identity: CellIdentity,
    pub dbm: i32,
}

impl From<CellInfo> for RawDetection {
    fn from(info: CellInfo) -> Self {
        RawDetection::new(EmitterType::Cell, info.identity.name(), info.identity.id(), info.dbm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_ssid_is_hidden() {
        let detection: RawDetection = WifiScanResult {
            ssid: Some("  ".into()),
            bssid: Some("00:11:22:33:44:55".into()),
            level: -61,
        }
        .into();
        assert_eq!(detection.name, HIDDEN_SSID);
        assert_eq!(detection.id, "00:11:22:33:44:55");
        assert_eq!(detection.emitter, EmitterType::Wifi);

        let missing: RawDetection = WifiScanResult { ssid: None, bssid: None, level: -90 }.into();
        assert_eq!(missing.name, HIDDEN_SSID);
        assert_eq!(missing.id, "");
    }

    #[test]
    fn unnamed_radios_are_unknown() {
        let hit = RadioSighting { name: None, address: "AA:BB".into(), rssi: -70 };
        let bt = hit.clone().bluetooth();
        assert_eq!(bt.emitter, EmitterType::Bt);
        assert_eq!(bt.name, UNKNOWN_NAME);
        let ble = RadioSighting { name: Some("Tag".into()), ..hit }.ble();
        assert_eq!((ble.emitter, ble.name.as_str()), (EmitterType::Ble, "Tag"));
    }

    #[test]
    fn cell_identities_format_name_and_id() {
        let lte = CellInfo {
            identity: CellIdentity::Lte {
                mcc: "310".into(),
                mnc: "260".into(),
                tac: 12,
                pci: 7,
                ci: 123456,
            },
            dbm: -95,
        };
        let detection = RawDetection::from(lte);
        assert_eq!(detection.name, "LTE mccmnc=310260 tac=12 pci=7 cid=123456");
        assert_eq!(detection.id, "lte:123456:7:12");

        let cdma = CellIdentity::Cdma { sid: 1, nid: 2, bid: 3 };
        assert_eq!(cdma.name(), "CDMA sid=1 nid=2 bid=3");
        assert_eq!(cdma.id(), "cdma:3:2:1");

        let gsm = CellIdentity::Gsm { mcc: "234".into(), mnc: "15".into(), lac: 5, cid: 9, arfcn: 70 };
        assert_eq!(gsm.id(), "gsm:9:5:70");
    }
}
