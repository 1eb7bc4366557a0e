//! Static table of major rapid-transit transfer stations.

use serde::Serialize;

/// A station where riders change between lines.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferStation {
    pub id: &'static str,
    pub name: &'static str,
    /// Route IDs (or service names) that meet here.
    pub lines: &'static [&'static str],
    /// Typical walk between platforms.
    pub transfer_walking_minutes: u8,
}

pub const TRANSFER_STATIONS: &[TransferStation] = &[
    TransferStation {
        id: "place-dwnxg",
        name: "Downtown Crossing",
        lines: &["Red", "Orange"],
        transfer_walking_minutes: 2,
    },
    TransferStation {
        id: "place-pktrm",
        name: "Park Street",
        lines: &["Red", "Green-B", "Green-C", "Green-D", "Green-E"],
        transfer_walking_minutes: 3,
    },
    TransferStation {
        id: "place-state",
        name: "State",
        lines: &["Blue", "Orange"],
        transfer_walking_minutes: 2,
    },
    TransferStation {
        id: "place-gover",
        name: "Government Center",
        lines: &["Blue", "Green-B", "Green-C", "Green-D", "Green-E"],
        transfer_walking_minutes: 3,
    },
    TransferStation {
        id: "place-north",
        name: "North Station",
        lines: &["Green-C", "Green-E", "Orange", "Commuter Rail"],
        transfer_walking_minutes: 3,
    },
    TransferStation {
        id: "place-bbsta",
        name: "Back Bay",
        lines: &["Orange", "Commuter Rail"],
        transfer_walking_minutes: 3,
    },
    TransferStation {
        id: "place-rugg",
        name: "Ruggles",
        lines: &["Orange", "Commuter Rail"],
        transfer_walking_minutes: 2,
    },
    TransferStation {
        id: "place-forhl",
        name: "Forest Hills",
        lines: &["Orange", "Commuter Rail"],
        transfer_walking_minutes: 3,
    },
];

impl TransferStation {
    /// Whether `line` serves this station. `"Green"` matches any branch;
    /// comparison ignores case.
    pub fn serves(&self, line: &str) -> bool {
        let line = line.trim();
        self.lines.iter().any(|l| {
            l.eq_ignore_ascii_case(line)
                || l.split_once('-')
                    .is_some_and(|(family, _)| family.eq_ignore_ascii_case(line))
        })
    }
}

/// Transfer stations, optionally restricted to those served by `line`.
pub fn transfer_stations(line: Option<&str>) -> Vec<TransferStation> {
    TRANSFER_STATIONS
        .iter()
        .filter(|s| line.is_none_or(|l| s.serves(l)))
        .copied()
        .collect()
}

/// Look up a transfer station by stop ID.
pub fn transfer_station(id: &str) -> Option<&'static TransferStation> {
    TRANSFER_STATIONS.iter().find(|s| s.id == id)
}
