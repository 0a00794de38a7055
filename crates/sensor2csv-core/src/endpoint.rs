//! The fixed set of ingestion endpoints and their CSV layouts.

use serde::{Deserialize, Serialize};

/// One POST route, each with its own payload shape and target CSV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    /// Pressure/temperature probe (`POST /data`)
    Data,
    /// CO2 + BME-class environmental sensor (`POST /data2`)
    Data2,
    /// Outdoor BME-class sensor (`POST /data3`)
    Data3,
    /// Composite board with MH-Z19, MQ-2, DS18B20 and DHT11 (`POST /data4`)
    Data4,
}

impl Endpoint {
    pub const ALL: [Endpoint; 4] = [
        Endpoint::Data,
        Endpoint::Data2,
        Endpoint::Data3,
        Endpoint::Data4,
    ];

    /// Stable identifier, used as route suffix and as metrics/history key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Data => "data",
            Endpoint::Data2 => "data2",
            Endpoint::Data3 => "data3",
            Endpoint::Data4 => "data4",
        }
    }

    /// HTTP route this endpoint is served on.
    pub fn route(&self) -> &'static str {
        match self {
            Endpoint::Data => "/data",
            Endpoint::Data2 => "/data2",
            Endpoint::Data3 => "/data3",
            Endpoint::Data4 => "/data4",
        }
    }

    /// File name of the CSV log inside the data directory.
    pub fn csv_file_name(&self) -> &'static str {
        match self {
            Endpoint::Data => "pressure_temperature.csv",
            Endpoint::Data2 => "bme_co2.csv",
            Endpoint::Data3 => "outdoor.csv",
            Endpoint::Data4 => "composite.csv",
        }
    }

    /// Header columns in row order. The first column is always `current_time`.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Endpoint::Data => &["current_time", "pressure", "temperature"],
            Endpoint::Data2 => &[
                "current_time",
                "co2",
                "temperature",
                "humidity",
                "pressure",
                "gas_resistance",
            ],
            Endpoint::Data3 => &[
                "current_time",
                "temperature",
                "humidity",
                "pressure",
                "gas_resistance",
            ],
            Endpoint::Data4 => &[
                "current_time",
                "co2",
                "analog_value",
                "voltage",
                "temp_ds18b20",
                "temp_dht11",
                "humidity_dht11",
            ],
        }
    }

    /// Header row as written to the CSV file, including the line terminator.
    pub fn csv_header(&self) -> String {
        let mut header = self.columns().join(",");
        header.push('\n');
        header
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Endpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('/') {
            "data" => Ok(Endpoint::Data),
            "data2" => Ok(Endpoint::Data2),
            "data3" => Ok(Endpoint::Data3),
            "data4" => Ok(Endpoint::Data4),
            other => Err(format!(
                "Unknown endpoint: {}. Supported: data, data2, data3, data4",
                other
            )),
        }
    }
}
