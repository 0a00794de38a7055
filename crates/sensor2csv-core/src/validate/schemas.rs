// Per-endpoint field tables
//
// Each table lists the payload fields in CSV column order. Nested fields
// use dotted paths ("mh_z19.co2"). Ranges are closed intervals.

use crate::Endpoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NumberKind {
    Int,
    Float,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldSpec {
    pub path: &'static str,
    pub kind: NumberKind,
    pub min: f64,
    pub max: f64,
}

impl FieldSpec {
    const fn float(path: &'static str, min: f64, max: f64) -> Self {
        Self {
            path,
            kind: NumberKind::Float,
            min,
            max,
        }
    }

    const fn int(path: &'static str, min: f64, max: f64) -> Self {
        Self {
            path,
            kind: NumberKind::Int,
            min,
            max,
        }
    }
}

const PRESSURE_HPA: (f64, f64) = (300.0, 1100.0);
const AMBIENT_TEMP_C: (f64, f64) = (-40.0, 85.0);
const HUMIDITY_PCT: (f64, f64) = (0.0, 100.0);
const GAS_RES_OHMS: (f64, f64) = (0.0, 10_000_000.0);
const CO2_PPM: (f64, f64) = (0.0, 10_000.0);

const DATA: &[FieldSpec] = &[
    FieldSpec::float("pressure", PRESSURE_HPA.0, PRESSURE_HPA.1),
    FieldSpec::float("temperature", AMBIENT_TEMP_C.0, AMBIENT_TEMP_C.1),
];

const DATA2: &[FieldSpec] = &[
    FieldSpec::int("co2", CO2_PPM.0, CO2_PPM.1),
    FieldSpec::float("temperature", AMBIENT_TEMP_C.0, AMBIENT_TEMP_C.1),
    FieldSpec::float("humidity", HUMIDITY_PCT.0, HUMIDITY_PCT.1),
    FieldSpec::float("pressure", PRESSURE_HPA.0, PRESSURE_HPA.1),
    FieldSpec::float("gas_res", GAS_RES_OHMS.0, GAS_RES_OHMS.1),
];

const DATA3: &[FieldSpec] = &[
    FieldSpec::float("temperature", AMBIENT_TEMP_C.0, AMBIENT_TEMP_C.1),
    FieldSpec::float("humidity", HUMIDITY_PCT.0, HUMIDITY_PCT.1),
    FieldSpec::float("pressure", PRESSURE_HPA.0, PRESSURE_HPA.1),
    FieldSpec::float("gas_res", GAS_RES_OHMS.0, GAS_RES_OHMS.1),
];

const DATA4: &[FieldSpec] = &[
    FieldSpec::int("mh_z19.co2", CO2_PPM.0, CO2_PPM.1),
    FieldSpec::int("mq_2.analog_value", 0.0, 65_535.0),
    FieldSpec::float("mq_2.voltage", 0.0, 5.5),
    FieldSpec::float("ds18b20.temperature", -55.0, 125.0),
    FieldSpec::float("dht11.temperature", -20.0, 60.0),
    FieldSpec::float("dht11.humidity", HUMIDITY_PCT.0, HUMIDITY_PCT.1),
];

pub(crate) fn fields_for(endpoint: Endpoint) -> &'static [FieldSpec] {
    match endpoint {
        Endpoint::Data => DATA,
        Endpoint::Data2 => DATA2,
        Endpoint::Data3 => DATA3,
        Endpoint::Data4 => DATA4,
    }
}
