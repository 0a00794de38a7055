// sensor2csv-core - Payload schemas and normalization
//
// This crate contains the PURE logic for turning a raw JSON sensor reading
// into a typed, fixed-order CSV record. No I/O, no async, no runtime
// dependencies. The only impure input is the wall clock used to stamp
// `current_time`, and `validate_at` lets callers inject it.

pub mod endpoint;
pub mod record;
pub mod validate;

pub use endpoint::Endpoint;
pub use record::{FieldValue, NormalizedRecord, TIMESTAMP_FORMAT};
pub use validate::{coerce_number, validate, validate_at, ValidationError};
