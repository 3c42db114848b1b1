use log::warn;
use serde::{Deserialize, Serialize};

/// Manufacturer identifier the disaster-node beacon advertises under.
pub const DEFAULT_COMPANY_ID: u16 = 0x1279;

/// Custom identifier the beacon firmware writes at the head of its payload.
pub const BEACON_CUSTOM_ID: [u8; 2] = [0x02, 0x15];

const FLAGS_OFFSET: usize = 2;
const LATITUDE_OFFSET: usize = 3;
const LONGITUDE_OFFSET: usize = 6;
const FREQUENCY_OFFSET: usize = 9;
const COORDINATE_WIDTH: usize = 3;

/// Shortest payload that still carries flags and both coordinates.
pub const MIN_PAYLOAD_LEN: usize = LONGITUDE_OFFSET + COORDINATE_WIDTH;

/// One advertisement as delivered by the scanning transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAdvertisement {
    pub company_id: u16,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Decoded beacon payload.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvertisementRecord {
    pub identifier_matched: bool,
    pub raw_payload: Vec<u8>,
    pub decoded_coordinates: Option<Coordinates>,
    pub status_flags: Option<u8>,
    pub frequency_hint: Option<u8>,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("payload too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },
    #[error("coordinate fraction {0} exceeds 999")]
    FractionOutOfRange(u16),
}

/// Combines an integer byte and a little-endian thousandths field.
pub fn decode_coordinate(bytes: [u8; 3]) -> Result<f64, DecodeError> {
    let fraction = u16::from_le_bytes([bytes[1], bytes[2]]);
    if fraction > 999 {
        return Err(DecodeError::FractionOutOfRange(fraction));
    }
    Ok(f64::from(bytes[0]) + f64::from(fraction) / 1000.0)
}

/// Inverse of [`decode_coordinate`]; the sign is dropped and the value is
/// clamped to what three bytes can carry.
pub fn encode_coordinate(value: f64) -> [u8; 3] {
    let magnitude = value.abs().min(255.999);
    let mut whole = magnitude.trunc() as u8;
    let mut fraction = ((magnitude - magnitude.trunc()) * 1000.0).round() as u16;
    if fraction == 1000 {
        fraction = 0;
        whole = whole.saturating_add(1);
    }
    let [lo, hi] = fraction.to_le_bytes();
    [whole, lo, hi]
}

fn coordinate_at(raw: &[u8], offset: usize) -> [u8; 3] {
    [raw[offset], raw[offset + 1], raw[offset + 2]]
}

/// Decodes the manufacturer-specific data of a beacon advertisement.
///
/// Latitude is reported as a magnitude by the hardware and always
/// represents the southern hemisphere, so it is negated here. A payload whose
/// coordinate bytes are all zero has no GPS fix yet; one with an unreadable
/// coordinate still decodes, just without a location.
pub fn decode(raw: &[u8]) -> Result<AdvertisementRecord, DecodeError> {
    if raw.len() < MIN_PAYLOAD_LEN {
        return Err(DecodeError::TooShort {
            expected: MIN_PAYLOAD_LEN,
            actual: raw.len(),
        });
    }

    let coordinate_bytes = &raw[LATITUDE_OFFSET..LONGITUDE_OFFSET + COORDINATE_WIDTH];
    let decoded_coordinates = if coordinate_bytes.iter().all(|&b| b == 0) {
        None
    } else {
        match (
            decode_coordinate(coordinate_at(raw, LATITUDE_OFFSET)),
            decode_coordinate(coordinate_at(raw, LONGITUDE_OFFSET)),
        ) {
            (Ok(lat), Ok(lon)) => Some(Coordinates { lat: -lat, lon }),
            (Err(err), _) | (_, Err(err)) => {
                warn!("[decoder] location dropped: {}", err);
                None
            }
        }
    };

    let frequency_hint = raw.get(FREQUENCY_OFFSET).copied().filter(|&f| f != 0);

    Ok(AdvertisementRecord {
        identifier_matched: raw[..FLAGS_OFFSET] == BEACON_CUSTOM_ID,
        raw_payload: raw.to_vec(),
        decoded_coordinates,
        status_flags: Some(raw[FLAGS_OFFSET]),
        frequency_hint,
    })
}

/// Fields a beacon puts on air; used by the simulated beacon and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeaconFields {
    pub status_flags: u8,
    pub coordinates: Option<Coordinates>,
    pub frequency_hint: u8,
}

pub fn encode(fields: &BeaconFields) -> Vec<u8> {
    let mut payload = Vec::with_capacity(MIN_PAYLOAD_LEN + 1);
    payload.extend_from_slice(&BEACON_CUSTOM_ID);
    payload.push(fields.status_flags);
    match fields.coordinates {
        Some(coords) => {
            payload.extend_from_slice(&encode_coordinate(coords.lat));
            payload.extend_from_slice(&encode_coordinate(coords.lon));
        }
        None => payload.extend_from_slice(&[0; 2 * COORDINATE_WIDTH]),
    }
    payload.push(fields.frequency_hint);
    payload
}
