//! DTOs for the TPC web service payloads.
//!
//! The vendor is loose about shapes: flags arrive as `"YES"`/`"NO"`, pincodes
//! as strings or numbers, single results as bare objects, and some bodies
//! carry raw line breaks inside strings. Everything is decoded into these
//! DTOs first and normalised into domain values in one pass.

use std::collections::HashSet;

use serde::Deserialize;
use serde::de::{DeserializeOwned, IgnoredAny};

use crate::domain::ports::VendorGatewayError;
use crate::domain::{
    ConsignmentNote, ConsignmentQuantity, LocalityMatch, Pincode, ServiceOptions,
    ServiceabilityReport,
};

const UNKNOWN: &str = "Unknown";
const NO_STOCK: &str = "consignment note stock not available";

/// Scalar that may arrive as text, a number, or a boolean.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum Loose {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
    Other(IgnoredAny),
}

impl Loose {
    fn text(&self) -> Option<String> {
        let rendered = match self {
            Self::Text(text) => text.trim().to_owned(),
            Self::Number(number) => number.to_string(),
            Self::Flag(flag) => flag.to_string(),
            Self::Other(_) => return None,
        };
        (!rendered.is_empty()).then_some(rendered)
    }

    fn is_yes(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().eq_ignore_ascii_case("YES"),
            Self::Flag(flag) => *flag,
            Self::Number(_) | Self::Other(_) => false,
        }
    }
}

fn text_of(field: Option<&Loose>) -> Option<String> {
    field.and_then(Loose::text)
}

fn yes(field: Option<&Loose>) -> bool {
    field.is_some_and(Loose::is_yes)
}

/// One area entry as returned by the pincode and locality endpoints.
#[derive(Debug, Default, Deserialize)]
pub(super) struct AreaEntryDto {
    #[serde(rename = "PINCODE")]
    pincode: Option<Loose>,
    #[serde(rename = "AREANAME")]
    area_name: Option<Loose>,
    #[serde(rename = "CITY")]
    city: Option<Loose>,
    #[serde(rename = "STATE")]
    state: Option<Loose>,
    #[serde(rename = "STATION_CODE")]
    station_code: Option<Loose>,
    #[serde(rename = "SUB_BRANCH_CODE")]
    sub_branch_code: Option<Loose>,
    #[serde(rename = "PARCEL_DELIVERY", alias = "parcel_delivery")]
    parcel_delivery: Option<Loose>,
    #[serde(rename = "DOC_DELIVERY")]
    document_delivery: Option<Loose>,
    #[serde(rename = "PROPREMIUM_DELIVERY")]
    premium_delivery: Option<Loose>,
    #[serde(rename = "PARCEL_DELIVERY_SCHEDULE")]
    parcel_schedule: Option<Loose>,
    #[serde(rename = "DOC_DELIVERY_SCHEDULE")]
    document_schedule: Option<Loose>,
    #[serde(rename = "PROPREMIUMSCHEDULE", alias = "PROPREMIUM_SCHEDULE")]
    premium_schedule: Option<Loose>,
    #[serde(rename = "COD_DELIVERY", alias = "COD_AVAILABLE")]
    cod_delivery: Option<Loose>,
    #[serde(rename = "error", alias = "ERROR")]
    error: Option<Loose>,
    #[serde(rename = "message", alias = "MESSAGE")]
    message: Option<Loose>,
}

impl AreaEntryDto {
    fn rejection(&self) -> Option<String> {
        text_of(self.error.as_ref()).or_else(|| text_of(self.message.as_ref()))
    }

    fn delivers_parcels(&self) -> bool {
        yes(self.parcel_delivery.as_ref())
    }

    fn area(&self) -> Option<String> {
        text_of(self.area_name.as_ref())
    }

    fn city(&self) -> String {
        text_of(self.city.as_ref())
            .or_else(|| self.area())
            .unwrap_or_else(|| UNKNOWN.to_owned())
    }

    fn options(&self) -> ServiceOptions {
        ServiceOptions {
            area_name: self.area(),
            station_code: text_of(self.station_code.as_ref()),
            sub_branch_code: text_of(self.sub_branch_code.as_ref()),
            document_delivery: yes(self.document_delivery.as_ref()),
            premium_delivery: yes(self.premium_delivery.as_ref()),
            parcel_schedule: text_of(self.parcel_schedule.as_ref()),
            document_schedule: text_of(self.document_schedule.as_ref()),
            premium_schedule: text_of(self.premium_schedule.as_ref()),
        }
    }

    fn into_report(self, pincode: Pincode) -> ServiceabilityReport {
        ServiceabilityReport {
            pincode,
            deliverable: self.delivers_parcels(),
            cod_available: yes(self.cod_delivery.as_ref()),
            city: self.city(),
            state: text_of(self.state.as_ref()).unwrap_or_else(|| UNKNOWN.to_owned()),
            options: self.options(),
        }
    }

    fn into_locality(self) -> Option<LocalityMatch> {
        let pincode = text_of(self.pincode.as_ref()).and_then(|raw| Pincode::parse(&raw).ok())?;
        let area = self.area()?;
        Some(LocalityMatch {
            city: text_of(self.city.as_ref()).unwrap_or_else(|| area.clone()),
            state: text_of(self.state.as_ref()).unwrap_or_default(),
            area,
            pincode,
        })
    }
}

/// Pincode and locality responses: an array of areas or a single object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum AreaResponseDto {
    Many(Vec<AreaEntryDto>),
    One(Box<AreaEntryDto>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumbersDto {
    List(Vec<Loose>),
    Joined(String),
    Single(serde_json::Number),
}

impl NumbersDto {
    fn into_raw(self) -> Vec<String> {
        match self {
            Self::List(items) => items
                .iter()
                .map(|item| item.text().unwrap_or_default())
                .collect(),
            Self::Joined(joined) => joined.split(',').map(|part| part.trim().to_owned()).collect(),
            Self::Single(number) => vec![number.to_string()],
        }
    }
}

/// Consignment note response.
#[derive(Debug, Deserialize)]
pub(super) struct ConsignmentResponseDto {
    #[serde(rename = "STATUS", alias = "status", alias = "Status")]
    status: Option<Loose>,
    #[serde(rename = "CN_NUMBERS", alias = "consignment_numbers")]
    numbers: Option<NumbersDto>,
    #[serde(rename = "MESSAGE", alias = "message")]
    message: Option<Loose>,
}

/// Decode a vendor body, tolerating raw line breaks inside strings.
pub(super) fn decode_body<T: DeserializeOwned>(raw: &str) -> Result<T, VendorGatewayError> {
    if raw.trim_start().starts_with('<') {
        return Err(VendorGatewayError::decode("vendor returned an HTML page", raw));
    }
    serde_json::from_str(raw).or_else(|first_error| {
        let flattened = raw.replace(['\r', '\n'], " ");
        serde_json::from_str(&flattened).map_err(|_| {
            VendorGatewayError::decode(format!("invalid vendor JSON: {first_error}"), raw)
        })
    })
}

/// Normalise a pincode service response.
pub(super) fn serviceability_report(
    requested: &Pincode,
    raw: &str,
) -> Result<ServiceabilityReport, VendorGatewayError> {
    let entry = match decode_body::<AreaResponseDto>(raw)? {
        AreaResponseDto::One(entry) => {
            if let Some(message) = entry.rejection() {
                return Err(VendorGatewayError::rejected(message, raw));
            }
            *entry
        }
        AreaResponseDto::Many(entries) => {
            let serviceable = entries.iter().position(AreaEntryDto::delivers_parcels);
            entries
                .into_iter()
                .nth(serviceable.unwrap_or(0))
                .ok_or_else(|| VendorGatewayError::decode("vendor returned no areas", raw))?
        }
    };
    Ok(entry.into_report(requested.clone()))
}

/// Normalise a locality search response, dropping malformed entries.
pub(super) fn locality_matches(raw: &str) -> Result<Vec<LocalityMatch>, VendorGatewayError> {
    let entries = match decode_body::<AreaResponseDto>(raw)? {
        AreaResponseDto::Many(entries) => entries,
        AreaResponseDto::One(entry) => {
            if let Some(message) = entry.rejection() {
                return Err(VendorGatewayError::rejected(message, raw));
            }
            vec![*entry]
        }
    };
    Ok(entries
        .into_iter()
        .filter_map(AreaEntryDto::into_locality)
        .collect())
}

/// Normalise a consignment note response.
///
/// Exactly `quantity` distinct, non-blank numbers are required.
pub(super) fn consignment_notes(
    quantity: ConsignmentQuantity,
    raw: &str,
) -> Result<Vec<ConsignmentNote>, VendorGatewayError> {
    let response: ConsignmentResponseDto = decode_body(raw)?;
    let succeeded = text_of(response.status.as_ref())
        .is_some_and(|status| status.eq_ignore_ascii_case("SUCCESS"));
    if !succeeded {
        let message = text_of(response.message.as_ref()).unwrap_or_else(|| NO_STOCK.to_owned());
        return Err(VendorGatewayError::rejected(message, raw));
    }

    let raw_numbers = response.numbers.map(NumbersDto::into_raw).unwrap_or_default();
    let expected = usize::try_from(quantity.get()).unwrap_or(usize::MAX);
    if raw_numbers.len() != expected {
        return Err(VendorGatewayError::decode(
            format!(
                "vendor returned {} consignment numbers, {expected} requested",
                raw_numbers.len()
            ),
            raw,
        ));
    }

    let mut seen = HashSet::with_capacity(raw_numbers.len());
    raw_numbers
        .into_iter()
        .map(|number| {
            let note = ConsignmentNote::new(number)
                .ok_or_else(|| VendorGatewayError::decode("blank consignment number", raw))?;
            if !seen.insert(note.clone()) {
                return Err(VendorGatewayError::decode(
                    format!("duplicate consignment number {note}"),
                    raw,
                ));
            }
            Ok(note)
        })
        .collect()
}
