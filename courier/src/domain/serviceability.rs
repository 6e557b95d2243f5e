//! Serviceability results as normalised from the vendor.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::Pincode;

/// Delivery products offered for a pincode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOptions {
    /// Vendor area name for the pincode.
    pub area_name: Option<String>,
    /// Vendor station serving the pincode.
    pub station_code: Option<String>,
    /// Vendor sub-branch serving the pincode.
    pub sub_branch_code: Option<String>,
    /// Document delivery offered.
    pub document_delivery: bool,
    /// Premium delivery offered.
    pub premium_delivery: bool,
    /// Parcel delivery schedule as published by the vendor.
    pub parcel_schedule: Option<String>,
    /// Document delivery schedule.
    pub document_schedule: Option<String>,
    /// Premium delivery schedule.
    pub premium_schedule: Option<String>,
}

/// Normalised answer to a pincode serviceability check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceabilityReport {
    /// Pincode that was checked.
    pub pincode: Pincode,
    /// Parcel delivery possible.
    pub deliverable: bool,
    /// Cash on delivery possible.
    pub cod_available: bool,
    /// City; `"Unknown"` when the vendor omits it.
    pub city: String,
    /// State; `"Unknown"` when the vendor omits it.
    pub state: String,
    /// Extra product detail.
    pub options: ServiceOptions,
}

/// One area returned by a locality search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalityMatch {
    /// Area or locality name.
    pub area: String,
    /// City the area sits in.
    pub city: String,
    /// State the area sits in.
    pub state: String,
    /// Pincode serving the area.
    pub pincode: Pincode,
}

/// Cached serviceability verdict with its freshness window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PincodeServiceability {
    /// Pincode the verdict applies to.
    pub pincode: Pincode,
    /// Parcel delivery possible.
    pub deliverable: bool,
    /// Cash on delivery possible.
    pub cod_available: bool,
    /// City.
    pub city: String,
    /// State.
    pub state: String,
    /// When the verdict was obtained.
    pub resolved_at: DateTime<Utc>,
    /// When the verdict stops being served from cache.
    pub expires_at: DateTime<Utc>,
}

impl PincodeServiceability {
    /// Stamp a report with its resolution time and TTL.
    ///
    /// A TTL that would overflow the calendar expires the entry immediately.
    pub fn from_report(report: ServiceabilityReport, resolved_at: DateTime<Utc>, ttl: TimeDelta) -> Self {
        let expires_at = resolved_at
            .checked_add_signed(ttl)
            .unwrap_or(resolved_at);
        Self {
            pincode: report.pincode,
            deliverable: report.deliverable,
            cod_available: report.cod_available,
            city: report.city,
            state: report.state,
            resolved_at,
            expires_at,
        }
    }

    /// Whether the entry may still be served at `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn report() -> ServiceabilityReport {
        ServiceabilityReport {
            pincode: Pincode::parse("400001").expect("pincode"),
            deliverable: true,
            cod_available: true,
            city: "Mumbai".to_owned(),
            state: "Maharashtra".to_owned(),
            options: ServiceOptions::default(),
        }
    }

    #[test]
    fn entries_expire_after_ttl() {
        let resolved_at = Utc
            .with_ymd_and_hms(2026, 3, 1, 10, 0, 0)
            .single()
            .expect("timestamp");
        let entry = PincodeServiceability::from_report(report(), resolved_at, TimeDelta::seconds(300));

        assert!(entry.is_fresh(resolved_at));
        assert!(entry.is_fresh(resolved_at + TimeDelta::seconds(299)));
        assert!(!entry.is_fresh(resolved_at + TimeDelta::seconds(300)));
        assert_eq!(entry.city, "Mumbai");
    }
}
