//! Reqwest-backed TPC gateway.
//!
//! This adapter owns the vendor's URLs, query parameters, HTTP status
//! mapping, and payload normalisation. One call is one POST; retries belong
//! to the live transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

use super::dto;
use crate::domain::ports::{VendorAccess, VendorExchange, VendorGateway, VendorGatewayError};
use crate::domain::{
    ConsignmentNote, ConsignmentQuantity, LocalityMatch, LocalityQuery, Pincode,
    ServiceabilityReport,
};

const PINCODE_SERVICE_PATH: &str = "tpcwebservice/PINcodeService.ashx";
const LOCALITY_SEARCH_PATH: &str = "TPCWebservice/PINcodeCitysearch.ashx";
const CONSIGNMENT_REQUEST_PATH: &str = "TPCWebService/CnoteRequest.ashx";
const DEFAULT_USER_AGENT: &str = "courierctl/0.1";

/// Gateway that talks to the TPC web service over HTTPS.
#[derive(Debug, Clone)]
pub struct TpcHttpGateway {
    client: Client,
}

impl TpcHttpGateway {
    /// Build a gateway whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    async fn post(
        &self,
        base_url: &Url,
        path: &'static str,
        query: &[(&str, &str)],
    ) -> Result<String, VendorGatewayError> {
        let url = endpoint(base_url, path, query)?;
        debug!(path, "calling vendor");
        let response = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_transport_error)?;
        debug!(path, status = status.as_u16(), bytes = body.len(), "vendor answered");
        if !status.is_success() {
            return Err(map_status_error(status, body));
        }
        Ok(body)
    }
}

#[async_trait]
impl VendorGateway for TpcHttpGateway {
    async fn pincode_service(
        &self,
        access: &VendorAccess,
        pincode: &Pincode,
    ) -> Result<VendorExchange<ServiceabilityReport>, VendorGatewayError> {
        let raw_response = self
            .post(
                &access.base_url,
                PINCODE_SERVICE_PATH,
                &[("pincode", pincode.as_str())],
            )
            .await?;
        let value = dto::serviceability_report(pincode, &raw_response)?;
        Ok(VendorExchange {
            value,
            raw_response,
        })
    }

    async fn locality_search(
        &self,
        access: &VendorAccess,
        query: &LocalityQuery,
    ) -> Result<VendorExchange<Vec<LocalityMatch>>, VendorGatewayError> {
        let raw_response = self
            .post(
                &access.base_url,
                LOCALITY_SEARCH_PATH,
                &[("AreaName", query.as_str())],
            )
            .await?;
        let value = dto::locality_matches(&raw_response)?;
        Ok(VendorExchange {
            value,
            raw_response,
        })
    }

    async fn consignment_notes(
        &self,
        access: &VendorAccess,
        quantity: ConsignmentQuantity,
    ) -> Result<VendorExchange<Vec<ConsignmentNote>>, VendorGatewayError> {
        let requested = quantity.get().to_string();
        let raw_response = self
            .post(
                &access.base_url,
                CONSIGNMENT_REQUEST_PATH,
                &[
                    ("client", access.username.as_str()),
                    ("tpcpwd", access.password.as_str()),
                    ("Qty", requested.as_str()),
                ],
            )
            .await?;
        let value = dto::consignment_notes(quantity, &raw_response)?;
        Ok(VendorExchange {
            value,
            raw_response,
        })
    }
}

/// Resolve `path` under `base_url` and attach `query`.
///
/// A base URL without a trailing slash is treated as a directory so
/// `https://host/api` and `https://host/api/` resolve identically.
fn endpoint(base_url: &Url, path: &str, query: &[(&str, &str)]) -> Result<Url, VendorGatewayError> {
    if base_url.cannot_be_a_base() {
        return Err(VendorGatewayError::invalid_request(
            "vendor base URL cannot carry paths",
        ));
    }
    let mut base = base_url.clone();
    if !base.path().ends_with('/') {
        let directory = format!("{}/", base.path());
        base.set_path(&directory);
    }
    let mut url = base
        .join(path)
        .map_err(|err| VendorGatewayError::invalid_request(format!("invalid vendor path: {err}")))?;
    url.query_pairs_mut().clear().extend_pairs(query);
    Ok(url)
}

fn map_transport_error(error: reqwest::Error) -> VendorGatewayError {
    // The request URL carries the password for consignment requests.
    let error = error.without_url();
    if error.is_timeout() {
        VendorGatewayError::timeout(error.to_string())
    } else {
        VendorGatewayError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: String) -> VendorGatewayError {
    let message = format!("status {}", status.as_u16());
    match status {
        StatusCode::TOO_MANY_REQUESTS => VendorGatewayError::rate_limited(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            VendorGatewayError::timeout(message)
        }
        _ if status.is_client_error() => VendorGatewayError::rejected(message, body),
        _ => VendorGatewayError::transport(message),
    }
}
