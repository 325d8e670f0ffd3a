//! AWS SQS transport using the HTTP query API.
//!
//! This module talks to SQS (or any compatible endpoint such as LocalStack or
//! ElasticMQ) with direct HTTP calls instead of the AWS SDK, which keeps the
//! wire format visible and lets tests run against a mocked HTTP server.
//!
//! ## Authentication
//!
//! Requests are signed with AWS Signature Version 4 using the access key pair
//! from [`QueueConfig::credentials`], plus `x-amz-security-token` when a
//! temporary session token is configured.
//!
//! ## Queue provisioning
//!
//! `CreateQueue` without attributes returns the existing URL when the queue is
//! already there. Should the service still answer `QueueAlreadyExists`, the
//! transport falls back to `GetQueueUrl` so creation stays idempotent.

use crate::config::{Backend, Credentials, QueueConfig};
use crate::error::{ConfigurationError, TransportError};
use crate::message::{MessageId, QueueAddress, QueueName, ReceivedMessage};
use crate::transport::{QueueAttribute, QueueTransport, ReceiveRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client as HttpClient;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;
use url::Url;

#[cfg(test)]
#[path = "sqs_tests.rs"]
mod tests;

const API_VERSION: &str = "2012-11-05";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

// ============================================================================
// AWS Signature V4 Signing
// ============================================================================

type HmacSha256 = Hmac<Sha256>;

/// AWS Signature Version 4 signer for request authentication
///
/// Implements the AWS Signature V4 signing process:
/// 1. Create canonical request (method, URI, query, headers, payload)
/// 2. Create string to sign (algorithm, timestamp, scope, request hash)
/// 3. Derive signing key (4-level HMAC chain)
/// 4. Calculate signature and build Authorization header
#[derive(Clone)]
struct AwsV4Signer {
    access_key: String,
    secret_key: String,
    session_token: Option<String>,
    region: String,
    service: String,
}

impl AwsV4Signer {
    fn new(credentials: &Credentials, region: String) -> Self {
        Self {
            access_key: credentials.access_key_id.clone(),
            secret_key: credentials.secret_access_key.clone(),
            session_token: credentials.session_token.clone(),
            region,
            service: "sqs".to_string(),
        }
    }

    /// Sign a request, returning the headers to attach
    ///
    /// The result always contains `Authorization`, `x-amz-date` and `host`,
    /// plus `x-amz-security-token` for temporary credentials.
    fn sign_request(
        &self,
        method: &str,
        host: &str,
        path: &str,
        query_params: &[(String, String)],
        body: &str,
        timestamp: &DateTime<Utc>,
    ) -> Vec<(String, String)> {
        let date_stamp = timestamp.format("%Y%m%d").to_string();
        let amz_date = timestamp.format("%Y%m%dT%H%M%SZ").to_string();

        // Task 1: Create canonical request
        let canonical_query_string = canonical_query(query_params);

        // Canonical headers (must be sorted)
        let mut canonical_headers = format!("host:{}\nx-amz-date:{}\n", host, amz_date);
        let mut signed_headers = "host;x-amz-date".to_string();
        if let Some(token) = &self.session_token {
            canonical_headers.push_str(&format!("x-amz-security-token:{}\n", token));
            signed_headers.push_str(";x-amz-security-token");
        }

        let payload_hash = format!("{:x}", Sha256::digest(body.as_bytes()));

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method, path, canonical_query_string, canonical_headers, signed_headers, payload_hash
        );

        // Task 2: Create string to sign
        let algorithm = "AWS4-HMAC-SHA256";
        let credential_scope = format!(
            "{}/{}/{}/aws4_request",
            date_stamp, self.region, self.service
        );
        let canonical_request_hash = format!("{:x}", Sha256::digest(canonical_request.as_bytes()));

        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            algorithm, amz_date, credential_scope, canonical_request_hash
        );

        // Task 3: Calculate signature
        let signature = self.calculate_signature(&string_to_sign, &date_stamp);

        // Task 4: Build authorization header
        let authorization_header = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            algorithm, self.access_key, credential_scope, signed_headers, signature
        );

        let mut headers = vec![
            ("Authorization".to_string(), authorization_header),
            ("x-amz-date".to_string(), amz_date),
            ("host".to_string(), host.to_string()),
        ];
        if let Some(token) = &self.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }

        headers
    }

    /// Calculate AWS Signature V4 signature
    ///
    /// kSecret = "AWS4" + secret, then HMAC over date, region, service and
    /// "aws4_request" in turn; the result signs `string_to_sign`.
    fn calculate_signature(&self, string_to_sign: &str, date_stamp: &str) -> String {
        let k_secret = format!("AWS4{}", self.secret_key);
        let k_date = hmac_sha256(k_secret.as_bytes(), date_stamp.as_bytes());
        let k_region = hmac_sha256(&k_date, self.region.as_bytes());
        let k_service = hmac_sha256(&k_region, self.service.as_bytes());
        let k_signing = hmac_sha256(&k_service, b"aws4_request");
        let signature = hmac_sha256(&k_signing, string_to_sign.as_bytes());

        hex::encode(signature)
    }
}

/// Compute HMAC-SHA256
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Percent-encoded, sorted `key=value` pairs joined with `&`
///
/// Used as the form body of every request and as the canonical query when
/// signing one that carries its parameters in the URL.
fn canonical_query(params: &[(String, String)]) -> String {
    let mut pairs = params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>();
    pairs.sort();
    pairs.join("&")
}

// ============================================================================
// SQS Transport
// ============================================================================

/// AWS SQS transport implementation
///
/// The transport is stateless apart from its HTTP connection pool and can be
/// shared across tasks behind an `Arc`.
pub struct SqsTransport {
    http_client: HttpClient,
    signer: AwsV4Signer,
    endpoint: Url,
    host: String,
}

impl SqsTransport {
    /// Create new SQS transport from configuration
    ///
    /// # Errors
    ///
    /// Returns error if credentials are missing, the endpoint is not a valid
    /// URL, or the HTTP client cannot be built.
    pub fn new(config: &QueueConfig) -> Result<Self, ConfigurationError> {
        let credentials = config
            .credentials
            .as_ref()
            .ok_or_else(|| ConfigurationError::Missing {
                key: "credentials".to_string(),
            })?;

        let endpoint_str = config.endpoint_url();
        let endpoint = Url::parse(&endpoint_str).map_err(|e| ConfigurationError::Invalid {
            message: format!("endpoint '{}' is not a valid URL: {}", endpoint_str, e),
        })?;

        let host = match (endpoint.host_str(), endpoint.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(ConfigurationError::Invalid {
                    message: format!("endpoint '{}' has no host", endpoint_str),
                })
            }
        };

        let http_client = HttpClient::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| ConfigurationError::Invalid {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            signer: AwsV4Signer::new(credentials, config.region.clone()),
            endpoint,
            host,
        })
    }

    /// Make a signed query-API call and return the response body
    async fn make_request(
        &self,
        action: &str,
        mut params: Vec<(String, String)>,
    ) -> Result<String, TransportError> {
        params.push(("Action".to_string(), action.to_string()));
        params.push(("Version".to_string(), API_VERSION.to_string()));

        let path = "/";
        let body = canonical_query(&params);
        let timestamp = Utc::now();
        let auth_headers = self
            .signer
            .sign_request("POST", &self.host, path, &[], &body, &timestamp);

        let mut url = self.endpoint.clone();
        url.set_path(path);

        let mut request = self
            .http_client
            .post(url.as_str())
            .header("content-type", FORM_CONTENT_TYPE)
            .body(body);
        for (key, value) in auth_headers {
            request = request.header(key, value);
        }

        debug!(action, "Sending SQS request");

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout {
                    message: format!("{} timed out: {}", action, e),
                }
            } else if e.is_connect() {
                TransportError::Network {
                    message: format!("Connection failed: {}", e),
                }
            } else {
                TransportError::Network {
                    message: format!("HTTP request failed: {}", e),
                }
            }
        })?;

        let status = response.status();
        let response_body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout {
                    message: format!("{} timed out reading response: {}", action, e),
                }
            } else {
                TransportError::Network {
                    message: format!("Failed to read response body: {}", e),
                }
            }
        })?;

        if !status.is_success() {
            return Err(parse_error_response(&response_body, status.as_u16()));
        }

        Ok(response_body)
    }
}

impl fmt::Debug for SqsTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqsTransport")
            .field("endpoint", &self.endpoint.as_str())
            .field("region", &self.signer.region)
            .field("credentials", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl QueueTransport for SqsTransport {
    async fn create_queue(&self, name: &QueueName) -> Result<QueueAddress, TransportError> {
        let params = vec![("QueueName".to_string(), name.as_str().to_string())];

        match self.make_request("CreateQueue", params).await {
            Ok(response) => parse_queue_url_response(&response),
            Err(TransportError::QueueAlreadyExists { .. }) => {
                debug!(queue = %name, "Queue exists with other attributes; looking it up");
                self.get_queue_url(name)
                    .await?
                    .ok_or_else(|| TransportError::QueueNotFound {
                        queue: name.to_string(),
                    })
            }
            Err(e) => Err(e),
        }
    }

    async fn get_queue_url(
        &self,
        name: &QueueName,
    ) -> Result<Option<QueueAddress>, TransportError> {
        let params = vec![("QueueName".to_string(), name.as_str().to_string())];

        match self.make_request("GetQueueUrl", params).await {
            Ok(response) => parse_queue_url_response(&response).map(Some),
            Err(TransportError::QueueNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn delete_queue(&self, address: &QueueAddress) -> Result<(), TransportError> {
        let params = vec![("QueueUrl".to_string(), address.as_str().to_string())];
        self.make_request("DeleteQueue", params).await?;
        Ok(())
    }

    async fn send_message(
        &self,
        address: &QueueAddress,
        body: &str,
    ) -> Result<MessageId, TransportError> {
        let params = vec![
            ("QueueUrl".to_string(), address.as_str().to_string()),
            ("MessageBody".to_string(), body.to_string()),
        ];

        let response = self.make_request("SendMessage", params).await?;
        parse_send_message_response(&response)
    }

    async fn receive_message(
        &self,
        address: &QueueAddress,
        request: &ReceiveRequest,
    ) -> Result<Vec<ReceivedMessage>, TransportError> {
        let params = vec![
            ("QueueUrl".to_string(), address.as_str().to_string()),
            (
                "MaxNumberOfMessages".to_string(),
                request.max_messages.clamp(1, 10).to_string(), // SQS max is 10
            ),
            (
                "VisibilityTimeout".to_string(),
                request.visibility_timeout_seconds.to_string(),
            ),
            (
                "WaitTimeSeconds".to_string(),
                request.wait_time_seconds.to_string(),
            ),
            (
                "AttributeName.1".to_string(),
                "ApproximateReceiveCount".to_string(),
            ),
        ];

        let response = self.make_request("ReceiveMessage", params).await?;
        parse_receive_message_response(&response)
    }

    async fn change_visibility(
        &self,
        address: &QueueAddress,
        receipt_handle: &str,
        visibility_timeout_seconds: u32,
    ) -> Result<(), TransportError> {
        let params = vec![
            ("QueueUrl".to_string(), address.as_str().to_string()),
            ("ReceiptHandle".to_string(), receipt_handle.to_string()),
            (
                "VisibilityTimeout".to_string(),
                visibility_timeout_seconds.to_string(),
            ),
        ];

        // ChangeMessageVisibility returns an empty result on success
        self.make_request("ChangeMessageVisibility", params).await?;
        Ok(())
    }

    async fn delete_message(
        &self,
        address: &QueueAddress,
        receipt_handle: &str,
    ) -> Result<(), TransportError> {
        let params = vec![
            ("QueueUrl".to_string(), address.as_str().to_string()),
            ("ReceiptHandle".to_string(), receipt_handle.to_string()),
        ];

        self.make_request("DeleteMessage", params).await?;
        Ok(())
    }

    async fn get_attributes(
        &self,
        address: &QueueAddress,
        attributes: &[QueueAttribute],
    ) -> Result<HashMap<String, String>, TransportError> {
        let mut params = vec![("QueueUrl".to_string(), address.as_str().to_string())];
        for (index, attribute) in attributes.iter().enumerate() {
            params.push((
                format!("AttributeName.{}", index + 1),
                attribute.as_str().to_string(),
            ));
        }

        let response = self.make_request("GetQueueAttributes", params).await?;
        parse_attributes_response(&response)
    }

    fn backend(&self) -> Backend {
        Backend::Sqs
    }
}

// ============================================================================
// XML Response Parsing
// ============================================================================

fn xml_error(e: impl fmt::Display) -> TransportError {
    TransportError::MalformedResponse {
        message: format!("XML parsing error: {}", e),
    }
}

/// Return the text of the first `tag` element
fn first_element_text(xml: &str, tag: &[u8]) -> Result<Option<String>, TransportError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut inside = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == tag => inside = true,
            Ok(Event::Text(e)) if inside => {
                return e.unescape().map(|s| Some(s.into_owned())).map_err(xml_error);
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == tag => inside = false,
            Ok(Event::Eof) => return Ok(None),
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }
}

/// Parse CreateQueue / GetQueueUrl responses
fn parse_queue_url_response(xml: &str) -> Result<QueueAddress, TransportError> {
    let url = first_element_text(xml, b"QueueUrl")?.ok_or_else(|| {
        TransportError::MalformedResponse {
            message: "QueueUrl not found in response".to_string(),
        }
    })?;

    QueueAddress::new(url).map_err(|e| TransportError::MalformedResponse {
        message: e.to_string(),
    })
}

/// Parse SendMessage response
fn parse_send_message_response(xml: &str) -> Result<MessageId, TransportError> {
    let id = first_element_text(xml, b"MessageId")?.ok_or_else(|| {
        TransportError::MalformedResponse {
            message: "MessageId not found in response".to_string(),
        }
    })?;

    id.parse().map_err(|e: crate::error::ValidationError| {
        TransportError::MalformedResponse {
            message: e.to_string(),
        }
    })
}

/// Parse ReceiveMessage response
///
/// `Body` is kept byte for byte; only the structural fields are trimmed.
fn parse_receive_message_response(xml: &str) -> Result<Vec<ReceivedMessage>, TransportError> {
    let mut reader = Reader::from_str(xml);

    let mut messages = Vec::new();
    let mut in_message = false;
    let mut current_message_id: Option<String> = None;
    let mut current_receipt_handle: Option<String> = None;
    let mut current_body: Option<String> = None;
    let mut current_receive_count: u32 = 1;

    let mut current_field: Option<Vec<u8>> = None;
    let mut current_attribute_name: Option<String> = None;

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"Message" => {
                    in_message = true;
                    current_message_id = None;
                    current_receipt_handle = None;
                    current_body = None;
                    current_receive_count = 1;
                }
                name @ (b"MessageId" | b"ReceiptHandle" | b"Body" | b"Name" | b"Value")
                    if in_message =>
                {
                    current_field = Some(name.to_vec());
                }
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if let Some(field) = current_field.take() {
                    let text = e.unescape().map_err(xml_error)?.into_owned();
                    match field.as_slice() {
                        b"MessageId" => current_message_id = Some(text.trim().to_string()),
                        b"ReceiptHandle" => {
                            current_receipt_handle = Some(text.trim().to_string())
                        }
                        b"Body" => current_body = Some(text),
                        b"Name" => current_attribute_name = Some(text.trim().to_string()),
                        b"Value" => {
                            if current_attribute_name.as_deref() == Some("ApproximateReceiveCount")
                            {
                                current_receive_count = text.trim().parse().unwrap_or(1);
                            }
                            current_attribute_name = None;
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                current_field = None;
                if e.name().as_ref() == b"Message" && in_message {
                    in_message = false;
                    messages.push(ReceivedMessage {
                        message_id: current_message_id
                            .take()
                            .and_then(|id| id.parse::<MessageId>().ok()),
                        body: current_body.take().unwrap_or_default(),
                        receipt_handle: current_receipt_handle.take(),
                        receive_count: current_receive_count,
                    });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(messages)
}

/// Parse GetQueueAttributes response into a name/value map
fn parse_attributes_response(xml: &str) -> Result<HashMap<String, String>, TransportError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut attributes = HashMap::new();
    let mut in_name = false;
    let mut in_value = false;
    let mut current_name: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"Name" => in_name = true,
                b"Value" => in_value = true,
                _ => {}
            },
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(xml_error)?.into_owned();
                if in_name {
                    current_name = Some(text);
                } else if in_value {
                    if let Some(name) = current_name.take() {
                        attributes.insert(name, text);
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"Name" => in_name = false,
                b"Value" => in_value = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(attributes)
}

/// Parse error response from XML
fn parse_error_response(xml: &str, status_code: u16) -> TransportError {
    let code = first_element_text(xml, b"Code")
        .ok()
        .flatten()
        .unwrap_or_else(|| "Unknown".to_string());
    let message = first_element_text(xml, b"Message")
        .ok()
        .flatten()
        .unwrap_or_else(|| "Unknown error".to_string());

    // Map SQS error codes to transport errors
    match code.as_str() {
        "AWS.SimpleQueueService.NonExistentQueue" | "QueueDoesNotExist" => {
            TransportError::QueueNotFound { queue: message }
        }
        "QueueAlreadyExists" | "QueueNameExists" => {
            TransportError::QueueAlreadyExists { queue: message }
        }
        "InvalidClientTokenId"
        | "UnrecognizedClientException"
        | "SignatureDoesNotMatch"
        | "AccessDenied"
        | "ExpiredToken"
        | "MissingAuthenticationToken" => TransportError::Authentication {
            message: format!("{}: {}", code, message),
        },
        "ReceiptHandleIsInvalid"
        | "InvalidReceiptHandle"
        | "MessageNotInflight"
        | "AWS.SimpleQueueService.MessageNotInflight" => {
            TransportError::InvalidReceipt { message }
        }
        "Throttling"
        | "ThrottlingException"
        | "RequestThrottled"
        | "AWS.SimpleQueueService.RequestThrottled" => TransportError::Throttled {
            message: format!("{}: {}", code, message),
        },
        _ if status_code == 401 || status_code == 403 => TransportError::Authentication {
            message: format!("{}: {}", code, message),
        },
        _ => TransportError::Service { code, message },
    }
}
