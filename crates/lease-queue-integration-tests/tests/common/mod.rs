//! Common test utilities for lease-queue integration tests
//!
//! This module provides:
//! - Configuration pointing the SQS transport at a mock server
//! - Builders for SQS query-API XML responses
//! - Mock helpers for the calls every test makes

use lease_queue::{Credentials, QueueClient, QueueConfig, SqsTransport};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

pub const QUEUE_NAME: &str = "jobs";

/// Queue URL the mock service hands out
pub fn queue_url(server: &MockServer) -> String {
    format!("{}/000000000000/{}", server.uri(), QUEUE_NAME)
}

/// Client configuration pointing at `server`
pub fn config_for(server: &MockServer) -> QueueConfig {
    QueueConfig {
        endpoint: Some(server.uri()),
        credentials: Some(Credentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG")),
        ..QueueConfig::default()
    }
}

/// Client over a real SQS transport, not yet bound to a queue
pub fn client_for(config: QueueConfig) -> QueueClient {
    let transport = SqsTransport::new(&config).unwrap();
    QueueClient::new(QUEUE_NAME, config, Arc::new(transport)).unwrap()
}

/// Client whose queue has been created against `server`
#[allow(dead_code)]
pub async fn connected_client(server: &MockServer, config: QueueConfig) -> QueueClient {
    mount_create_queue(server).await;
    let client = client_for(config);
    client.create_queue().await.unwrap();
    client
}

/// Answer `CreateQueue` with the standard queue URL
pub async fn mount_create_queue(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/"))
        .and(form_param("Action", "CreateQueue"))
        .and(form_param("QueueName", QUEUE_NAME))
        .respond_with(xml_response(200, &queue_url_xml("CreateQueue", &queue_url(server))))
        .mount(server)
        .await;
}

/// Matches a query-API request whose form body carries `key=value`
pub struct FormParam {
    key: String,
    value: String,
}

impl Match for FormParam {
    fn matches(&self, request: &Request) -> bool {
        url::form_urlencoded::parse(&request.body)
            .any(|(key, value)| key == self.key.as_str() && value == self.value.as_str())
    }
}

pub fn form_param(key: impl Into<String>, value: impl Into<String>) -> FormParam {
    FormParam {
        key: key.into(),
        value: value.into(),
    }
}

pub fn xml_response(status: u16, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(status)
        .insert_header("content-type", "text/xml")
        .set_body_string(body.to_string())
}

pub fn queue_url_xml(action: &str, url: &str) -> String {
    format!(
        "<{action}Response><{action}Result><QueueUrl>{url}</QueueUrl></{action}Result>\
         <ResponseMetadata><RequestId>7a62c49f</RequestId></ResponseMetadata></{action}Response>"
    )
}

#[allow(dead_code)]
pub fn empty_xml(action: &str) -> String {
    format!(
        "<{action}Response><ResponseMetadata><RequestId>b5293cb5</RequestId>\
         </ResponseMetadata></{action}Response>"
    )
}

#[allow(dead_code)]
pub fn error_xml(code: &str, message: &str) -> String {
    format!(
        "<ErrorResponse><Error><Type>Sender</Type><Code>{code}</Code>\
         <Message>{message}</Message><Detail/></Error><RequestId>42d59b56</RequestId></ErrorResponse>"
    )
}

/// A `ReceiveMessage` response holding one message; `body` must be XML-escaped
#[allow(dead_code)]
pub fn receive_xml(message_id: &str, handle: &str, body: &str, receive_count: u32) -> String {
    format!(
        "<ReceiveMessageResponse><ReceiveMessageResult><Message>\
         <MessageId>{message_id}</MessageId>\
         <ReceiptHandle>{handle}</ReceiptHandle>\
         <MD5OfBody>fafb00f5732ab283681e124bf8747ed1</MD5OfBody>\
         <Body>{body}</Body>\
         <Attribute><Name>ApproximateReceiveCount</Name><Value>{receive_count}</Value></Attribute>\
         </Message></ReceiveMessageResult>\
         <ResponseMetadata><RequestId>b6633655</RequestId></ResponseMetadata></ReceiveMessageResponse>"
    )
}

#[allow(dead_code)]
pub fn empty_receive_xml() -> String {
    "<ReceiveMessageResponse><ReceiveMessageResult/>\
     <ResponseMetadata><RequestId>b6633655</RequestId></ResponseMetadata></ReceiveMessageResponse>"
        .to_string()
}
