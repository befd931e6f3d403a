//! Stateless client for the account API.
//!
//! # Design
//! `AccountClient` holds only its `Config` and a `Transport`; no state is
//! kept between calls, so one instance can be shared across threads. Each
//! operation is split into a `build_*` method that produces an `HttpRequest`
//! and a `parse_*` method that consumes an `HttpResponse`. `create`, `fetch`
//! and `delete` glue the two together through the transport under the
//! effective deadline.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::context::Context;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
use crate::status::{self, Outcome};
use crate::types::{AccountData, Envelope};

pub const API_VERSION: &str = "v1";
pub const ACCOUNTS_PATH: &str = "/organisation/accounts";
pub const MEDIA_TYPE: &str = "application/vnd.api+json";

/// Client for the `accounts` resource.
#[derive(Debug)]
pub struct AccountClient<T = UreqTransport> {
    config: Config,
    transport: Arc<T>,
}

impl<T> Clone for AccountClient<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl AccountClient<UreqTransport> {
    /// Build a client over the default `ureq` transport. Constructing a
    /// client has no side effects beyond building the transport.
    pub fn new(config: Config) -> Self {
        let transport = UreqTransport::new(&config);
        Self::with_transport(config, transport)
    }
}

impl<T> AccountClient<T> {
    pub fn with_transport(config: Config, transport: T) -> Self {
        Self {
            config,
            transport: Arc::new(transport),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn build_create_account(&self, account: &AccountData) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(&Envelope { data: account }).map_err(ApiError::Serialization)?;
        let mut headers = self.common_headers();
        headers.push(("Content-Type".to_string(), MEDIA_TYPE.to_string()));
        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: self.collection_url(),
            headers,
            body: Some(body),
        })
    }

    pub fn build_fetch_account(&self, id: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: self.resource_url(id),
            headers: self.common_headers(),
            body: None,
        }
    }

    pub fn build_delete_account(&self, id: &str, version: u64) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Delete,
            url: format!("{}?version={version}", self.resource_url(id)),
            headers: self.common_headers(),
            body: None,
        }
    }

    pub fn parse_create_account(&self, response: HttpResponse) -> Result<AccountData, ApiError> {
        status::classify(status::CREATE, &response)?;
        decode_account(&response)
    }

    /// `Ok(None)` when the account does not exist.
    pub fn parse_fetch_account(&self, response: HttpResponse) -> Result<Option<AccountData>, ApiError> {
        match status::classify(status::FETCH, &response)? {
            Outcome::Absent => Ok(None),
            _ => decode_account(&response).map(Some),
        }
    }

    pub fn parse_delete_account(&self, response: HttpResponse) -> Result<(), ApiError> {
        status::classify(status::DELETE, &response)?;
        Ok(())
    }

    fn collection_url(&self) -> String {
        format!("{}/{API_VERSION}{ACCOUNTS_PATH}", self.config.address())
    }

    fn resource_url(&self, id: &str) -> String {
        format!("{}/{}", self.collection_url(), urlencoding::encode(id))
    }

    fn common_headers(&self) -> Vec<(String, String)> {
        vec![
            ("Host".to_string(), host_of(self.config.address()).to_string()),
            ("Accept".to_string(), MEDIA_TYPE.to_string()),
            (
                "Date".to_string(),
                Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
            ),
        ]
    }
}

impl<T: Transport + 'static> AccountClient<T> {
    /// Create `account` and return it as stored, version included.
    #[tracing::instrument(skip(self, ctx, account), fields(id = %account.id))]
    pub fn create(&self, ctx: Option<&Context>, account: &AccountData) -> Result<AccountData, ApiError> {
        let request = self.build_create_account(account)?;
        let response = self.execute(ctx, &request)?;
        let result = self.parse_create_account(response);
        log_outcome(&result);
        result
    }

    /// Fetch the account with `id`; `Ok(None)` means it does not exist.
    #[tracing::instrument(skip(self, ctx))]
    pub fn fetch(&self, ctx: Option<&Context>, id: &str) -> Result<Option<AccountData>, ApiError> {
        let request = self.build_fetch_account(id);
        let response = self.execute(ctx, &request)?;
        let result = self.parse_fetch_account(response);
        log_outcome(&result);
        result
    }

    /// Delete the account with `id` if `version` is still current.
    #[tracing::instrument(skip(self, ctx))]
    pub fn delete(&self, ctx: Option<&Context>, id: &str, version: u64) -> Result<(), ApiError> {
        let request = self.build_delete_account(id, version);
        let response = self.execute(ctx, &request)?;
        let result = self.parse_delete_account(response);
        log_outcome(&result);
        result
    }

    fn execute(&self, ctx: Option<&Context>, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let background = Context::background();
        let ctx = ctx.unwrap_or(&background);
        let timeout = ctx.effective_timeout(self.config.timeout()).inspect_err(|err| {
            error!(%err, "request not sent");
        })?;

        debug!(method = request.method.as_str(), url = %request.url, ?timeout, "sending request");
        let transport = Arc::clone(&self.transport);
        let request = request.clone();
        ctx.run(move || transport.execute(&request, timeout))
            .and_then(|result| result)
            .map_err(|err| {
                error!(%err, "transport failure");
                ApiError::Transport(err)
            })
    }
}

fn decode_account(response: &HttpResponse) -> Result<AccountData, ApiError> {
    let envelope: Envelope<AccountData> =
        serde_json::from_slice(&response.body).map_err(ApiError::Deserialization)?;
    Ok(envelope.data)
}

fn log_outcome<V>(result: &Result<V, ApiError>) {
    match result {
        Ok(_) => debug!("request succeeded"),
        Err(err @ ApiError::Conflict) => warn!(%err, "optimistic concurrency check failed"),
        Err(err) => error!(%err, "request failed"),
    }
}

/// Authority part of `address` without scheme, userinfo, path or query.
fn host_of(address: &str) -> &str {
    let rest = address.split_once("://").map_or(address, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    authority.rsplit_once('@').map_or(authority, |(_, host)| host)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::error::TransportError;
    use crate::types::AccountAttributes;

    const ID: &str = "ad27e265-9605-4b4b-a0e5-3003ea9cc4dc";

    fn client() -> AccountClient<Canned> {
        client_with(Canned::new(200, ""))
    }

    fn client_with(transport: Canned) -> AccountClient<Canned> {
        let config = Config::new(Some("http://localhost:8080"), Duration::from_secs(5), false);
        AccountClient::with_transport(config, transport)
    }

    fn account() -> AccountData {
        AccountData::new(
            ID,
            ID,
            AccountAttributes {
                name: vec!["Samantha Holder".to_string()],
                country: Some("GB".to_string()),
                ..AccountAttributes::default()
            },
        )
    }

    fn stored_body(version: u64) -> String {
        let mut stored = account();
        stored.version = Some(version);
        serde_json::to_string(&Envelope { data: stored }).unwrap()
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    /// Replies with a fixed response and records what it was asked to send.
    struct Canned {
        reply: Result<HttpResponse, fn() -> TransportError>,
        delay: Duration,
        seen: Mutex<Vec<(HttpRequest, Duration)>>,
    }

    impl Canned {
        fn new(status: u16, body: &str) -> Self {
            Self {
                reply: Ok(response(status, body)),
                delay: Duration::ZERO,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn slow(status: u16, body: &str, delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new(status, body)
            }
        }

        fn failing(err: fn() -> TransportError) -> Self {
            Self {
                reply: Err(err),
                delay: Duration::ZERO,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(HttpRequest, Duration)> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl Transport for Canned {
        fn execute(&self, request: &HttpRequest, timeout: Duration) -> Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push((request.clone(), timeout));
            std::thread::sleep(self.delay);
            match &self.reply {
                Ok(response) => Ok(response.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    #[test]
    fn build_create_produces_enveloped_post() {
        let req = client().build_create_account(&account()).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:8080/v1/organisation/accounts");
        assert_eq!(req.header("content-type"), Some(MEDIA_TYPE));

        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["data"]["id"], ID);
        assert_eq!(body["data"]["type"], "accounts");
        assert_eq!(body["data"]["attributes"]["name"][0], "Samantha Holder");
        assert!(body["data"].get("version").is_none());
    }

    #[test]
    fn every_request_carries_common_headers() {
        let c = client();
        let requests = [
            c.build_create_account(&account()).unwrap(),
            c.build_fetch_account(ID),
            c.build_delete_account(ID, 0),
        ];
        for req in requests {
            assert_eq!(req.header("host"), Some("localhost:8080"));
            assert_eq!(req.header("accept"), Some(MEDIA_TYPE));
            let date = req.header("date").unwrap();
            assert!(date.ends_with(" GMT"), "{date}");
        }
    }

    #[test]
    fn build_fetch_produces_get() {
        let req = client().build_fetch_account(ID);
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, format!("http://localhost:8080/v1/organisation/accounts/{ID}"));
        assert!(req.body.is_none());
        assert!(req.header("content-type").is_none());
    }

    #[test]
    fn build_delete_passes_version_as_query() {
        let req = client().build_delete_account(ID, 7);
        assert_eq!(req.method, HttpMethod::Delete);
        assert_eq!(
            req.url,
            format!("http://localhost:8080/v1/organisation/accounts/{ID}?version=7")
        );
        assert!(req.body.is_none());
    }

    #[test]
    fn id_is_encoded_as_one_path_segment() {
        let req = client().build_fetch_account("a/b c");
        assert_eq!(req.url, "http://localhost:8080/v1/organisation/accounts/a%2Fb%20c");
    }

    #[test]
    fn host_strips_scheme_and_path() {
        assert_eq!(host_of("http://localhost:8080"), "localhost:8080");
        assert_eq!(host_of("https://api.example.com/base"), "api.example.com");
        assert_eq!(host_of("accountapi:8080"), "accountapi:8080");
        assert_eq!(host_of("http://api:8080?debug=1"), "api:8080");
    }

    #[test]
    fn host_drops_userinfo() {
        assert_eq!(host_of("http://user:pw@api.example.com:8443/v"), "api.example.com:8443");
        assert_eq!(host_of("https://a@b@accounts.local"), "accounts.local");
    }

    #[test]
    fn parse_create_returns_stored_record() {
        let created = client().parse_create_account(response(201, &stored_body(0))).unwrap();
        assert_eq!(created.version, Some(0));
        assert_eq!(created.attributes, account().attributes);
    }

    #[test]
    fn parse_create_bad_json() {
        let err = client().parse_create_account(response(201, "not json")).unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }

    #[test]
    fn parse_create_non_utf8_body_is_deserialization_error() {
        let bad = HttpResponse {
            status: 201,
            headers: Vec::new(),
            body: vec![0xff, 0xfe],
        };
        let err = client().parse_create_account(bad).unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }

    #[test]
    fn parse_fetch_not_found_is_absent() {
        let fetched = client().parse_fetch_account(response(404, "")).unwrap();
        assert!(fetched.is_none());
    }

    #[test]
    fn parse_delete_statuses() {
        let c = client();
        assert!(c.parse_delete_account(response(204, "")).is_ok());
        assert!(matches!(
            c.parse_delete_account(response(404, "")).unwrap_err(),
            ApiError::NotFound
        ));
        assert!(matches!(
            c.parse_delete_account(response(409, "")).unwrap_err(),
            ApiError::Conflict
        ));
        assert!(matches!(
            c.parse_delete_account(response(500, "")).unwrap_err(),
            ApiError::UnexpectedStatus { status: 500, .. }
        ));
    }

    #[test]
    fn create_runs_through_transport() {
        let c = client_with(Canned::new(201, &stored_body(0)));
        let created = c.create(None, &account()).unwrap();
        assert_eq!(created.version, Some(0));

        let calls = c.transport().calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.method, HttpMethod::Post);
        assert_eq!(calls[0].1, Duration::from_secs(5));
    }

    #[test]
    fn create_validation_error_is_verbatim() {
        let c = client_with(Canned::new(
            400,
            r#"{"error_message":"validation failure list:\nid in body must be of type uuid: \"1234\""}"#,
        ));
        let err = c.create(None, &account()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "error code: , message: validation failure list:\nid in body must be of type uuid: \"1234\""
        );
    }

    #[test]
    fn caller_deadline_tightens_timeout() {
        let c = client_with(Canned::new(200, &stored_body(2)));
        let ctx = Context::with_timeout(Duration::from_millis(500));
        let fetched = c.fetch(Some(&ctx), ID).unwrap().unwrap();
        assert_eq!(fetched.version, Some(2));
        assert!(c.transport().calls()[0].1 <= Duration::from_millis(500));
    }

    #[test]
    fn no_context_matches_background_context() {
        let c = client_with(Canned::new(404, ""));
        assert!(c.fetch(None, ID).unwrap().is_none());
        assert!(c.fetch(Some(&Context::background()), ID).unwrap().is_none());
        let calls = c.transport().calls();
        assert_eq!(calls[0].1, calls[1].1);
    }

    #[test]
    fn cancelled_context_never_dispatches() {
        let c = client_with(Canned::new(204, ""));
        let (ctx, handle) = Context::background().with_cancel();
        handle.cancel();
        let err = c.delete(Some(&ctx), ID, 0).unwrap_err();
        assert!(matches!(err, ApiError::Transport(TransportError::Cancelled)));
        assert!(c.transport().calls().is_empty());
    }

    #[test]
    fn cancel_during_call_returns_promptly() {
        let c = client_with(Canned::slow(404, "", Duration::from_secs(2)));
        let (ctx, handle) = Context::background().with_cancel();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            handle.cancel();
        });

        let started = std::time::Instant::now();
        let err = c.fetch(Some(&ctx), ID).unwrap_err();
        assert!(matches!(err, ApiError::Transport(TransportError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(1));
        canceller.join().unwrap();
    }

    #[test]
    fn cancellable_context_passes_response_through() {
        let c = client_with(Canned::new(204, ""));
        let (ctx, _handle) = Context::background().with_cancel();
        c.delete(Some(&ctx), ID, 0).unwrap();
        assert_eq!(c.transport().calls().len(), 1);
    }

    #[test]
    fn transport_failure_is_surfaced() {
        let c = client_with(Canned::failing(|| TransportError::Timeout("global".to_string())));
        let err = c.fetch(None, ID).unwrap_err();
        match err {
            ApiError::Transport(inner) => assert!(inner.is_timeout()),
            other => panic!("unexpected error: {other}"),
        }
        assert!(ApiError::Transport(TransportError::Cancelled).is_retryable());
    }

    #[test]
    fn unexpected_status_for_every_operation() {
        let c = client_with(Canned::new(500, "boom"));
        assert!(matches!(
            c.create(None, &account()).unwrap_err(),
            ApiError::UnexpectedStatus { status: 500, .. }
        ));
        assert!(matches!(
            c.fetch(None, ID).unwrap_err(),
            ApiError::UnexpectedStatus { status: 500, .. }
        ));
        let err = c.delete(None, ID, 0).unwrap_err();
        assert_eq!(err.to_string(), "unexpected HTTP status code: 500");
        assert!(!err.is_retryable());
    }
}
