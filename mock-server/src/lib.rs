use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const ACCOUNTS_PATH: &str = "/v1/organisation/accounts";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: String,
    pub organisation_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub data: Account,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_code: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_message: String,
}

pub type Db = Arc<RwLock<HashMap<Uuid, Account>>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route(ACCOUNTS_PATH, post(create_account))
        .route(
            &format!("{ACCOUNTS_PATH}/{{id}}"),
            get(fetch_account).delete(delete_account),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ErrorBody {
        error_code: String::new(),
        error_message: message.into(),
    };
    (status, Json(body)).into_response()
}

/// Field-level failures in the order the API reports them.
pub fn validate(account: &Account) -> Vec<String> {
    let mut failures = Vec::new();
    if Uuid::parse_str(&account.id).is_err() {
        failures.push(format!("id in body must be of type uuid: {:?}", account.id));
    }
    if Uuid::parse_str(&account.organisation_id).is_err() {
        failures.push(format!(
            "organisation_id in body must be of type uuid: {:?}",
            account.organisation_id
        ));
    }
    if account.kind != "accounts" {
        failures.push(format!(
            "type in body should be one of [accounts]: {:?}",
            account.kind
        ));
    }
    let has_name = account
        .attributes
        .as_ref()
        .and_then(|attrs| attrs.get("name"))
        .and_then(Value::as_array)
        .is_some_and(|names| !names.is_empty());
    if !has_name {
        failures.push("attributes.name in body is required".to_string());
    }
    failures
}

async fn create_account(State(db): State<Db>, body: Bytes) -> Response {
    let envelope: Envelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(err) => return error(StatusCode::BAD_REQUEST, format!("invalid request body: {err}")),
    };
    let mut account = envelope.data;

    let failures = validate(&account);
    let id = match Uuid::parse_str(&account.id) {
        Ok(id) if failures.is_empty() => id,
        _ => {
            let message = format!(
                "validation failure list:\nvalidation failure list:\n{}",
                failures.join("\n")
            );
            return error(StatusCode::BAD_REQUEST, message);
        }
    };
    let mut accounts = db.write().await;
    if accounts.contains_key(&id) {
        return error(
            StatusCode::CONFLICT,
            "Account cannot be created as it violates a duplicate constraint",
        );
    }
    account.version = Some(0);
    accounts.insert(id, account.clone());
    tracing::info!(%id, "account created");
    (StatusCode::CREATED, Json(Envelope { data: account })).into_response()
}

async fn fetch_account(State(db): State<Db>, Path(id): Path<String>) -> Response {
    let Ok(id) = Uuid::parse_str(&id) else {
        return error(StatusCode::BAD_REQUEST, "id is not a valid uuid");
    };
    match db.read().await.get(&id) {
        Some(account) => Json(Envelope {
            data: account.clone(),
        })
        .into_response(),
        None => error(StatusCode::NOT_FOUND, format!("record {id} does not exist")),
    }
}

async fn delete_account(
    State(db): State<Db>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Ok(id) = Uuid::parse_str(&id) else {
        return error(StatusCode::BAD_REQUEST, "id is not a valid uuid");
    };
    let Some(version) = params.get("version").and_then(|v| v.parse::<u64>().ok()) else {
        return error(StatusCode::BAD_REQUEST, "invalid version number");
    };

    let mut accounts = db.write().await;
    let Some(account) = accounts.get(&id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if account.version != Some(version) {
        return error(StatusCode::CONFLICT, "invalid version");
    }
    accounts.remove(&id);
    tracing::info!(%id, version, "account deleted");
    StatusCode::NO_CONTENT.into_response()
}
