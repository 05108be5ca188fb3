//! HTTP adapter for the relayer.
//!
//! Routes:
//! - `GET /batchdata?sender=&txGas=` previews the ids a new message would get
//! - `POST /submitMessage` validates and queues a signed message
//! - `GET /messageStatus?sender=&batchId=&batchNonce=` reports a message's state
//! - `GET /health` is 200 while the batch scheduler is running

use axum::{
	extract::{rejection::JsonRejection, Query, State},
	http::StatusCode,
	response::Json,
	routing::{get, post},
	Router,
};
use relayer_core::{CoreError, LifecycleManager, RelayerService};
use relayer_types::{
	BatchPreview, BatchPreviewQuery, ErrorResponse, MessageKey, MetaTxRequest, SubmitResponse,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<RelayerService>,
	pub lifecycle: Arc<LifecycleManager>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(err: CoreError) -> ApiError {
	let (status, kind) = match &err {
		CoreError::InvalidMessage(_) => (StatusCode::BAD_REQUEST, "InvalidMessage"),
		CoreError::StorageFailure(_) => (StatusCode::INTERNAL_SERVER_ERROR, "StorageFailure"),
		CoreError::ChainSubmissionFailure(_) => (StatusCode::BAD_GATEWAY, "ChainSubmissionFailure"),
		CoreError::ServiceInit(_) | CoreError::Lifecycle(_) => {
			(StatusCode::SERVICE_UNAVAILABLE, "Unavailable")
		}
	};

	(
		status,
		Json(ErrorResponse {
			error: kind.to_string(),
			message: err.to_string(),
		}),
	)
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/batchdata", get(batch_data))
		.route("/submitMessage", post(submit_message))
		.route("/messageStatus", get(message_status))
		.route("/health", get(health_check))
		.with_state(state)
		.layer(TraceLayer::new_for_http())
		.layer(CorsLayer::permissive())
}

pub async fn start_http_server(state: AppState, port: u16) -> anyhow::Result<()> {
	let app = router(state);
	let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

	info!("HTTP server listening on port {}", port);

	axum::serve(listener, app).await?;

	Ok(())
}

async fn batch_data(
	State(state): State<AppState>,
	Query(query): Query<BatchPreviewQuery>,
) -> Result<Json<BatchPreview>, ApiError> {
	state
		.service
		.preview(query.sender, query.tx_gas)
		.await
		.map(Json)
		.map_err(api_error)
}

async fn submit_message(
	State(state): State<AppState>,
	body: Result<Json<MetaTxRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
	let Json(request) = body.map_err(|rejection| {
		(
			StatusCode::BAD_REQUEST,
			Json(ErrorResponse {
				error: "InvalidMessage".to_string(),
				message: rejection.body_text(),
			}),
		)
	})?;

	let key = state
		.service
		.submit_message(request)
		.await
		.map_err(api_error)?;

	Ok(Json(SubmitResponse {
		accepted: true,
		message: format!(
			"Queued in batch {} with nonce {}",
			key.batch_id, key.batch_nonce
		),
	}))
}

async fn message_status(
	State(state): State<AppState>,
	Query(key): Query<MessageKey>,
) -> Result<Json<serde_json::Value>, ApiError> {
	match state.service.message_state(&key).await {
		Some(message_state) => Ok(Json(serde_json::json!({ "state": message_state }))),
		None => Err((
			StatusCode::NOT_FOUND,
			Json(ErrorResponse {
				error: "NotFound".to_string(),
				message: "No message with that sender, batch id and nonce".to_string(),
			}),
		)),
	}
}

async fn health_check(State(state): State<AppState>) -> StatusCode {
	if state.lifecycle.is_running().await {
		StatusCode::OK
	} else {
		StatusCode::SERVICE_UNAVAILABLE
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::signers::local::PrivateKeySigner;
	use alloy::signers::SignerSync;
	use alloy::sol_types::SolStruct;
	use async_trait::async_trait;
	use axum::body::{to_bytes, Body};
	use axum::http::Request;
	use relayer_core::BatchingSettings;
	use relayer_delivery::{ChainClient, DeliveryError};
	use relayer_storage::implementations::memory::MemoryStorage;
	use relayer_storage::OffchainStore;
	use relayer_types::{Address, Batch, BatchId, BatchReceipt, Bytes, DomainFields, MetaTx, U256};
	use tower::ServiceExt;

	const NOW: u64 = 1_700_000_000;
	const RECEIVER: Address = Address::new([0x5f; 20]);

	struct StubChain;

	#[async_trait]
	impl ChainClient for StubChain {
		fn settlement_address(&self) -> Address {
			RECEIVER
		}

		async fn current_batch_id(&self) -> Result<BatchId, DeliveryError> {
			Ok(0)
		}

		async fn latest_timestamp(&self) -> Result<u64, DeliveryError> {
			Ok(NOW)
		}

		async fn submit_batch(&self, _: &Batch, _: u64) -> Result<BatchReceipt, DeliveryError> {
			Err(DeliveryError::Network("not connected".to_string()))
		}
	}

	async fn app_state() -> AppState {
		let store = OffchainStore::open(Box::new(MemoryStorage::new()))
			.await
			.unwrap();
		let service = RelayerService::new(Arc::new(StubChain), store, BatchingSettings::default())
			.await
			.unwrap();
		AppState {
			service: Arc::new(service),
			lifecycle: Arc::new(LifecycleManager::new()),
		}
	}

	async fn json_body(response: axum::response::Response) -> serde_json::Value {
		let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		serde_json::from_slice(&bytes).unwrap()
	}

	fn get(uri: &str) -> Request<Body> {
		Request::builder().uri(uri).body(Body::empty()).unwrap()
	}

	fn post_json(uri: &str, body: String) -> Request<Body> {
		Request::builder()
			.method("POST")
			.uri(uri)
			.header("content-type", "application/json")
			.body(Body::from(body))
			.unwrap()
	}

	#[tokio::test]
	async fn test_batch_data_preview() {
		let app = router(app_state().await);
		let sender = Address::with_last_byte(1);

		let response = app
			.oneshot(get(&format!("/batchdata?sender={}&txGas=60000", sender)))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);

		let body = json_body(response).await;
		assert_eq!(body["batchId"], 0);
		assert_eq!(body["batchNonce"], 1);
		assert_eq!(
			body["relayerAddress"].as_str().unwrap().to_lowercase(),
			format!("{:#x}", RECEIVER)
		);
	}

	#[tokio::test]
	async fn test_batch_data_rejects_bad_gas() {
		let app = router(app_state().await);
		let sender = Address::with_last_byte(1);

		let response = app
			.oneshot(get(&format!("/batchdata?sender={}&txGas=0", sender)))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
		assert_eq!(json_body(response).await["error"], "InvalidMessage");
	}

	#[tokio::test]
	async fn test_submit_missing_field() {
		let app = router(app_state().await);

		let response = app
			.oneshot(post_json("/submitMessage", "{}".to_string()))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::BAD_REQUEST);

		let body = json_body(response).await;
		assert_eq!(body["error"], "InvalidMessage");
		assert!(body["message"].as_str().unwrap().contains("from"));
	}

	#[tokio::test]
	async fn test_submit_malformed_body() {
		let app = router(app_state().await);

		let response = app
			.oneshot(post_json(
				"/submitMessage",
				r#"{"txGas": "not-a-number"}"#.to_string(),
			))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::BAD_REQUEST);

		let body = json_body(response).await;
		assert_eq!(body["error"], "InvalidMessage");
		assert!(!body["message"].as_str().unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_submit_then_status() {
		let state = app_state().await;
		let signer: PrivateKeySigner =
			"0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d"
				.parse()
				.unwrap();

		let mut tx = MetaTx {
			from: signer.address(),
			to: Address::with_last_byte(0xee),
			token_contract: Address::with_last_byte(0xdd),
			amount: U256::from(10u64),
			expiry: NOW + 600,
			tx_gas: 60_000,
			batch_id: 0,
			batch_nonce: 1,
			signature: Bytes::new(),
			data: Bytes::new(),
			domain: DomainFields {
				name: "Receiver".to_string(),
				version: "1.0.0".to_string(),
				chain_id: 31337,
				verifying_contract: RECEIVER,
			},
		};
		let digest = tx
			.typed_message()
			.eip712_signing_hash(&tx.domain.eip712_domain());
		tx.signature = Bytes::from(signer.sign_hash_sync(&digest).unwrap().as_bytes().to_vec());
		let body = serde_json::to_string(&MetaTxRequest::from(tx)).unwrap();

		let response = router(state.clone())
			.oneshot(post_json("/submitMessage", body))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(json_body(response).await["accepted"], true);

		let response = router(state)
			.oneshot(get(&format!(
				"/messageStatus?sender={}&batchId=0&batchNonce=1",
				signer.address()
			)))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(json_body(response).await["state"], "Queued");
	}

	#[tokio::test]
	async fn test_unknown_message_status() {
		let app = router(app_state().await);

		let response = app
			.oneshot(get(&format!(
				"/messageStatus?sender={}&batchId=0&batchNonce=1",
				Address::with_last_byte(9)
			)))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::NOT_FOUND);
	}

	#[tokio::test]
	async fn test_health_follows_lifecycle() {
		let state = app_state().await;

		let response = router(state.clone()).oneshot(get("/health")).await.unwrap();
		assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

		state.lifecycle.initialize().await.unwrap();
		state.lifecycle.start().await.unwrap();

		let response = router(state).oneshot(get("/health")).await.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
	}
}
