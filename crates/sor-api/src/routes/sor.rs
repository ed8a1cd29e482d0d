//! Smart order router routes

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use balancer::{CacheKey, PoolSet, PoolSource, PoolState, SorError, SwapRequest};

use crate::dto::{ApiError, PoolsQuery, PoolsResponse, QuoteRequest, QuoteResponse};
use crate::AppState;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

fn reject(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = StatusCode::from_u16(err.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(err))
}

/// Create SOR routes
pub fn router<S: PoolSource + 'static>() -> Router<AppState<S>> {
    Router::new()
        .route("/quote", post(get_quote::<S>))
        .route("/pools", get(get_pools::<S>))
}

/// POST /sor/quote - Best swap paths for a token pair
async fn get_quote<S: PoolSource + 'static>(
    State(state): State<AppState<S>>,
    Json(request): Json<QuoteRequest>,
) -> ApiResult<QuoteResponse> {
    let request = SwapRequest::try_from(request).map_err(reject)?;
    let result = state
        .router()
        .get_swap_paths(&request)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Quote failed");
            reject(e.into())
        })?;
    Ok(Json(result.into()))
}

/// GET /sor/pools - Simulation state of the eligible pools the router would search
async fn get_pools<S: PoolSource + 'static>(
    State(state): State<AppState<S>>,
    Query(query): Query<PoolsQuery>,
) -> ApiResult<PoolsResponse> {
    let key = CacheKey {
        chain: query.chain,
        protocol_version: query.protocol_version,
        consider_pools_with_hooks: query.consider_pools_with_hooks,
    };
    let snapshot = state
        .router()
        .cache()
        .get(key, None)
        .await
        .map_err(|e| reject(e.into()))?;

    let pools = PoolSet::from_snapshot(&snapshot)
        .and_then(|set| {
            set.pools
                .iter()
                .map(|pool| pool.get_pool_state(query.hook_name.as_deref()))
                .collect::<Result<Vec<PoolState>, SorError>>()
        })
        .map_err(|e| reject(e.into()))?;
    let count = pools.len();
    Ok(Json(PoolsResponse {
        chain: query.chain,
        protocol_version: query.protocol_version,
        pools,
        count,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use balancer::{InMemoryPoolSource, PoolSnapshot};
    use serde_json::{json, Value};
    use sor_core::{AppConfig, Chain, ProtocolVersion};
    use tower::ServiceExt;

    use crate::create_app;

    const TOKEN_A: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const TOKEN_B: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    const TOKEN_C: &str = "0xcccccccccccccccccccccccccccccccccccccccc";

    fn snapshot() -> PoolSnapshot {
        serde_json::from_value(json!({
            "pools": [{
                "id": "weighted-ab",
                "address": "0x0101010101010101010101010101010101010101",
                "chain": "MAINNET",
                "protocolVersion": 3,
                "type": "WEIGHTED",
                "swapFee": "0.01",
                "totalShares": "100000",
                "totalLiquidity": 100000.0,
                "tokens": [
                    {"address": TOKEN_A, "index": 0, "decimals": 6, "balance": "52110", "weight": "0.5"},
                    {"address": TOKEN_B, "index": 1, "decimals": 18, "balance": "51290", "weight": "0.5"}
                ]
            }, {
                "id": "weighted-c",
                "address": "0x0202020202020202020202020202020202020202",
                "chain": "MAINNET",
                "protocolVersion": 3,
                "type": "WEIGHTED",
                "swapFee": "0.01",
                "totalShares": "100000",
                "totalLiquidity": 100000.0,
                "tokens": [
                    {"address": TOKEN_C, "index": 0, "decimals": 18, "balance": "1000", "weight": "0.5"},
                    {"address": "0xdddddddddddddddddddddddddddddddddddddddd", "index": 1, "decimals": 18, "balance": "1000", "weight": "0.5"}
                ]
            }]
        }))
        .unwrap()
    }

    fn app() -> Router {
        let source = InMemoryPoolSource::new()
            .with_snapshot(Chain::Mainnet, ProtocolVersion::V2, PoolSnapshot::default())
            .with_snapshot(Chain::Mainnet, ProtocolVersion::V3, snapshot());
        create_app(AppState::new(AppConfig::default(), source))
    }

    async fn send(request: Request<Body>) -> (StatusCode, Value) {
        send_to(&app(), request).await
    }

    fn quote(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/sor/quote")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send_to(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health_reports_cached_snapshots() {
        let app = app();
        let health = || Request::get("/health").body(Body::empty()).unwrap();

        let (status, body) = send_to(&app, health()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["cacheTtlSecs"], 5);
        assert_eq!(body["cachedSnapshots"].as_array().unwrap().len(), 0);

        send_to(
            &app,
            Request::get("/sor/pools?chain=MAINNET&protocolVersion=3")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        let (_, body) = send_to(&app, health()).await;
        assert_eq!(body["cachedSnapshots"][0]["chain"], "MAINNET");
        assert_eq!(body["cachedSnapshots"][0]["protocolVersion"], 3);
        assert_eq!(body["cachedSnapshots"][0]["considerPoolsWithHooks"], false);
    }

    #[tokio::test]
    async fn test_quote_given_in() {
        let (status, body) = send(quote(json!({
            "chain": "MAINNET",
            "tokenIn": TOKEN_A,
            "tokenOut": TOKEN_B,
            "swapKind": "GivenIn",
            "amount": "1000000000"
        })))
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["protocolVersion"], 3);
        assert_eq!(body["swapKind"], "GivenIn");
        assert_eq!(body["tokenInAmountRaw"], "1000000000");
        assert_eq!(body["paths"][0]["pools"][0], "weighted-ab");
        assert_eq!(body["paths"][0]["tokens"][1]["decimals"], 18);
        assert_ne!(body["returnAmountRaw"], "0");
        // raw amounts are strings
        assert!(body["returnAmountRaw"].is_string());
        assert!(body["priceImpact"]["value"].is_string());
    }

    #[tokio::test]
    async fn test_quote_without_route_is_zero() {
        let (status, body) = send(quote(json!({
            "chain": "MAINNET",
            "tokenIn": TOKEN_A,
            "tokenOut": TOKEN_C,
            "swapKind": "GivenIn",
            "amount": "1000000"
        })))
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["returnAmountRaw"], "0");
        assert_eq!(body["paths"].as_array().unwrap().len(), 1);
        assert_eq!(body["effectivePrice"], "0");
    }

    #[tokio::test]
    async fn test_quote_errors() {
        let (status, body) = send(quote(json!({
            "chain": "MAINNET",
            "tokenIn": TOKEN_A,
            "tokenOut": "0x7777777777777777777777777777777777777777",
            "swapKind": "GivenIn",
            "amount": "1"
        })))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "unknown_token");

        let (status, body) = send(quote(json!({
            "chain": "MAINNET",
            "tokenIn": "not-an-address",
            "tokenOut": TOKEN_B,
            "swapKind": "GivenIn",
            "amount": "1"
        })))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "bad_request");

        // no V2 or V3 snapshot for this chain
        let (status, body) = send(quote(json!({
            "chain": "SONIC",
            "tokenIn": TOKEN_A,
            "tokenOut": TOKEN_B,
            "swapKind": "GivenIn",
            "amount": "1"
        })))
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "snapshot_missing");
    }

    #[tokio::test]
    async fn test_pools_listing() {
        let (status, body) = send(
            Request::get("/sor/pools?chain=MAINNET&protocolVersion=3")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert_eq!(body["pools"][0]["poolId"], "weighted-ab");
        assert_eq!(body["pools"][0]["poolType"], "WEIGHTED");
        assert_eq!(body["pools"][0]["balancesLiveScale18"][0], "52110");
        assert!(body["pools"][0].get("hookType").is_none());

        let (_, body) = send(
            Request::get("/sor/pools?chain=MAINNET&protocolVersion=3&hookName=STABLE_SURGE")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(body["pools"][1]["hookType"], "STABLE_SURGE");
    }
}
