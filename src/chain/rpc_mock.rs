//! JSON-RPC stubs over wiremock. Responses echo the request id.

use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

enum Reply {
    Result(Value),
    Error(Value),
}

struct JsonRpcReply(Reply);

impl Respond for JsonRpcReply {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let id = serde_json::from_slice::<Value>(&request.body)
            .map(|body| body["id"].clone())
            .unwrap_or(Value::Null);
        let body = match &self.0 {
            Reply::Result(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
            Reply::Error(error) => json!({ "jsonrpc": "2.0", "id": id, "error": error }),
        };
        ResponseTemplate::new(200).set_body_json(body)
    }
}

/// Answers every call of `rpc_method` with `result`.
pub async fn mount_rpc_result(server: &MockServer, rpc_method: &str, result: Value) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(JsonRpcReply(Reply::Result(result)))
        .mount(server)
        .await;
}

/// Answers every call of `rpc_method` with a JSON-RPC error object.
pub async fn mount_rpc_error(server: &MockServer, rpc_method: &str, error: Value) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(JsonRpcReply(Reply::Error(error)))
        .mount(server)
        .await;
}

/// Answers `eth_call`s whose calldata starts with `selector` with ABI-encoded `output`.
pub async fn mount_eth_call(server: &MockServer, selector: [u8; 4], output: Vec<u8>) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_call" })))
        .and(CalldataSelector(selector))
        .respond_with(JsonRpcReply(Reply::Result(json!(
            alloy_primitives::hex::encode_prefixed(output)
        ))))
        .mount(server)
        .await;
}

/// Answers `eth_call`s whose calldata starts with `selector` with a revert carrying `data`.
pub async fn mount_eth_call_revert(server: &MockServer, selector: [u8; 4], data: Vec<u8>) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_call" })))
        .and(CalldataSelector(selector))
        .respond_with(JsonRpcReply(Reply::Error(json!({
            "code": 3,
            "message": "execution reverted",
            "data": alloy_primitives::hex::encode_prefixed(data),
        }))))
        .mount(server)
        .await;
}

/// Matches an `eth_call` by the 4-byte selector of its calldata.
struct CalldataSelector([u8; 4]);

impl wiremock::Match for CalldataSelector {
    fn matches(&self, request: &Request) -> bool {
        let Ok(body) = serde_json::from_slice::<Value>(&request.body) else {
            return false;
        };
        let tx = &body["params"][0];
        let calldata = tx["input"].as_str().or_else(|| tx["data"].as_str());
        let expected = alloy_primitives::hex::encode_prefixed(self.0);
        calldata.is_some_and(|data| data.starts_with(&expected))
    }
}
