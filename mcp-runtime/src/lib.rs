//! MCP runtime for the Vitalog API.
//!
//! Speaks JSON-RPC 2.0 over two transports: Content-Length framed stdio (the
//! standalone `vitalog-mcp` binary) and HTTP (mounted by the API at `POST
//! /mcp`). Every tool call is planned into a plain API request first, so the
//! mapping from tool arguments to HTTP routes stays a pure function that
//! tests can exercise without a network.

use chrono::{DateTime, NaiveDate, Utc};
use clap::Subcommand;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::io::{self, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use uuid::Uuid;

use vitalog_core::activity::{
    AddActivitiesRequest, ReplaceActivitiesRequest, UpdateActivityRequest,
};
use vitalog_core::concern::{CreateConcernRequest, UpdateConcernRequest};
use vitalog_core::goal::{CreateGoalRequest, UpdateGoalRequest};
use vitalog_core::journal::{AddJournalRequest, UpdateJournalRequest};
use vitalog_core::measurement::{AddMeasurementRequest, UpdateMeasurementRequest};
use vitalog_core::policy::{CreatePolicyRequest, UpdatePolicyRequest};
use vitalog_core::user::{UpdateUserRequest, UpsertUserRequest};

mod util;

use util::{StoredCredentials, client, resolve_token, save_credentials};

const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
const MCP_SERVER_NAME: &str = "vitalog-mcp";

#[derive(Subcommand)]
pub enum McpCommand {
    /// Serve MCP over stdio
    Serve {
        /// Bearer token override (otherwise VITALOG_API_KEY or stored credentials)
        #[arg(long, env = "VITALOG_TOKEN")]
        token: Option<String>,
    },
    /// Print the exposed tool names and descriptions
    Tools,
    /// Store an API token for later stdio sessions
    Login {
        /// Access token issued by the identity provider
        #[arg(long)]
        token: String,
    },
}

pub async fn run(api_url: &str, no_auth: bool, command: McpCommand) -> i32 {
    match command {
        McpCommand::Serve { token } => {
            let server = McpServer::new(McpRuntimeConfig {
                api_url: api_url.to_string(),
                no_auth,
                explicit_token: token,
            });
            match server.serve_stdio().await {
                Ok(()) => 0,
                Err(err) => {
                    eprintln!("{err}");
                    1
                }
            }
        }
        McpCommand::Tools => {
            for tool in tool_definitions() {
                println!("{}\t{}", tool.name, tool.description);
            }
            0
        }
        McpCommand::Login { token } => {
            let creds = StoredCredentials {
                api_url: api_url.to_string(),
                access_token: token,
                expires_at: None,
            };
            match save_credentials(&creds) {
                Ok(()) => {
                    println!("Credentials stored at {}", util::config_path().display());
                    0
                }
                Err(err) => {
                    eprintln!("Failed to store credentials: {err}");
                    1
                }
            }
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct HttpMcpRequestConfig {
    pub token: Option<String>,
}

/// HTTP transport entry point. Each request gets a short-lived server bound
/// to the caller's bearer token; notifications yield no responses.
pub async fn handle_http_jsonrpc(
    api_url: &str,
    config: HttpMcpRequestConfig,
    incoming: Value,
) -> Vec<Value> {
    let server = McpServer::new(McpRuntimeConfig {
        api_url: api_url.to_string(),
        no_auth: false,
        explicit_token: config.token,
    });
    server.handle_incoming_message(incoming).await
}

#[derive(Clone, Debug)]
struct McpRuntimeConfig {
    api_url: String,
    no_auth: bool,
    explicit_token: Option<String>,
}

struct McpServer {
    config: McpRuntimeConfig,
    http: reqwest::Client,
}

impl McpServer {
    fn new(config: McpRuntimeConfig) -> Self {
        Self {
            config,
            http: client(),
        }
    }

    async fn serve_stdio(&self) -> Result<(), String> {
        let stdin = io::stdin();
        let mut reader = BufReader::new(stdin);
        let mut stdout = io::stdout();

        loop {
            let incoming = read_framed_json(&mut reader)
                .await
                .map_err(|e| format!("Failed to read MCP message: {e}"))?;
            let Some(incoming) = incoming else {
                break;
            };

            let responses = self.handle_incoming_message(incoming).await;
            for response in responses {
                write_framed_json(&mut stdout, &response)
                    .await
                    .map_err(|e| format!("Failed to write MCP response: {e}"))?;
            }
        }

        Ok(())
    }

    async fn handle_incoming_message(&self, incoming: Value) -> Vec<Value> {
        let mut responses = Vec::new();

        if let Some(batch) = incoming.as_array() {
            if batch.is_empty() {
                responses.push(error_response(
                    Value::Null,
                    RpcError::invalid_request("Batch request must not be empty"),
                ));
                return responses;
            }
            for item in batch {
                if let Some(response) = self.handle_single_message(item.clone()).await {
                    responses.push(response);
                }
            }
            return responses;
        }

        if let Some(response) = self.handle_single_message(incoming).await {
            responses.push(response);
        }
        responses
    }

    async fn handle_single_message(&self, incoming: Value) -> Option<Value> {
        let Some(obj) = incoming.as_object() else {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            let id = obj.get("id").cloned().unwrap_or(Value::Null);
            return Some(error_response(
                id,
                RpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }

        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            // Most likely a client response; this server issues no outbound requests.
            return None;
        };

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        if let Some(id) = obj.get("id").cloned() {
            let result = self.handle_request(method, params).await;
            Some(match result {
                Ok(payload) => success_response(id, payload),
                Err(err) => error_response(id, err),
            })
        } else {
            // Notifications (initialized, cancelled, anything else) are ignored.
            None
        }
    }

    async fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(initialize_payload()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(tools_list_payload()),
            "tools/call" => self.handle_tools_call(params).await,
            "resources/list" => Ok(json!({ "resources": [] })),
            "prompts/list" => Ok(json!({ "prompts": [] })),
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    async fn handle_tools_call(&self, params: Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("tools/call params must be an object"))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires string field 'name'"))?;

        let args = match params.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(RpcError::invalid_params(
                    "tools/call 'arguments' must be an object",
                ));
            }
        };

        let plan = match plan_tool_call(name, args) {
            Ok(plan) => plan,
            Err(err) => return Ok(build_tool_call_response(err.to_envelope(), true)),
        };

        match self.send_api_request(plan).await {
            Ok(result) => {
                let is_error = !result.is_success();
                Ok(build_tool_call_response(
                    envelope_from_api_result(&result),
                    is_error,
                ))
            }
            Err(err) => Ok(build_tool_call_response(err.to_envelope(), true)),
        }
    }

    async fn send_api_request(&self, plan: ApiCallPlan) -> Result<ApiCallResult, ToolError> {
        let mut url = reqwest::Url::parse(&format!(
            "{}{}",
            self.config.api_url.trim_end_matches('/'),
            plan.path
        ))
        .map_err(|e| ToolError::internal(format!("Invalid API URL/path: {e}")))?;
        if !plan.query.is_empty() {
            let mut qp = url.query_pairs_mut();
            for (k, v) in &plan.query {
                qp.append_pair(k, v);
            }
        }

        let mut request = self.http.request(plan.method, url);
        if !self.config.no_auth {
            let token = self.resolve_bearer_token()?;
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        if let Some(body) = plan.body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| {
            ToolError::internal(format!(
                "Failed to reach Vitalog API at {}: {e}",
                self.config.api_url
            ))
        })?;

        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ToolError::internal(format!("Failed to read API response body: {e}")))?;

        Ok(ApiCallResult {
            status,
            body: parse_response_body(&bytes),
        })
    }

    fn resolve_bearer_token(&self) -> Result<String, ToolError> {
        if let Some(token) = &self.config.explicit_token {
            return Ok(token.clone());
        }
        resolve_token().map_err(|e| ToolError {
            error_type: "AuthenticationError",
            message: e.to_string(),
        })
    }
}

#[derive(Debug)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
        }
    }

    fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {method}"),
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
        }
    }
}

/// A tool failure surfaced inside the MCP result envelope rather than as a
/// JSON-RPC error, so agents see it in-band like any API error.
#[derive(Debug, Clone)]
struct ToolError {
    error_type: &'static str,
    message: String,
}

impl ToolError {
    fn validation(message: impl Into<String>) -> Self {
        Self {
            error_type: "ValidationError",
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            error_type: "InternalError",
            message: message.into(),
        }
    }

    fn to_envelope(&self) -> Value {
        json!({
            "success": false,
            "error": self.message,
            "errorType": self.error_type
        })
    }
}

#[derive(Debug)]
struct ApiCallResult {
    status: u16,
    body: Value,
}

impl ApiCallResult {
    fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }
}

fn envelope_from_api_result(result: &ApiCallResult) -> Value {
    if result.is_success() {
        return json!({
            "success": true,
            "data": result.body
        });
    }

    let message = result
        .body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("API request failed");
    let code = result
        .body
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("internal_error");

    json!({
        "success": false,
        "error": message,
        "errorType": error_type_for_code(code)
    })
}

fn error_type_for_code(code: &str) -> &'static str {
    match code {
        "validation_failed" => "ValidationError",
        "not_found" => "ResourceNotFoundError",
        "unauthorized" => "AuthenticationError",
        "database_error" => "DatabaseError",
        _ => "InternalError",
    }
}

fn build_tool_call_response(envelope: Value, is_error: bool) -> Value {
    let text = to_pretty_json(&envelope);
    if is_error {
        json!({
            "isError": true,
            "content": [{ "type": "text", "text": text }],
            "structuredContent": envelope
        })
    } else {
        json!({
            "content": [{ "type": "text", "text": text }],
            "structuredContent": envelope
        })
    }
}

fn initialize_payload() -> Value {
    json!({
        "protocolVersion": MCP_PROTOCOL_VERSION,
        "capabilities": {
            "tools": { "listChanged": false },
            "resources": { "listChanged": false },
            "prompts": { "listChanged": false }
        },
        "serverInfo": {
            "name": MCP_SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        },
        "instructions": "Tools for one user's health data: profile, goals, policies, \
                         concerns, daily activities, body measurements, and journals. \
                         All reads and writes are scoped to the authenticated user. \
                         Dates are YYYY-MM-DD, entry times are HH:MM, timestamps are \
                         RFC 3339."
    })
}

fn tools_list_payload() -> Value {
    let tools: Vec<Value> = tool_definitions()
        .into_iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "inputSchema": tool.input_schema,
            })
        })
        .collect();
    json!({ "tools": tools })
}

#[derive(Debug, PartialEq)]
struct ApiCallPlan {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
}

impl ApiCallPlan {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    fn with_query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }
}

// Selector arguments that name the record a tool operates on. The remainder
// of the arguments map is the request body and is validated separately.

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct EmptyArgs {}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct GoalIdArgs {
    goal_id: Uuid,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PolicyIdArgs {
    policy_id: Uuid,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConcernIdArgs {
    concern_id: Uuid,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DateArgs {
    date: NaiveDate,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DateTimeArgs {
    date: NaiveDate,
    time: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct DateRangeArgs {
    start_date: NaiveDate,
    end_date: NaiveDate,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct MeasurementTimeArgs {
    measurement_time: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConcernFilterArgs {
    status: Option<String>,
    category: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct HistoryArgs {
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    limit: Option<i64>,
}

fn parse_args<T: serde::de::DeserializeOwned>(tool: &str, args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args)
        .map_err(|e| ToolError::validation(format!("Invalid arguments for {tool}: {e}")))
}

fn split_off(args: &mut Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    let mut taken = Map::new();
    for key in keys {
        if let Some(value) = args.remove(*key) {
            taken.insert((*key).to_string(), value);
        }
    }
    taken
}

fn require_non_empty_update(is_empty: bool) -> Result<(), ToolError> {
    if is_empty {
        return Err(ToolError::validation(
            "At least one field must be provided",
        ));
    }
    Ok(())
}

/// Maps a tool call to the API request it performs. Pure: argument shapes
/// are checked here (unknown fields rejected), everything stateful happens
/// in `send_api_request`.
fn plan_tool_call(name: &str, mut args: Map<String, Value>) -> Result<ApiCallPlan, ToolError> {
    match name {
        "AddUser" => {
            parse_args::<UpsertUserRequest>(name, Value::Object(args.clone()))?;
            Ok(ApiCallPlan::new(Method::PUT, "/v1/users").with_body(Value::Object(args)))
        }
        "UpdateUser" => {
            let req: UpdateUserRequest = parse_args(name, Value::Object(args.clone()))?;
            require_non_empty_update(req.is_empty())?;
            Ok(ApiCallPlan::new(Method::PATCH, "/v1/users").with_body(Value::Object(args)))
        }
        "GetUser" => {
            parse_args::<EmptyArgs>(name, Value::Object(args))?;
            Ok(ApiCallPlan::new(Method::GET, "/v1/users"))
        }

        "AddGoal" => {
            parse_args::<CreateGoalRequest>(name, Value::Object(args.clone()))?;
            Ok(ApiCallPlan::new(Method::POST, "/v1/goals").with_body(Value::Object(args)))
        }
        "UpdateGoal" => {
            let selector = split_off(&mut args, &["goalId"]);
            let id: GoalIdArgs = parse_args(name, Value::Object(selector))?;
            let req: UpdateGoalRequest = parse_args(name, Value::Object(args.clone()))?;
            require_non_empty_update(req.is_empty())?;
            Ok(
                ApiCallPlan::new(Method::PATCH, format!("/v1/goals/{}", id.goal_id))
                    .with_body(Value::Object(args)),
            )
        }
        "DeleteGoal" => {
            let id: GoalIdArgs = parse_args(name, Value::Object(args))?;
            Ok(ApiCallPlan::new(
                Method::DELETE,
                format!("/v1/goals/{}", id.goal_id),
            ))
        }
        "GetGoals" => {
            parse_args::<EmptyArgs>(name, Value::Object(args))?;
            Ok(ApiCallPlan::new(Method::GET, "/v1/goals"))
        }

        "AddPolicy" => {
            parse_args::<CreatePolicyRequest>(name, Value::Object(args.clone()))?;
            Ok(ApiCallPlan::new(Method::POST, "/v1/policies").with_body(Value::Object(args)))
        }
        "UpdatePolicy" => {
            let selector = split_off(&mut args, &["policyId"]);
            let id: PolicyIdArgs = parse_args(name, Value::Object(selector))?;
            let req: UpdatePolicyRequest = parse_args(name, Value::Object(args.clone()))?;
            require_non_empty_update(req.is_empty())?;
            Ok(
                ApiCallPlan::new(Method::PATCH, format!("/v1/policies/{}", id.policy_id))
                    .with_body(Value::Object(args)),
            )
        }
        "DeletePolicy" => {
            let id: PolicyIdArgs = parse_args(name, Value::Object(args))?;
            Ok(ApiCallPlan::new(
                Method::DELETE,
                format!("/v1/policies/{}", id.policy_id),
            ))
        }
        "GetPolicies" => {
            parse_args::<EmptyArgs>(name, Value::Object(args))?;
            Ok(ApiCallPlan::new(Method::GET, "/v1/policies"))
        }

        "AddConcern" => {
            parse_args::<CreateConcernRequest>(name, Value::Object(args.clone()))?;
            Ok(ApiCallPlan::new(Method::POST, "/v1/concerns").with_body(Value::Object(args)))
        }
        "UpdateConcern" => {
            let selector = split_off(&mut args, &["concernId"]);
            let id: ConcernIdArgs = parse_args(name, Value::Object(selector))?;
            let req: UpdateConcernRequest = parse_args(name, Value::Object(args.clone()))?;
            require_non_empty_update(req.is_empty())?;
            Ok(
                ApiCallPlan::new(Method::PATCH, format!("/v1/concerns/{}", id.concern_id))
                    .with_body(Value::Object(args)),
            )
        }
        "DeleteConcern" => {
            let id: ConcernIdArgs = parse_args(name, Value::Object(args))?;
            Ok(ApiCallPlan::new(
                Method::DELETE,
                format!("/v1/concerns/{}", id.concern_id),
            ))
        }
        "GetConcerns" => {
            let filter: ConcernFilterArgs = parse_args(name, Value::Object(args))?;
            let mut plan = ApiCallPlan::new(Method::GET, "/v1/concerns");
            if let Some(status) = filter.status {
                plan = plan.with_query("status", status);
            }
            if let Some(category) = filter.category {
                plan = plan.with_query("category", category);
            }
            Ok(plan)
        }

        "AddActivities" => {
            let selector = split_off(&mut args, &["date"]);
            let date: DateArgs = parse_args(name, Value::Object(selector))?;
            parse_args::<AddActivitiesRequest>(name, Value::Object(args.clone()))?;
            Ok(
                ApiCallPlan::new(Method::POST, format!("/v1/activities/{}", date.date))
                    .with_body(Value::Object(args)),
            )
        }
        "UpdateActivities" => {
            let selector = split_off(&mut args, &["date"]);
            let date: DateArgs = parse_args(name, Value::Object(selector))?;
            parse_args::<ReplaceActivitiesRequest>(name, Value::Object(args.clone()))?;
            Ok(
                ApiCallPlan::new(Method::PUT, format!("/v1/activities/{}", date.date))
                    .with_body(Value::Object(args)),
            )
        }
        "UpdateActivity" => {
            let selector = split_off(&mut args, &["date", "time"]);
            let key: DateTimeArgs = parse_args(name, Value::Object(selector))?;
            let req: UpdateActivityRequest = parse_args(name, Value::Object(args.clone()))?;
            require_non_empty_update(req.is_empty())?;
            Ok(ApiCallPlan::new(
                Method::PATCH,
                format!("/v1/activities/{}/{}", key.date, key.time),
            )
            .with_body(Value::Object(args)))
        }
        "DeleteActivity" => {
            let key: DateTimeArgs = parse_args(name, Value::Object(args))?;
            Ok(ApiCallPlan::new(
                Method::DELETE,
                format!("/v1/activities/{}/{}", key.date, key.time),
            ))
        }
        "GetActivities" => {
            let date: DateArgs = parse_args(name, Value::Object(args))?;
            Ok(ApiCallPlan::new(
                Method::GET,
                format!("/v1/activities/{}", date.date),
            ))
        }
        "GetActivitiesInRange" => {
            let range: DateRangeArgs = parse_args(name, Value::Object(args))?;
            Ok(ApiCallPlan::new(Method::GET, "/v1/activities")
                .with_query("start_date", range.start_date)
                .with_query("end_date", range.end_date))
        }

        "AddBodyMeasurement" => {
            let req: AddMeasurementRequest = parse_args(name, Value::Object(args.clone()))?;
            if !req.has_any_field() {
                return Err(ToolError::validation(
                    "At least one measurement field must be provided",
                ));
            }
            Ok(ApiCallPlan::new(Method::POST, "/v1/measurements").with_body(Value::Object(args)))
        }
        "UpdateBodyMeasurement" => {
            let selector = split_off(&mut args, &["measurementTime"]);
            let at: MeasurementTimeArgs = parse_args(name, Value::Object(selector))?;
            let req: UpdateMeasurementRequest = parse_args(name, Value::Object(args.clone()))?;
            require_non_empty_update(req.is_empty())?;
            Ok(ApiCallPlan::new(
                Method::PATCH,
                format!("/v1/measurements/{}", at.measurement_time.to_rfc3339()),
            )
            .with_body(Value::Object(args)))
        }
        "DeleteBodyMeasurement" => {
            let at: MeasurementTimeArgs = parse_args(name, Value::Object(args))?;
            Ok(ApiCallPlan::new(
                Method::DELETE,
                format!("/v1/measurements/{}", at.measurement_time.to_rfc3339()),
            ))
        }
        "GetLatestMeasurements" => {
            parse_args::<EmptyArgs>(name, Value::Object(args))?;
            Ok(ApiCallPlan::new(Method::GET, "/v1/measurements/latest"))
        }
        "GetOldestMeasurements" => {
            parse_args::<EmptyArgs>(name, Value::Object(args))?;
            Ok(ApiCallPlan::new(Method::GET, "/v1/measurements/oldest"))
        }
        "GetMeasurementHistory" => {
            let history: HistoryArgs = parse_args(name, Value::Object(args))?;
            let mut plan = ApiCallPlan::new(Method::GET, "/v1/measurements");
            if let Some(start) = history.start_time {
                plan = plan.with_query("start", start.to_rfc3339());
            }
            if let Some(end) = history.end_time {
                plan = plan.with_query("end", end.to_rfc3339());
            }
            if let Some(limit) = history.limit {
                plan = plan.with_query("limit", limit);
            }
            Ok(plan)
        }

        "AddJournal" => {
            parse_args::<AddJournalRequest>(name, Value::Object(args.clone()))?;
            Ok(ApiCallPlan::new(Method::POST, "/v1/journals").with_body(Value::Object(args)))
        }
        "GetJournal" => {
            let date: DateArgs = parse_args(name, Value::Object(args))?;
            Ok(ApiCallPlan::new(
                Method::GET,
                format!("/v1/journals/{}", date.date),
            ))
        }
        "GetJournalsInRange" => {
            let range: DateRangeArgs = parse_args(name, Value::Object(args))?;
            Ok(ApiCallPlan::new(Method::GET, "/v1/journals")
                .with_query("start_date", range.start_date)
                .with_query("end_date", range.end_date))
        }
        "UpdateJournal" => {
            let selector = split_off(&mut args, &["date"]);
            let date: DateArgs = parse_args(name, Value::Object(selector))?;
            let req: UpdateJournalRequest = parse_args(name, Value::Object(args.clone()))?;
            require_non_empty_update(req.is_empty())?;
            Ok(
                ApiCallPlan::new(Method::PUT, format!("/v1/journals/{}", date.date))
                    .with_body(Value::Object(args)),
            )
        }
        "DeleteJournal" => {
            let date: DateArgs = parse_args(name, Value::Object(args))?;
            Ok(ApiCallPlan::new(
                Method::DELETE,
                format!("/v1/journals/{}", date.date),
            ))
        }

        _ => Err(ToolError::validation(format!("Unknown tool: {name}"))),
    }
}

#[derive(Debug)]
struct ToolDefinition {
    name: &'static str,
    description: &'static str,
    input_schema: Value,
}

fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "AddUser",
            description: "Create the user's profile, or refresh it if it already exists.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "username": { "type": "string" },
                    "email": { "type": "string" },
                    "dateOfBirth": { "type": "string", "format": "date" }
                },
                "required": ["username"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "UpdateUser",
            description: "Change profile fields; anything not supplied is left as is.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "username": { "type": "string" },
                    "email": { "type": "string" },
                    "dateOfBirth": { "type": "string", "format": "date" }
                },
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "GetUser",
            description: "Fetch the authenticated user's profile.",
            input_schema: empty_schema(),
        },
        ToolDefinition {
            name: "AddGoal",
            description: "Create a health goal (fitness, weight, longevity, mental_health, other).",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "goalType": { "type": "string", "enum": ["longevity", "fitness", "weight", "mental_health", "other"] },
                    "title": { "type": "string" },
                    "description": { "type": "string" },
                    "targetValue": { "type": "number" },
                    "targetDate": { "type": "string", "format": "date" },
                    "priority": { "type": "integer", "minimum": 1, "maximum": 5 }
                },
                "required": ["goalType", "title"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "UpdateGoal",
            description: "Change fields of an existing goal, including its status.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "goalId": { "type": "string", "format": "uuid" },
                    "title": { "type": "string" },
                    "description": { "type": "string" },
                    "targetValue": { "type": "number" },
                    "targetDate": { "type": "string", "format": "date" },
                    "priority": { "type": "integer", "minimum": 1, "maximum": 5 },
                    "status": { "type": "string", "enum": ["active", "achieved", "paused", "cancelled"] }
                },
                "required": ["goalId"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "DeleteGoal",
            description: "Delete a goal by id.",
            input_schema: id_schema("goalId"),
        },
        ToolDefinition {
            name: "GetGoals",
            description: "List all of the user's goals, newest first.",
            input_schema: empty_schema(),
        },
        ToolDefinition {
            name: "AddPolicy",
            description: "Create a standing health policy (diet, exercise, sleep, fasting, restriction, other).",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "policyType": { "type": "string", "enum": ["diet", "exercise", "sleep", "fasting", "restriction", "other"] },
                    "title": { "type": "string" },
                    "description": { "type": "string" },
                    "rules": { "type": "object" },
                    "isActive": { "type": "boolean" },
                    "startDate": { "type": "string", "format": "date" },
                    "endDate": { "type": "string", "format": "date" }
                },
                "required": ["policyType", "title"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "UpdatePolicy",
            description: "Change fields of an existing policy, including activating or retiring it.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "policyId": { "type": "string", "format": "uuid" },
                    "title": { "type": "string" },
                    "description": { "type": "string" },
                    "rules": { "type": "object" },
                    "isActive": { "type": "boolean" },
                    "startDate": { "type": "string", "format": "date" },
                    "endDate": { "type": "string", "format": "date" }
                },
                "required": ["policyId"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "DeletePolicy",
            description: "Delete a policy by id.",
            input_schema: id_schema("policyId"),
        },
        ToolDefinition {
            name: "GetPolicies",
            description: "List all of the user's policies, newest first.",
            input_schema: empty_schema(),
        },
        ToolDefinition {
            name: "AddConcern",
            description: "Record a health concern with one or more categories (PHYSICAL, MENTAL).",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "description": { "type": "string" },
                    "category": { "type": "array", "items": { "type": "string", "enum": ["PHYSICAL", "MENTAL"] } },
                    "severity": { "type": "integer", "minimum": 1, "maximum": 5 },
                    "triggers": { "type": "string" },
                    "history": { "type": "string" }
                },
                "required": ["title", "category"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "UpdateConcern",
            description: "Change fields of an existing concern, including its status.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "concernId": { "type": "string", "format": "uuid" },
                    "title": { "type": "string" },
                    "description": { "type": "string" },
                    "category": { "type": "array", "items": { "type": "string", "enum": ["PHYSICAL", "MENTAL"] } },
                    "severity": { "type": "integer", "minimum": 1, "maximum": 5 },
                    "status": { "type": "string", "enum": ["ACTIVE", "IMPROVED", "RESOLVED"] },
                    "triggers": { "type": "string" },
                    "history": { "type": "string" }
                },
                "required": ["concernId"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "DeleteConcern",
            description: "Delete a concern by id.",
            input_schema: id_schema("concernId"),
        },
        ToolDefinition {
            name: "GetConcerns",
            description: "List concerns, optionally filtered by status and/or category.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "status": { "type": "string", "enum": ["ACTIVE", "IMPROVED", "RESOLVED"] },
                    "category": { "type": "string", "enum": ["PHYSICAL", "MENTAL"] }
                },
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "AddActivities",
            description: "Append activity entries to a day's log. Entries are keyed by their HH:MM time.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "date": { "type": "string", "format": "date" },
                    "activities": { "type": "array", "items": activity_entry_schema() }
                },
                "required": ["date", "activities"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "UpdateActivities",
            description: "Replace a day's activity log wholesale.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "date": { "type": "string", "format": "date" },
                    "activities": { "type": "array", "items": activity_entry_schema() }
                },
                "required": ["date", "activities"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "UpdateActivity",
            description: "Patch one activity entry, addressed by date and HH:MM time.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "date": { "type": "string", "format": "date" },
                    "time": { "type": "string", "pattern": "^([01][0-9]|2[0-3]):[0-5][0-9]$" },
                    "activityType": { "type": "string" },
                    "description": { "type": "string" },
                    "items": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["date", "time"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "DeleteActivity",
            description: "Remove one activity entry; deleting the last entry removes the day.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "date": { "type": "string", "format": "date" },
                    "time": { "type": "string", "pattern": "^([01][0-9]|2[0-3]):[0-5][0-9]$" }
                },
                "required": ["date", "time"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "GetActivities",
            description: "Fetch the activity log for one day.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "date": { "type": "string", "format": "date" }
                },
                "required": ["date"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "GetActivitiesInRange",
            description: "Fetch activity logs for an inclusive date range (at most a year).",
            input_schema: date_range_schema(),
        },
        ToolDefinition {
            name: "AddBodyMeasurement",
            description: "Record weight (kg), height (cm) and/or body fat (%) at a point in time.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "measurementTime": { "type": "string", "format": "date-time" },
                    "weight": { "type": "number" },
                    "height": { "type": "number" },
                    "bodyFatPercentage": { "type": "number" }
                },
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "UpdateBodyMeasurement",
            description: "Change the fields of a measurement addressed by its timestamp.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "measurementTime": { "type": "string", "format": "date-time" },
                    "weight": { "type": "number" },
                    "height": { "type": "number" },
                    "bodyFatPercentage": { "type": "number" }
                },
                "required": ["measurementTime"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "DeleteBodyMeasurement",
            description: "Delete a measurement addressed by its timestamp.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "measurementTime": { "type": "string", "format": "date-time" }
                },
                "required": ["measurementTime"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "GetLatestMeasurements",
            description: "Most recent value per measurement field, each with its own timestamp.",
            input_schema: empty_schema(),
        },
        ToolDefinition {
            name: "GetOldestMeasurements",
            description: "Earliest value per measurement field, each with its own timestamp.",
            input_schema: empty_schema(),
        },
        ToolDefinition {
            name: "GetMeasurementHistory",
            description: "Raw measurement records, newest first, with optional time bounds and limit.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "startTime": { "type": "string", "format": "date-time" },
                    "endTime": { "type": "string", "format": "date-time" },
                    "limit": { "type": "integer", "minimum": 1, "maximum": 1000 }
                },
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "AddJournal",
            description: "Write a journal entry for a date (defaults to today); writing again the same day appends.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "date": { "type": "string", "format": "date", "description": "Defaults to today when omitted." },
                    "content": { "type": "string" },
                    "moodScore": { "type": "integer", "minimum": 1, "maximum": 5 },
                    "tags": { "type": "array", "items": { "type": "string" }, "maxItems": 10 }
                },
                "required": ["content"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "GetJournal",
            description: "Fetch the journal entry for one date.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "date": { "type": "string", "format": "date" }
                },
                "required": ["date"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "GetJournalsInRange",
            description: "Journal entries for an inclusive date range (at most a year), ascending.",
            input_schema: date_range_schema(),
        },
        ToolDefinition {
            name: "UpdateJournal",
            description: "Replace fields of a journal entry; an empty tags array clears the tags.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "date": { "type": "string", "format": "date" },
                    "content": { "type": "string" },
                    "moodScore": { "type": "integer", "minimum": 1, "maximum": 5 },
                    "tags": { "type": "array", "items": { "type": "string" }, "maxItems": 10 }
                },
                "required": ["date"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "DeleteJournal",
            description: "Delete the journal entry for one date.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "date": { "type": "string", "format": "date" }
                },
                "required": ["date"],
                "additionalProperties": false
            }),
        },
    ]
}

fn empty_schema() -> Value {
    json!({
        "type": "object",
        "properties": {},
        "additionalProperties": false
    })
}

fn id_schema(key: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            key: { "type": "string", "format": "uuid" }
        },
        "required": [key],
        "additionalProperties": false
    })
}

fn date_range_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "startDate": { "type": "string", "format": "date" },
            "endDate": { "type": "string", "format": "date" }
        },
        "required": ["startDate", "endDate"],
        "additionalProperties": false
    })
}

fn activity_entry_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "time": { "type": "string", "pattern": "^([01][0-9]|2[0-3]):[0-5][0-9]$" },
            "activityType": { "type": "string" },
            "description": { "type": "string" },
            "items": {
                "oneOf": [
                    { "type": "string" },
                    { "type": "array", "items": { "type": "string" } }
                ]
            }
        },
        "required": ["time", "activityType"],
        "additionalProperties": false
    })
}

fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn error_response(id: Value, error: RpcError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    })
}

fn parse_response_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

async fn read_framed_json(
    reader: &mut BufReader<tokio::io::Stdin>,
) -> Result<Option<Value>, std::io::Error> {
    let mut content_length: Option<usize> = None;

    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            if content_length.is_none() {
                return Ok(None);
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Unexpected EOF while reading MCP headers",
            ));
        }

        if line == "\r\n" {
            break;
        }

        let line = line.trim_end_matches(['\r', '\n']);
        if line.to_ascii_lowercase().starts_with("content-length:") {
            let raw_len = line
                .split_once(':')
                .map(|(_, right)| right.trim())
                .unwrap_or_default();
            let parsed = raw_len.parse::<usize>().map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "Invalid Content-Length header",
                )
            })?;
            content_length = Some(parsed);
        }
    }

    let content_length = content_length.ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "Missing Content-Length header",
        )
    })?;
    let mut payload = vec![0_u8; content_length];
    reader.read_exact(&mut payload).await?;

    let json: Value = serde_json::from_slice(&payload).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Invalid JSON payload: {e}"),
        )
    })?;
    Ok(Some(json))
}

async fn write_framed_json(
    writer: &mut tokio::io::Stdout,
    value: &Value,
) -> Result<(), std::io::Error> {
    let body = serde_json::to_vec(value).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to serialize JSON: {e}"),
        )
    })?;
    let header = format!(
        "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n",
        body.len()
    );
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

fn to_pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn server() -> McpServer {
        McpServer::new(McpRuntimeConfig {
            api_url: "http://localhost:3000".to_string(),
            no_auth: true,
            explicit_token: None,
        })
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn tool_definitions_are_complete_and_unique() {
        let tools = tool_definitions();
        assert_eq!(tools.len(), 32);

        let mut names: Vec<&str> = tools.iter().map(|t| t.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 32);

        for expected in [
            "AddUser",
            "GetActivitiesInRange",
            "GetLatestMeasurements",
            "UpdateJournal",
            "DeleteConcern",
        ] {
            assert!(names.contains(&expected), "missing tool {expected}");
        }
    }

    #[test]
    fn every_tool_name_dispatches() {
        // Minimal valid arguments per tool; a failure to plan here means the
        // definition and the dispatcher disagree.
        let uuid = "0190a8a0-0000-7000-8000-000000000000";
        let samples: Vec<(&str, Value)> = vec![
            ("AddUser", json!({"username": "maya"})),
            ("UpdateUser", json!({"email": "maya@example.com"})),
            ("GetUser", json!({})),
            ("AddGoal", json!({"goalType": "fitness", "title": "Run 5k"})),
            ("UpdateGoal", json!({"goalId": uuid, "status": "achieved"})),
            ("DeleteGoal", json!({"goalId": uuid})),
            ("GetGoals", json!({})),
            ("AddPolicy", json!({"policyType": "sleep", "title": "Lights out by 23:00"})),
            ("UpdatePolicy", json!({"policyId": uuid, "isActive": false})),
            ("DeletePolicy", json!({"policyId": uuid})),
            ("GetPolicies", json!({})),
            ("AddConcern", json!({"title": "Lower back pain", "category": ["PHYSICAL"]})),
            ("UpdateConcern", json!({"concernId": uuid, "status": "IMPROVED"})),
            ("DeleteConcern", json!({"concernId": uuid})),
            ("GetConcerns", json!({"status": "ACTIVE"})),
            (
                "AddActivities",
                json!({"date": "2026-03-01", "activities": [{"time": "07:30", "activityType": "exercise"}]}),
            ),
            (
                "UpdateActivities",
                json!({"date": "2026-03-01", "activities": [{"time": "07:30", "activityType": "exercise"}]}),
            ),
            (
                "UpdateActivity",
                json!({"date": "2026-03-01", "time": "07:30", "description": "Morning run"}),
            ),
            ("DeleteActivity", json!({"date": "2026-03-01", "time": "07:30"})),
            ("GetActivities", json!({"date": "2026-03-01"})),
            (
                "GetActivitiesInRange",
                json!({"startDate": "2026-03-01", "endDate": "2026-03-07"}),
            ),
            ("AddBodyMeasurement", json!({"weight": 70.5})),
            (
                "UpdateBodyMeasurement",
                json!({"measurementTime": "2026-03-01T08:00:00Z", "weight": 69.8}),
            ),
            (
                "DeleteBodyMeasurement",
                json!({"measurementTime": "2026-03-01T08:00:00Z"}),
            ),
            ("GetLatestMeasurements", json!({})),
            ("GetOldestMeasurements", json!({})),
            ("GetMeasurementHistory", json!({"limit": 10})),
            ("AddJournal", json!({"date": "2026-03-01", "content": "Slept well."})),
            ("GetJournal", json!({"date": "2026-03-01"})),
            (
                "GetJournalsInRange",
                json!({"startDate": "2026-03-01", "endDate": "2026-03-07"}),
            ),
            ("UpdateJournal", json!({"date": "2026-03-01", "moodScore": 4})),
            ("DeleteJournal", json!({"date": "2026-03-01"})),
        ];
        assert_eq!(samples.len(), 32);

        for (name, value) in samples {
            let result = plan_tool_call(name, args(value));
            assert!(result.is_ok(), "{name} failed to plan: {result:?}");
        }
    }

    #[test]
    fn plan_rejects_unknown_tool() {
        let err = plan_tool_call("ResetDatabase", Map::new()).unwrap_err();
        assert!(err.message.contains("ResetDatabase"));
        assert_eq!(err.error_type, "ValidationError");
    }

    #[test]
    fn plan_rejects_unknown_argument_field() {
        let err = plan_tool_call(
            "AddGoal",
            args(json!({"goalType": "fitness", "title": "Run", "urgency": "high"})),
        )
        .unwrap_err();
        assert_eq!(err.error_type, "ValidationError");
        assert!(err.message.contains("urgency"));
    }

    #[test]
    fn plan_rejects_empty_update() {
        let err = plan_tool_call(
            "UpdateGoal",
            args(json!({"goalId": "0190a8a0-0000-7000-8000-000000000000"})),
        )
        .unwrap_err();
        assert!(err.message.contains("At least one field"));
    }

    #[test]
    fn update_goal_plan_targets_the_goal_and_strips_the_selector() {
        let plan = plan_tool_call(
            "UpdateGoal",
            args(json!({
                "goalId": "0190a8a0-0000-7000-8000-000000000000",
                "priority": 1
            })),
        )
        .unwrap();

        assert_eq!(plan.method, Method::PATCH);
        assert_eq!(
            plan.path,
            "/v1/goals/0190a8a0-0000-7000-8000-000000000000"
        );
        assert_eq!(plan.body, Some(json!({"priority": 1})));
    }

    #[test]
    fn add_journal_plan_allows_date_to_default() {
        let plan = plan_tool_call("AddJournal", args(json!({"content": "Slept well."}))).unwrap();
        assert_eq!(plan.method, Method::POST);
        assert_eq!(plan.path, "/v1/journals");
        assert_eq!(plan.body, Some(json!({"content": "Slept well."})));
    }

    #[test]
    fn delete_activity_plan_addresses_date_and_time() {
        let plan = plan_tool_call(
            "DeleteActivity",
            args(json!({"date": "2026-03-01", "time": "07:30"})),
        )
        .unwrap();
        assert_eq!(plan.method, Method::DELETE);
        assert_eq!(plan.path, "/v1/activities/2026-03-01/07:30");
    }

    #[test]
    fn measurement_history_plan_carries_bounds_as_query() {
        let plan = plan_tool_call(
            "GetMeasurementHistory",
            args(json!({
                "startTime": "2026-01-01T00:00:00Z",
                "limit": 25
            })),
        )
        .unwrap();

        assert_eq!(plan.method, Method::GET);
        assert_eq!(plan.path, "/v1/measurements");
        assert_eq!(plan.query.len(), 2);
        assert_eq!(plan.query[0].0, "start");
        assert_eq!(plan.query[1], ("limit".to_string(), "25".to_string()));
    }

    #[test]
    fn range_plan_uses_snake_case_query_params() {
        let plan = plan_tool_call(
            "GetJournalsInRange",
            args(json!({"startDate": "2026-03-01", "endDate": "2026-03-07"})),
        )
        .unwrap();
        assert_eq!(
            plan.query,
            vec![
                ("start_date".to_string(), "2026-03-01".to_string()),
                ("end_date".to_string(), "2026-03-07".to_string()),
            ]
        );
    }

    #[test]
    fn error_types_map_from_api_error_codes() {
        assert_eq!(error_type_for_code("validation_failed"), "ValidationError");
        assert_eq!(error_type_for_code("not_found"), "ResourceNotFoundError");
        assert_eq!(error_type_for_code("unauthorized"), "AuthenticationError");
        assert_eq!(error_type_for_code("database_error"), "DatabaseError");
        assert_eq!(error_type_for_code("something_else"), "InternalError");
    }

    #[test]
    fn envelope_wraps_success_and_failure() {
        let ok = ApiCallResult {
            status: 200,
            body: json!({"title": "Run 5k"}),
        };
        let envelope = envelope_from_api_result(&ok);
        assert_eq!(envelope["success"], json!(true));
        assert_eq!(envelope["data"]["title"], json!("Run 5k"));

        let not_found = ApiCallResult {
            status: 404,
            body: json!({"error": "not_found", "message": "goal not found"}),
        };
        let envelope = envelope_from_api_result(&not_found);
        assert_eq!(envelope["success"], json!(false));
        assert_eq!(envelope["error"], json!("goal not found"));
        assert_eq!(envelope["errorType"], json!("ResourceNotFoundError"));
    }

    #[tokio::test]
    async fn initialize_reports_protocol_and_server() {
        let responses = server()
            .handle_incoming_message(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "initialize",
                "params": {}
            }))
            .await;

        assert_eq!(responses.len(), 1);
        let result = &responses[0]["result"];
        assert_eq!(result["protocolVersion"], json!(MCP_PROTOCOL_VERSION));
        assert_eq!(result["serverInfo"]["name"], json!(MCP_SERVER_NAME));
    }

    #[tokio::test]
    async fn notifications_produce_no_response() {
        let responses = server()
            .handle_incoming_message(json!({
                "jsonrpc": "2.0",
                "method": "notifications/initialized"
            }))
            .await;
        assert!(responses.is_empty());
    }

    #[tokio::test]
    async fn wrong_jsonrpc_version_is_rejected() {
        let responses = server()
            .handle_incoming_message(json!({
                "jsonrpc": "1.0",
                "id": 7,
                "method": "ping"
            }))
            .await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["error"]["code"], json!(-32600));
    }

    #[tokio::test]
    async fn batch_mixes_requests_and_notifications() {
        let responses = server()
            .handle_incoming_message(json!([
                {"jsonrpc": "2.0", "id": 1, "method": "ping"},
                {"jsonrpc": "2.0", "method": "notifications/initialized"},
                {"jsonrpc": "2.0", "id": 2, "method": "tools/list"}
            ]))
            .await;

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], json!(1));
        let tools = responses[1]["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 32);
    }

    #[tokio::test]
    async fn unknown_method_is_a_jsonrpc_error() {
        let responses = server()
            .handle_incoming_message(json!({
                "jsonrpc": "2.0",
                "id": 3,
                "method": "resources/subscribe"
            }))
            .await;
        assert_eq!(responses[0]["error"]["code"], json!(-32601));
    }

    #[tokio::test]
    async fn bad_tool_arguments_surface_as_in_band_error() {
        // Argument validation fails in planning, so no network is touched.
        let responses = server()
            .handle_incoming_message(json!({
                "jsonrpc": "2.0",
                "id": 4,
                "method": "tools/call",
                "params": {
                    "name": "DeleteGoal",
                    "arguments": {"goalId": "not-a-uuid"}
                }
            }))
            .await;

        let result = &responses[0]["result"];
        assert_eq!(result["isError"], json!(true));
        assert_eq!(result["structuredContent"]["success"], json!(false));
        assert_eq!(
            result["structuredContent"]["errorType"],
            json!("ValidationError")
        );
    }
}
