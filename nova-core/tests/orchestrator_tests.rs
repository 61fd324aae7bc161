//! Round behaviour of the orchestrator against a scripted provider

use async_trait::async_trait;
use futures::stream;
use nova_core::config::ChatConfig;
use nova_core::orchestrator::{ChatError, ChatResult, Orchestrator};
use nova_core::protocol::{
    Message, ParameterSpec, Part, RequestConfig, Role, ToolArgs, ToolCallRequest, ToolDeclaration,
    DEFAULT_MODEL,
};
use nova_core::providers::{
    Fragment, FragmentStream, GenerationProvider, GenerationRequest, ProviderError,
    ProviderResult, RetryPolicy,
};
use nova_core::tools::{Tool, ToolError, ToolProvider, ToolRegistry};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// What one generation call does
enum Script {
    Open(Vec<ProviderResult<Fragment>>),
    Fail(ProviderError),
}

/// Provider that replays scripted calls and records every request
#[derive(Default)]
struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedProvider {
    fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate_stream(&self, request: GenerationRequest) -> ProviderResult<FragmentStream> {
        self.requests.lock().unwrap().push(request);
        match self.scripts.lock().unwrap().pop_front() {
            Some(Script::Open(items)) => Ok(Box::pin(stream::iter(items))),
            Some(Script::Fail(error)) => Err(error),
            None => panic!("provider called more often than scripted"),
        }
    }
}

fn text(s: &str) -> ProviderResult<Fragment> {
    Ok(Fragment::Text(s.to_string()))
}

fn call(name: &str, args: Value) -> ProviderResult<Fragment> {
    Ok(Fragment::ToolCalls(vec![ToolCallRequest::new(
        name,
        args.as_object().cloned().unwrap_or_default(),
    )]))
}

/// Tool that counts its invocations
struct CountingTool {
    declaration: ToolDeclaration,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Tool for CountingTool {
    fn declaration(&self) -> &ToolDeclaration {
        &self.declaration
    }

    async fn call(&self, _args: &ToolArgs) -> Result<Value, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!("counted"))
    }
}

struct SlowTool {
    declaration: ToolDeclaration,
}

#[async_trait]
impl Tool for SlowTool {
    fn declaration(&self) -> &ToolDeclaration {
        &self.declaration
    }

    async fn call(&self, _args: &ToolArgs) -> Result<Value, ToolError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Value::Null)
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        initial_delay_ms: 1,
        max_delay_ms: 5,
        exponential_base: 2.0,
        jitter_factor: 0.0,
        respect_retry_after: false,
    }
}

fn orchestrator(provider: Arc<ScriptedProvider>, tools: ToolRegistry) -> Orchestrator {
    Orchestrator::new(provider, tools).with_retry(fast_retry())
}

fn last_part(request: &GenerationRequest) -> Part {
    let turn = request.history.last().expect("history is never empty");
    turn.parts[0].clone()
}

#[tokio::test]
async fn test_text_fragments_concatenate() {
    let provider = ScriptedProvider::new(vec![Script::Open(vec![text("He"), text("llo")])]);
    let orchestrator = orchestrator(provider.clone(), ToolRegistry::builtin());

    let reply = orchestrator
        .complete(&[Message::user("hi")], None)
        .await
        .unwrap();

    assert_eq!(reply, "Hello");
    assert_eq!(provider.requests().len(), 1);
}

#[tokio::test]
async fn test_unknown_model_uses_default() {
    let provider = ScriptedProvider::new(vec![Script::Open(vec![text("ok")])]);
    let orchestrator = orchestrator(provider.clone(), ToolRegistry::builtin());
    let config = RequestConfig {
        model: Some("gpt-9-ultra".to_string()),
        tools: HashMap::new(),
        stream_type: Default::default(),
        mcp_enabled: false,
    };

    orchestrator
        .complete(&[Message::user("hi")], Some(&config))
        .await
        .unwrap();

    assert_eq!(provider.requests()[0].model, DEFAULT_MODEL);
}

#[tokio::test]
async fn test_allowed_model_passes_through() {
    let provider = ScriptedProvider::new(vec![Script::Open(vec![text("ok")])]);
    let orchestrator = orchestrator(provider.clone(), ToolRegistry::builtin());
    let config = RequestConfig {
        model: Some("gemini-1.5-pro".to_string()),
        tools: HashMap::new(),
        stream_type: Default::default(),
        mcp_enabled: false,
    };

    orchestrator
        .complete(&[Message::user("hi")], Some(&config))
        .await
        .unwrap();

    assert_eq!(provider.requests()[0].model, "gemini-1.5-pro");
}

#[tokio::test]
async fn test_registered_tool_runs_once_and_adds_two_turns() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(CountingTool {
        declaration: ToolDeclaration::new("count_me", "Counts"),
        calls: calls.clone(),
    }));

    let provider = ScriptedProvider::new(vec![
        Script::Open(vec![text("Let me check. "), call("count_me", json!({})), text("dropped")]),
        Script::Open(vec![text("Done.")]),
    ]);
    let orchestrator = orchestrator(provider.clone(), tools);

    let reply = orchestrator
        .complete(&[Message::user("count")], None)
        .await
        .unwrap();

    assert_eq!(reply, "Let me check. Done.");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].history.len(), requests[0].history.len() + 2);

    let turns = requests[1].history.turns();
    assert_eq!(turns[1].role, Role::Model);
    assert!(matches!(&turns[1].parts[0], Part::FunctionCall(c) if c.name == "count_me"));
    assert_eq!(turns[2].role, Role::User);
    match &turns[2].parts[0] {
        Part::FunctionResponse(result) => {
            assert_eq!(result.name, "count_me");
            assert_eq!(result.response.result, json!("counted"));
        }
        other => panic!("expected a function response, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_tool_yields_null_and_round_continues() {
    let provider = ScriptedProvider::new(vec![
        Script::Open(vec![call("launch_rocket", json!({ "target": "moon" }))]),
        Script::Open(vec![text("I cannot do that.")]),
    ]);
    let orchestrator = orchestrator(provider.clone(), ToolRegistry::builtin());

    let reply = orchestrator
        .complete(&[Message::user("launch")], None)
        .await
        .unwrap();

    assert_eq!(reply, "I cannot do that.");
    match last_part(&provider.requests()[1]) {
        Part::FunctionResponse(result) => assert_eq!(result.response.result, Value::Null),
        other => panic!("expected a function response, got {:?}", other),
    }
}

#[tokio::test]
async fn test_random_number_with_degenerate_range() {
    let provider = ScriptedProvider::new(vec![
        Script::Open(vec![call("get_random_number", json!({ "min": 1, "max": 1 }))]),
        Script::Open(vec![text("Your number is 1.")]),
    ]);
    let orchestrator = orchestrator(provider.clone(), ToolRegistry::builtin());

    let reply = orchestrator
        .complete(&[Message::user("pick a number")], None)
        .await
        .unwrap();

    assert_eq!(reply, "Your number is 1.");
    match last_part(&provider.requests()[1]) {
        Part::FunctionResponse(result) => assert_eq!(result.response.result, json!(1)),
        other => panic!("expected a function response, got {:?}", other),
    }
}

#[tokio::test]
async fn test_tool_error_yields_null() {
    let provider = ScriptedProvider::new(vec![
        Script::Open(vec![call("get_random_number", json!({ "min": 9, "max": 1 }))]),
        Script::Open(vec![text("Oops.")]),
    ]);
    let orchestrator = orchestrator(provider.clone(), ToolRegistry::builtin());

    orchestrator
        .complete(&[Message::user("pick")], None)
        .await
        .unwrap();

    match last_part(&provider.requests()[1]) {
        Part::FunctionResponse(result) => assert_eq!(result.response.result, Value::Null),
        other => panic!("expected a function response, got {:?}", other),
    }
}

#[tokio::test]
async fn test_mid_stream_error_keeps_sent_text() {
    let provider = ScriptedProvider::new(vec![Script::Open(vec![
        text("par"),
        Err(ProviderError::StreamInterrupted("connection reset".to_string())),
    ])]);
    let orchestrator = orchestrator(provider.clone(), ToolRegistry::builtin());

    let mut sink = String::new();
    let result = orchestrator
        .stream(&[Message::user("hi")], None, &mut sink)
        .await;

    assert!(matches!(
        result,
        Err(ChatError::Provider(ProviderError::StreamInterrupted(_)))
    ));
    assert_eq!(sink, "par");
    // Mid-stream failures are not retried
    assert_eq!(provider.requests().len(), 1);
}

#[tokio::test]
async fn test_empty_history_is_rejected_before_any_call() {
    let provider = ScriptedProvider::new(vec![]);
    let orchestrator = orchestrator(provider.clone(), ToolRegistry::builtin());

    let result = orchestrator.complete(&[], None).await;

    assert!(matches!(result, Err(ChatError::EmptyHistory)));
    assert!(provider.requests().is_empty());
}

#[tokio::test]
async fn test_retryable_open_failure_is_retried() {
    let provider = ScriptedProvider::new(vec![
        Script::Fail(ProviderError::ServiceUnavailable("503".to_string())),
        Script::Open(vec![text("recovered")]),
    ]);
    let orchestrator = orchestrator(provider.clone(), ToolRegistry::builtin());

    let reply = orchestrator
        .complete(&[Message::user("hi")], None)
        .await
        .unwrap();

    assert_eq!(reply, "recovered");
    assert_eq!(provider.requests().len(), 2);
}

#[tokio::test]
async fn test_permanent_open_failure_is_not_retried() {
    let provider = ScriptedProvider::new(vec![Script::Fail(ProviderError::Authentication(
        "bad key".to_string(),
    ))]);
    let orchestrator = orchestrator(provider.clone(), ToolRegistry::builtin());

    let result = orchestrator.complete(&[Message::user("hi")], None).await;

    assert!(matches!(
        result,
        Err(ChatError::Provider(ProviderError::Authentication(_)))
    ));
    assert_eq!(provider.requests().len(), 1);
}

#[tokio::test]
async fn test_tool_call_limit() {
    let provider = ScriptedProvider::new(vec![
        Script::Open(vec![call("get_time", json!({}))]),
        Script::Open(vec![call("get_time", json!({}))]),
    ]);
    let orchestrator = orchestrator(provider.clone(), ToolRegistry::builtin()).with_chat_config(
        ChatConfig {
            max_tool_calls: 1,
            ..Default::default()
        },
    );

    let result = orchestrator.complete(&[Message::user("time")], None).await;

    assert!(matches!(result, Err(ChatError::TooManyToolCalls(1))));
}

#[tokio::test]
async fn test_slow_tool_times_out() {
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(SlowTool {
        declaration: ToolDeclaration::new("slow", "Takes forever"),
    }));
    let provider = ScriptedProvider::new(vec![Script::Open(vec![call("slow", json!({}))])]);
    let orchestrator = orchestrator(provider, tools).with_chat_config(ChatConfig {
        tool_timeout_secs: 1,
        ..Default::default()
    });

    let result = orchestrator.complete(&[Message::user("go")], None).await;

    assert!(matches!(result, Err(ChatError::ToolTimeout { tool, .. }) if tool == "slow"));
}

#[tokio::test]
async fn test_request_config_gates_builtin_tools() {
    let provider = ScriptedProvider::new(vec![Script::Open(vec![text("ok")])]);
    let orchestrator = orchestrator(provider.clone(), ToolRegistry::builtin());
    let config = RequestConfig {
        model: None,
        tools: HashMap::from([("get_time".to_string(), true)]),
        stream_type: Default::default(),
        mcp_enabled: false,
    };

    orchestrator
        .complete(&[Message::user("hi")], Some(&config))
        .await
        .unwrap();

    let offered: Vec<String> = provider.requests()[0]
        .tools
        .iter()
        .map(|t| t.name.clone())
        .collect();
    assert_eq!(offered, vec!["get_time"]);
}

#[tokio::test]
async fn test_mcp_requested_without_server_falls_back_to_builtins() {
    let provider = ScriptedProvider::new(vec![Script::Open(vec![text("ok")])]);
    let orchestrator = orchestrator(provider.clone(), ToolRegistry::builtin());
    let config = RequestConfig {
        model: None,
        tools: HashMap::from([("get_random_number".to_string(), true)]),
        stream_type: Default::default(),
        mcp_enabled: true,
    };

    orchestrator
        .complete(&[Message::user("hi")], Some(&config))
        .await
        .unwrap();

    assert_eq!(provider.requests()[0].tools.len(), 1);
    assert_eq!(provider.requests()[0].tools[0].name, "get_random_number");
}

/// Remote tool source with one `search` tool
#[derive(Default)]
struct FakeToolSource {
    calls: AtomicUsize,
}

#[async_trait]
impl ToolProvider for FakeToolSource {
    fn name(&self) -> &str {
        "fake"
    }

    async fn list_tools(&self) -> Result<Vec<ToolDeclaration>, ToolError> {
        Ok(vec![ToolDeclaration::new("search", "Search the docs")
            .with_param("query", ParameterSpec::new("string", "terms"))])
    }

    async fn call_tool(&self, call: &ToolCallRequest) -> Result<Value, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({ "hits": [call.args["query"].clone()] }))
    }
}

#[tokio::test]
async fn test_mcp_mode_resolves_tools_remotely() {
    let provider = ScriptedProvider::new(vec![
        Script::Open(vec![call("search", json!({ "query": "rust" }))]),
        Script::Open(vec![text("Found it.")]),
    ]);
    let source = Arc::new(FakeToolSource::default());
    let orchestrator = orchestrator(provider.clone(), ToolRegistry::builtin())
        .with_tool_provider(source.clone(), 10);
    let config = RequestConfig {
        model: None,
        tools: HashMap::from([("get_time".to_string(), true)]),
        stream_type: Default::default(),
        mcp_enabled: true,
    };

    let reply = orchestrator
        .complete(&[Message::user("search rust")], Some(&config))
        .await
        .unwrap();

    assert_eq!(reply, "Found it.");
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    let requests = provider.requests();
    // Built-in tools are suppressed in favour of the remote source
    let offered: Vec<&str> = requests[0].tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(offered, vec!["search"]);
    match last_part(&requests[1]) {
        Part::FunctionResponse(result) => {
            assert_eq!(result.response.result, json!({ "hits": ["rust"] }))
        }
        other => panic!("expected a function response, got {:?}", other),
    }
}

#[tokio::test]
async fn test_channel_sink_receives_fragments_in_order() {
    let provider = ScriptedProvider::new(vec![Script::Open(vec![
        text("one "),
        text("two "),
        text("three"),
    ])]);
    let orchestrator = orchestrator(provider, ToolRegistry::builtin());
    let (mut tx, mut rx) = mpsc::channel::<ChatResult<String>>(8);

    orchestrator
        .stream(&[Message::user("count")], None, &mut tx)
        .await
        .unwrap();
    drop(tx);

    let mut received = Vec::new();
    while let Some(chunk) = rx.recv().await {
        received.push(chunk.unwrap());
    }
    assert_eq!(received, vec!["one ", "two ", "three"]);
}

#[tokio::test]
async fn test_closed_channel_sink_fails_round() {
    let provider = ScriptedProvider::new(vec![Script::Open(vec![text("nobody listens")])]);
    let orchestrator = orchestrator(provider, ToolRegistry::builtin());
    let (mut tx, rx) = mpsc::channel::<ChatResult<String>>(1);
    drop(rx);

    let result = orchestrator
        .stream(&[Message::user("hi")], None, &mut tx)
        .await;

    assert!(matches!(result, Err(ChatError::SinkClosed)));
}
