//! End-to-end turns through the conversation controller with a scripted model

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use toolloop_core::error::{AgentError, Error, LlmError};
use toolloop_core::llm::{
    ChatOptions, LlmResponse, ScriptedLlmClient, ScriptedReply, ToolDefinition,
};
use toolloop_core::output::{AgentEvent, CollectingOutput, MessageLevel};
use toolloop_core::tools::builtin::SumTool;
use toolloop_core::tools::FunctionTool;
use toolloop_core::trajectory::{EntryType, Trajectory};
use toolloop_core::{
    AgentBuilder, AgentConfig, ConversationController, FileSessionStore, InMemorySessionStore,
    LlmClient, LlmMessage, MessageRole, SessionStore, ToolCall, ToolRegistry, TrajectoryRecorder,
};

fn fast_config() -> AgentConfig {
    AgentConfig {
        retry_backoff_ms: 0,
        ..AgentConfig::default()
    }
}

fn sum_call(id: &str, a: i64, b: i64) -> LlmMessage {
    LlmMessage::assistant_with_tool_calls("", vec![ToolCall::with_id(id, "sumar", json!({"a": a, "b": b}))])
}

fn controller_with(
    client: Arc<ScriptedLlmClient>,
    store: Arc<dyn SessionStore>,
    config: AgentConfig,
) -> ConversationController {
    AgentBuilder::with_client(client)
        .with_agent_config(config)
        .with_store(store)
        .build()
        .unwrap()
}

#[derive(Deserialize)]
struct Division {
    a: i64,
    b: i64,
}

fn registry_with_division() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(SumTool::new()).unwrap();
    registry
        .register(FunctionTool::new(
            "dividir",
            "Divide dos enteros.",
            json!({
                "type": "object",
                "properties": {"a": {"type": "integer"}, "b": {"type": "integer"}},
                "required": ["a", "b"]
            }),
            |args: Division| {
                if args.b == 0 {
                    Err("division by zero".to_string())
                } else {
                    Ok(args.a / args.b)
                }
            },
        ))
        .unwrap();
    registry
}

#[tokio::test]
async fn test_sum_request_calls_tool_and_replies() {
    let client = Arc::new(ScriptedLlmClient::from_messages(vec![
        sum_call("call_1", 2, 3),
        LlmMessage::assistant("La suma de 2 y 3 es 5."),
    ]));
    let store = Arc::new(InMemorySessionStore::new());
    let controller = controller_with(client.clone(), store.clone(), fast_config());

    let outcome = controller.run_turn("demo", "Suma 2 y 3").await.unwrap();

    assert!(outcome.final_reply.contains('5'));
    assert_eq!(outcome.model_turns, 2);
    assert_eq!(outcome.tool_calls, 1);

    let roles: Vec<MessageRole> = outcome.messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::Tool,
            MessageRole::Assistant
        ]
    );
    let tool_message = &outcome.messages.messages()[2];
    assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(tool_message.content, "5");
    assert!(!tool_message.is_error);

    // The second invocation sees the tool result; both see the tool schema.
    let requests = client.requests().await;
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].tools[0].function.name, "sumar");
    assert_eq!(requests[1].messages.len(), 3);
    assert_eq!(requests[1].messages[2].content, "5");

    // The store holds exactly what the outcome reports.
    let stored = store.load("demo").await.unwrap();
    assert_eq!(stored, outcome.messages);
}

#[tokio::test]
async fn test_greeting_takes_one_model_turn() {
    let client = Arc::new(ScriptedLlmClient::from_messages(vec![LlmMessage::assistant(
        "¡Hola! ¿En qué puedo ayudarte?",
    )]));
    let controller = controller_with(
        client.clone(),
        Arc::new(InMemorySessionStore::new()),
        fast_config(),
    );

    let outcome = controller.run_turn("demo", "Hola").await.unwrap();
    assert_eq!(outcome.model_turns, 1);
    assert_eq!(outcome.tool_calls, 0);
    assert_eq!(outcome.messages.len(), 2);
    assert_eq!(outcome.final_reply, "¡Hola! ¿En qué puedo ayudarte?");
    assert_eq!(client.call_count().await, 1);
}

#[tokio::test]
async fn test_failing_handler_is_reported_and_loop_continues() {
    let client = Arc::new(ScriptedLlmClient::from_messages(vec![
        LlmMessage::assistant_with_tool_calls(
            "",
            vec![ToolCall::with_id("d1", "dividir", json!({"a": 1, "b": 0}))],
        ),
        LlmMessage::assistant("No se puede dividir entre cero."),
    ]));
    let controller = AgentBuilder::with_client(client)
        .with_agent_config(fast_config())
        .with_registry(registry_with_division())
        .build()
        .unwrap();

    let outcome = controller.run_turn("s", "Divide 1 entre 0").await.unwrap();
    let tool_message = &outcome.messages.messages()[2];
    assert_eq!(tool_message.role, MessageRole::Tool);
    assert!(tool_message.is_error);
    assert!(tool_message.content.starts_with("Error: "));
    assert!(tool_message.content.contains("division by zero"));
    assert_eq!(outcome.final_reply, "No se puede dividir entre cero.");
}

#[tokio::test]
async fn test_unknown_tool_and_bad_arguments_become_error_results() {
    let client = Arc::new(ScriptedLlmClient::from_messages(vec![
        LlmMessage::assistant_with_tool_calls(
            "",
            vec![
                ToolCall::with_id("u1", "restar", json!({"a": 5, "b": 3})),
                ToolCall::with_id("u2", "sumar", json!({"a": "dos", "b": 3})),
            ],
        ),
        LlmMessage::assistant("No pude hacerlo."),
    ]));
    let controller = controller_with(client, Arc::new(InMemorySessionStore::new()), fast_config());

    let outcome = controller.run_turn("s", "Resta 5 menos 3").await.unwrap();
    let messages = outcome.messages.messages();
    assert_eq!(messages[2].content, "Error: Unknown tool: restar");
    assert!(messages[3].is_error);
    assert!(messages[3].content.contains("a must be an integer"));
    assert_eq!(outcome.tool_calls, 2);
}

#[tokio::test]
async fn test_every_call_gets_exactly_one_result_in_order() {
    let client = Arc::new(ScriptedLlmClient::from_messages(vec![
        LlmMessage::assistant_with_tool_calls(
            "Sumo ambas.",
            vec![
                ToolCall::with_id("p1", "sumar", json!({"a": 2, "b": 3})),
                ToolCall::with_id("p2", "sumar", json!({"a": 10, "b": 20})),
            ],
        ),
        LlmMessage::assistant("5 y 30."),
    ]));
    let controller = controller_with(
        client.clone(),
        Arc::new(InMemorySessionStore::new()),
        fast_config(),
    );

    let outcome = controller.run_turn("s", "Suma 2+3 y 10+20").await.unwrap();
    let messages = outcome.messages.messages();
    assert_eq!(messages.len(), 5);
    assert_eq!(messages[2].tool_call_id.as_deref(), Some("p1"));
    assert_eq!(messages[2].content, "5");
    assert_eq!(messages[3].tool_call_id.as_deref(), Some("p2"));
    assert_eq!(messages[3].content, "30");

    // Both results were present before the model ran again.
    let second_request = &client.requests().await[1];
    let results = second_request
        .messages
        .iter()
        .filter(|m| m.role == MessageRole::Tool)
        .count();
    assert_eq!(results, 2);
}

#[tokio::test]
async fn test_endless_tool_calls_hit_max_turns() {
    let client = Arc::new(ScriptedLlmClient::from_messages(vec![sum_call("loop", 1, 1)]).repeating());
    let store = Arc::new(InMemorySessionStore::new());
    let controller = controller_with(
        client.clone(),
        store.clone(),
        AgentConfig {
            max_turns: 3,
            ..fast_config()
        },
    );

    let err = controller.run_turn("s", "Suma para siempre").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Agent(AgentError::MaxTurnsExceeded { max_turns: 3 })
    ));
    assert_eq!(client.call_count().await, 3);

    // user + 3 x (assistant, tool result) are all retained.
    let log = store.load("s").await.unwrap();
    assert_eq!(log.len(), 7);
    assert_eq!(log.last().map(|m| m.role), Some(MessageRole::Tool));
}

#[tokio::test]
async fn test_model_failure_appends_nothing_further() {
    let client = Arc::new(ScriptedLlmClient::new(vec![
        ScriptedReply::Message(LlmMessage::assistant("¡Hola!")),
        ScriptedReply::Invalid("not a chat completion".to_string()),
    ]));
    let store = Arc::new(InMemorySessionStore::new());
    let controller = controller_with(client, store.clone(), fast_config());

    controller.run_turn("s", "Hola").await.unwrap();
    let err = controller.run_turn("s", "Suma 2 y 3").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Llm(LlmError::ModelResponseInvalid { .. })
    ));

    // The user message of the failed turn was committed; nothing after it.
    let log = store.load("s").await.unwrap();
    assert_eq!(log.len(), 3);
    assert_eq!(log.last().map(|m| m.content.as_str()), Some("Suma 2 y 3"));
}

#[tokio::test]
async fn test_transient_unavailability_is_retried() {
    let client = Arc::new(ScriptedLlmClient::new(vec![
        ScriptedReply::Unavailable("connection reset".to_string()),
        ScriptedReply::Message(LlmMessage::assistant("¡Hola!")),
    ]));
    let output = Arc::new(CollectingOutput::new());
    let controller = AgentBuilder::with_client(client.clone())
        .with_agent_config(fast_config())
        .with_output(output.clone())
        .build()
        .unwrap();

    let outcome = controller.run_turn("s", "Hola").await.unwrap();
    assert_eq!(outcome.final_reply, "¡Hola!");
    assert_eq!(outcome.model_turns, 1);
    assert_eq!(client.call_count().await, 2);

    let retries = output
        .events()
        .await
        .into_iter()
        .filter(|e| matches!(e, AgentEvent::ModelRetry { .. }))
        .count();
    assert_eq!(retries, 1);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let client = Arc::new(ScriptedLlmClient::new(vec![ScriptedReply::Unavailable(
        "down".to_string(),
    )])
    .repeating());
    let store = Arc::new(InMemorySessionStore::new());
    let controller = controller_with(client.clone(), store.clone(), fast_config());

    let err = controller.run_turn("s", "Hola").await.unwrap_err();
    assert!(matches!(err, Error::Llm(LlmError::ModelUnavailable { .. })));
    assert_eq!(client.call_count().await, 3);
    assert_eq!(store.load("s").await.unwrap().len(), 1);
}

struct StalledClient;

#[async_trait]
impl LlmClient for StalledClient {
    async fn chat_completion(
        &self,
        _messages: Vec<LlmMessage>,
        _tools: Option<Vec<ToolDefinition>>,
        _options: Option<ChatOptions>,
    ) -> toolloop_core::Result<LlmResponse> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        unreachable!("the controller times out first")
    }

    fn model_name(&self) -> &str {
        "stalled"
    }

    fn provider_name(&self) -> &str {
        "test"
    }
}

#[tokio::test(start_paused = true)]
async fn test_model_timeout_surfaces_as_unavailable() {
    let controller = AgentBuilder::with_client(Arc::new(StalledClient))
        .with_agent_config(AgentConfig {
            model_timeout_secs: 5,
            max_retries: 0,
            ..AgentConfig::default()
        })
        .build()
        .unwrap();

    let err = controller.run_turn("s", "Hola").await.unwrap_err();
    assert!(matches!(err, Error::Llm(LlmError::ModelUnavailable { .. })));
    assert_eq!(controller.history("s").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_turns_only_append() {
    let client = Arc::new(ScriptedLlmClient::from_messages(vec![
        LlmMessage::assistant("¡Hola!"),
        sum_call("c1", 2, 3),
        LlmMessage::assistant("Es 5."),
    ]));
    let controller = controller_with(client, Arc::new(InMemorySessionStore::new()), fast_config());

    let first = controller.run_turn("s", "Hola").await.unwrap();
    let second = controller.run_turn("s", "Suma 2 y 3").await.unwrap();

    let before = first.messages.messages();
    let after = second.messages.messages();
    assert_eq!(&after[..before.len()], before);
    assert_eq!(second.first_new_index, 2);
    assert_eq!(second.new_messages().len(), 4);
    assert_eq!(second.new_messages()[0].content, "Suma 2 y 3");
}

#[tokio::test]
async fn test_system_prompt_is_sent_but_not_stored() {
    let client = Arc::new(ScriptedLlmClient::from_messages(vec![LlmMessage::assistant(
        "¡Hola!",
    )]));
    let store = Arc::new(InMemorySessionStore::new());
    let controller = controller_with(
        client.clone(),
        store.clone(),
        AgentConfig {
            system_prompt: Some("Responde en español.".to_string()),
            ..fast_config()
        },
    );

    controller.run_turn("s", "Hola").await.unwrap();

    let request = &client.requests().await[0];
    assert_eq!(request.messages[0].role, MessageRole::System);
    assert_eq!(request.messages[0].content, "Responde en español.");
    assert!(store
        .load("s")
        .await
        .unwrap()
        .iter()
        .all(|m| m.role != MessageRole::System));
}

#[tokio::test]
async fn test_sessions_run_concurrently_and_stay_isolated() {
    let client = Arc::new(ScriptedLlmClient::from_messages(vec![LlmMessage::assistant("ok")]).repeating());
    let store = Arc::new(InMemorySessionStore::new());
    let controller = controller_with(client, store.clone(), fast_config());

    let (a, b) = tokio::join!(
        controller.run_turn("a", "uno"),
        controller.run_turn("b", "dos")
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(store.load("a").await.unwrap().messages()[0].content, "uno");
    assert_eq!(store.load("b").await.unwrap().messages()[0].content, "dos");
}

#[tokio::test]
async fn test_events_bracket_the_turn() {
    let client = Arc::new(ScriptedLlmClient::from_messages(vec![
        sum_call("c1", 2, 3),
        LlmMessage::assistant("5"),
    ]));
    let output = Arc::new(CollectingOutput::new());
    let controller = AgentBuilder::with_client(client)
        .with_agent_config(fast_config())
        .with_output(output.clone())
        .build()
        .unwrap();

    controller.run_turn("s", "Suma 2 y 3").await.unwrap();

    let events = output.events().await;
    assert!(matches!(events.first(), Some(AgentEvent::TurnStarted { .. })));
    assert!(matches!(
        events.last(),
        Some(AgentEvent::TurnCompleted { model_turns: 2, tool_calls: 1, .. })
    ));
    assert!(events
        .iter()
        .any(|e| matches!(e, AgentEvent::ToolCompleted { result, .. } if result.content == "5")));
}

#[tokio::test]
async fn test_file_store_resumes_session_in_new_controller() {
    let temp_dir = TempDir::new().unwrap();

    let first_client = Arc::new(ScriptedLlmClient::from_messages(vec![LlmMessage::assistant(
        "¡Hola!",
    )]));
    let store = Arc::new(FileSessionStore::new(temp_dir.path()).await.unwrap());
    controller_with(first_client, store, fast_config())
        .run_turn("persistente", "Hola")
        .await
        .unwrap();

    let second_client = Arc::new(ScriptedLlmClient::from_messages(vec![LlmMessage::assistant(
        "Sigo aquí.",
    )]));
    let reopened = Arc::new(FileSessionStore::new(temp_dir.path()).await.unwrap());
    let outcome = controller_with(second_client.clone(), reopened, fast_config())
        .run_turn("persistente", "¿Sigues ahí?")
        .await
        .unwrap();

    assert_eq!(outcome.messages.len(), 4);
    assert_eq!(second_client.requests().await[0].messages.len(), 3);
}

#[derive(Deserialize)]
struct Choice {
    items: Vec<String>,
}

#[tokio::test]
async fn test_panicking_handler_does_not_break_the_session() {
    let mut registry = ToolRegistry::new();
    registry
        .register(FunctionTool::new(
            "elegir",
            "Elige un elemento de la lista.",
            json!({
                "type": "object",
                "properties": {"items": {"type": "array", "items": {"type": "string"}}},
                "required": ["items"]
            }),
            |args: Choice| -> Result<String, String> {
                let index = args.items.len() + 6;
                Ok(args.items[index].clone())
            },
        ))
        .unwrap();

    let client = Arc::new(ScriptedLlmClient::from_messages(vec![
        LlmMessage::assistant_with_tool_calls(
            "",
            vec![ToolCall::with_id("e1", "elegir", json!({"items": ["a", "b"]}))],
        ),
        LlmMessage::assistant("No pude elegir."),
        LlmMessage::assistant("¡Hola de nuevo!"),
    ]));
    let store = Arc::new(InMemorySessionStore::new());
    let controller = AgentBuilder::with_client(client.clone())
        .with_agent_config(fast_config())
        .with_registry(registry)
        .with_store(store.clone())
        .build()
        .unwrap();

    let outcome = controller.run_turn("s", "Elige uno").await.unwrap();
    assert_eq!(outcome.final_reply, "No pude elegir.");

    let stored = store.load("s").await.unwrap();
    let tool_message = &stored.messages()[2];
    assert_eq!(tool_message.role, MessageRole::Tool);
    assert_eq!(tool_message.tool_call_id.as_deref(), Some("e1"));
    assert!(tool_message.is_error);
    assert!(tool_message.content.starts_with("Error: Tool execution failed"));

    // The session stays usable: the next turn sends a well-formed log.
    controller.run_turn("s", "Hola").await.unwrap();
    let requests = client.requests().await;
    let roles: Vec<MessageRole> = requests[2].messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::Tool,
            MessageRole::Assistant,
            MessageRole::User
        ]
    );
}

#[tokio::test]
async fn test_interrupted_tool_calls_are_answered_before_the_next_turn() {
    let store = Arc::new(InMemorySessionStore::new());
    store
        .append("s", &[LlmMessage::user("Suma 2 y 3"), sum_call("call_1", 2, 3)])
        .await
        .unwrap();

    let client = Arc::new(ScriptedLlmClient::from_messages(vec![LlmMessage::assistant(
        "¿Lo intento otra vez?",
    )]));
    let output = Arc::new(CollectingOutput::new());
    let controller = AgentBuilder::with_client(client.clone())
        .with_agent_config(fast_config())
        .with_store(store.clone())
        .with_output(output.clone())
        .build()
        .unwrap();

    let outcome = controller.run_turn("s", "¿Y bien?").await.unwrap();
    assert_eq!(outcome.final_reply, "¿Lo intento otra vez?");

    let request = &client.requests().await[0];
    let roles: Vec<MessageRole> = request.messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::Tool,
            MessageRole::User
        ]
    );
    let repair = &request.messages[2];
    assert_eq!(repair.tool_call_id.as_deref(), Some("call_1"));
    assert!(repair.is_error);
    assert_eq!(
        repair.content,
        "Error: Tool call was interrupted before it produced a result"
    );

    // The repair is persisted, so a reload sees a complete log.
    let stored = store.load("s").await.unwrap();
    assert_eq!(stored.len(), 5);
    assert!(stored.unanswered_tool_calls().is_empty());
    assert!(output
        .events()
        .await
        .iter()
        .any(|e| matches!(
            e,
            AgentEvent::Message {
                level: MessageLevel::Warning,
                ..
            }
        )));
}

#[tokio::test]
async fn test_trajectory_file_records_the_turn() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("trajectory.json");

    let client = Arc::new(ScriptedLlmClient::from_messages(vec![
        sum_call("call_1", 2, 3),
        LlmMessage::assistant("La suma de 2 y 3 es 5."),
    ]));
    let controller = AgentBuilder::with_client(client)
        .with_agent_config(fast_config())
        .with_trajectory_recorder(Arc::new(TrajectoryRecorder::with_file(&path)))
        .build()
        .unwrap();
    controller.run_turn("demo", "Suma 2 y 3").await.unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let trajectory: Trajectory = serde_json::from_str(&content).unwrap();
    assert_eq!(trajectory.metadata.session_id.as_deref(), Some("demo"));
    assert_eq!(trajectory.metadata.completed_turns, 1);
    assert!(matches!(
        trajectory.entries.first().map(|e| &e.entry_type),
        Some(EntryType::TurnStart { .. })
    ));
    assert!(matches!(
        trajectory.entries.last().map(|e| &e.entry_type),
        Some(EntryType::TurnComplete { model_turns: 2, .. })
    ));
    assert!(trajectory.entries.iter().any(|e| matches!(
        &e.entry_type,
        EntryType::ToolResult { result } if result.content == "5"
    )));
}
