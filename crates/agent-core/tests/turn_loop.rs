use std::collections::VecDeque;
use std::sync::Arc;

use agent_core::{
    AgentLoopConfig, DEFAULT_ROUND_LIMIT_MARKER, ChatEvent, ChatMode, ChatSession, PageContent, PageExtractor, PageWriter,
    TurnStatus, WriteRequest, WriteResult,
};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use pagelens_core_types::{CoreError, TabId};
use pagelens_inference::{
    part, CancellationToken, Content, InferenceBackend, InferenceError, InferenceRequest, Role,
    StreamChunk, Usage,
};
use pagelens_snapshot_store::{SnapPolicyView, SnapshotSource, SnapshotStoreBuilder};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;

enum Script {
    Finite(Vec<StreamChunk>),
    /// Yields the chunks, then never ends on its own.
    Hang(Vec<StreamChunk>),
}

#[derive(Default)]
struct ScriptedBackend {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<InferenceRequest>>,
}

impl ScriptedBackend {
    fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<InferenceRequest> {
        self.requests.lock().clone()
    }
}

impl InferenceBackend for ScriptedBackend {
    fn stream(
        &self,
        request: InferenceRequest,
        _cancel: CancellationToken,
    ) -> BoxStream<'static, StreamChunk> {
        self.requests.lock().push(request);
        match self.scripts.lock().pop_front() {
            Some(Script::Finite(chunks)) => futures::stream::iter(chunks).boxed(),
            Some(Script::Hang(chunks)) => futures::stream::iter(chunks)
                .chain(futures::stream::pending())
                .boxed(),
            None => futures::stream::empty().boxed(),
        }
    }
}

struct StaticPage {
    page: Mutex<Result<Option<PageContent>, CoreError>>,
}

impl StaticPage {
    fn new(url: &str, text: &str) -> Arc<Self> {
        Arc::new(Self {
            page: Mutex::new(Ok(Some(page(url, text)))),
        })
    }

    fn set(&self, url: &str, text: &str) {
        *self.page.lock() = Ok(Some(page(url, text)));
    }

    fn fail(&self) {
        *self.page.lock() = Err(CoreError::new("tab is restricted"));
    }
}

#[async_trait]
impl PageExtractor for StaticPage {
    async fn extract(&self, _tab: TabId) -> Result<Option<PageContent>, CoreError> {
        self.page.lock().clone()
    }
}

#[derive(Default)]
struct RecordingWriter {
    writes: Mutex<Vec<WriteRequest>>,
}

#[async_trait]
impl PageWriter for RecordingWriter {
    async fn write(&self, request: WriteRequest) -> WriteResult {
        self.writes.lock().push(request);
        WriteResult::ok()
    }
}

fn page(url: &str, text: &str) -> PageContent {
    PageContent {
        url: url.to_string(),
        title: "Fixture".to_string(),
        text: text.to_string(),
        editor_contents: None,
    }
}

fn text(value: &str) -> StreamChunk {
    StreamChunk::Text {
        text: value.to_string(),
        part: part::text(value),
    }
}

fn call(name: &str, args: Value) -> StreamChunk {
    StreamChunk::ToolCall {
        name: name.to_string(),
        part: part::function_call(name, args.clone()),
        args,
    }
}

fn stop() -> StreamChunk {
    StreamChunk::Finish {
        reason: "STOP".to_string(),
    }
}

fn usage(total: u64) -> StreamChunk {
    StreamChunk::Usage(Usage {
        prompt_tokens: total / 2,
        output_tokens: total / 2,
        thinking_tokens: 0,
        total_tokens: total,
    })
}

fn session(backend: Arc<ScriptedBackend>, page: Arc<StaticPage>, config: AgentLoopConfig) -> ChatSession {
    let store = SnapshotStoreBuilder::new(SnapPolicyView {
        sweep_interval_sec: 0,
        ..SnapPolicyView::default()
    })
    .build();
    ChatSession::new(backend, store, page, config)
}

async fn run(
    session: &mut ChatSession,
    tab: i64,
    message: &str,
) -> (agent_core::TurnOutcome, Vec<ChatEvent>) {
    let (tx, mut rx) = mpsc::channel(64);
    let outcome = session
        .run_turn(TabId(tab), message, tx, CancellationToken::new())
        .await
        .expect("turn");
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    (outcome, events)
}

fn responses(content: &Content) -> Vec<Value> {
    content
        .parts
        .iter()
        .filter_map(|p| p.get("functionResponse").cloned())
        .collect()
}

#[tokio::test]
async fn answer_without_tools_flushes_usage_once() {
    let backend = ScriptedBackend::new(vec![Script::Finite(vec![
        text("Hello "),
        text("world"),
        stop(),
        usage(10),
    ])]);
    let page = StaticPage::new("https://example.com/a", "Intro paragraph");
    let mut chat = session(backend.clone(), page, AgentLoopConfig::default());

    let (outcome, events) = run(&mut chat, 1, "What is this page?").await;

    assert_eq!(outcome.status, TurnStatus::Done);
    assert_eq!(outcome.rounds, 1);
    assert_eq!(outcome.text, "Hello world");
    assert_eq!(
        events,
        vec![
            ChatEvent::TextDelta { text: "Hello ".into() },
            ChatEvent::TextDelta { text: "world".into() },
            ChatEvent::Usage {
                usage: Usage {
                    prompt_tokens: 5,
                    output_tokens: 5,
                    thinking_tokens: 0,
                    total_tokens: 10,
                }
            },
            ChatEvent::Finish { reason: "STOP".into() },
            ChatEvent::TurnComplete { aborted: false },
        ]
    );

    assert_eq!(outcome.conversation.len(), 2);
    let answer = &outcome.conversation[1];
    assert_eq!(answer.role, Role::Model);
    assert_eq!(answer.parts, vec![json!({ "text": "Hello world" })]);
    assert_eq!(chat.history().len(), 2);
    assert_eq!(chat.status(), TurnStatus::Done);

    let requests = backend.requests();
    let system = requests[0].system_instruction.as_deref().unwrap();
    assert!(system.contains("first read of this page"));
    assert!(system.contains("https://example.com/a"));
    assert_eq!(requests[0].tools.len(), 2);
}

#[tokio::test]
async fn tool_round_feeds_results_back() {
    let backend = ScriptedBackend::new(vec![
        Script::Finite(vec![
            text("Let me look."),
            call("read_page_chunks", json!({ "indices": [0, 99] })),
            stop(),
            usage(7),
        ]),
        Script::Finite(vec![text("It is an intro."), stop(), usage(20)]),
    ]);
    let page = StaticPage::new("https://example.com/a", "Intro paragraph");
    let mut chat = session(backend.clone(), page, AgentLoopConfig::default());

    let (outcome, events) = run(&mut chat, 1, "Summarize").await;

    assert_eq!(outcome.status, TurnStatus::Done);
    assert_eq!(outcome.rounds, 2);
    assert_eq!(outcome.text, "Let me look.It is an intro.");
    assert!(events.contains(&ChatEvent::ToolCall {
        name: "read_page_chunks".into(),
        args: json!({ "indices": [0, 99] }),
        source: Some(SnapshotSource::Latest),
        round: 1,
    }));
    let usages: Vec<_> = events
        .iter()
        .filter(|event| matches!(event, ChatEvent::Usage { .. }))
        .collect();
    assert_eq!(usages.len(), 1);
    assert!(matches!(usages[0], ChatEvent::Usage { usage } if usage.total_tokens == 20));
    assert_eq!(
        events
            .iter()
            .filter(|event| matches!(event, ChatEvent::Finish { .. }))
            .count(),
        1
    );

    // user, model(text + call), user(responses), model(answer)
    let conversation = &outcome.conversation;
    assert_eq!(conversation.len(), 4);
    assert_eq!(conversation[1].role, Role::Model);
    assert_eq!(conversation[1].parts[0], json!({ "text": "Let me look." }));
    assert!(part::is_function_call(&conversation[1].parts[1]));
    let replies = responses(&conversation[2]);
    assert_eq!(replies.len(), 1);
    assert_eq!(
        replies[0]["response"]["chunks"],
        json!([{ "index": 0, "content": "Intro paragraph" }])
    );

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].contents.len(), 3);
}

#[tokio::test]
async fn failing_tools_answer_with_errors_and_continue() {
    let backend = ScriptedBackend::new(vec![
        Script::Finite(vec![
            call("write_editor", json!({ "key": "file_1", "replace": "x" })),
            call("click", json!({ "index": 3 })),
            stop(),
        ]),
        Script::Finite(vec![text("I cannot edit here."), stop()]),
    ]);
    let page = StaticPage::new("https://example.com/a", "Intro paragraph");
    let mut chat = session(backend, page, AgentLoopConfig::default());

    let (outcome, events) = run(&mut chat, 1, "Fix the typo").await;

    assert_eq!(outcome.status, TurnStatus::Done);
    assert_eq!(outcome.rounds, 2);
    let replies = responses(&outcome.conversation[2]);
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0]["name"], "write_editor");
    assert!(replies[0]["response"]["error"]
        .as_str()
        .unwrap()
        .contains("ask mode"));
    assert_eq!(replies[1]["name"], "click");
    assert!(replies[1]["response"]["error"]
        .as_str()
        .unwrap()
        .contains("unknown tool"));
    assert_eq!(events.last(), Some(&ChatEvent::TurnComplete { aborted: false }));
}

#[tokio::test]
async fn agent_mode_writes_through_page_writer() {
    let backend = ScriptedBackend::new(vec![
        Script::Finite(vec![
            call(
                "write_editor",
                json!({ "key": "file_1", "find": "teh", "replace": "the" }),
            ),
            stop(),
        ]),
        Script::Finite(vec![text("Fixed."), stop()]),
    ]);
    let page = StaticPage::new("https://example.com/a", "teh page");
    let writer = Arc::new(RecordingWriter::default());
    let mut chat = session(
        backend.clone(),
        page,
        AgentLoopConfig::default().mode(ChatMode::Agent),
    )
    .with_writer(writer.clone());

    let (outcome, _) = run(&mut chat, 4, "Fix the typo").await;

    assert_eq!(outcome.status, TurnStatus::Done);
    let writes = writer.writes.lock().clone();
    assert_eq!(
        writes,
        vec![WriteRequest {
            tab: TabId(4),
            key: "file_1".into(),
            find: "teh".into(),
            replace: "the".into(),
        }]
    );
    let replies = responses(&outcome.conversation[2]);
    assert_eq!(replies[0]["response"], json!({ "success": true }));
    assert!(backend.requests()[0]
        .tools
        .iter()
        .any(|tool| tool.name == "write_editor"));
}

#[tokio::test]
async fn round_limit_ends_turn_as_done() {
    let backend = ScriptedBackend::new(vec![
        Script::Finite(vec![call("read_page_chunks", json!({ "indices": [0] })), stop()]),
        Script::Finite(vec![
            text("Still reading"),
            call("read_page_chunks", json!({ "indices": [1] })),
            stop(),
            usage(3),
        ]),
        Script::Finite(vec![text("never requested")]),
    ]);
    let page = StaticPage::new("https://example.com/a", "Intro paragraph");
    let mut chat = session(
        backend.clone(),
        page,
        AgentLoopConfig::default().max_rounds(2),
    );

    let (outcome, events) = run(&mut chat, 1, "Read everything").await;

    assert_eq!(outcome.status, TurnStatus::Done);
    assert_eq!(outcome.rounds, 2);
    assert_eq!(backend.requests().len(), 2);
    let last = outcome.conversation.last().unwrap();
    assert_eq!(last.role, Role::Model);
    let closing = format!("Still reading{DEFAULT_ROUND_LIMIT_MARKER}");
    assert_eq!(last.parts, vec![json!({ "text": closing })]);
    assert_eq!(outcome.text, closing);
    assert!(events.contains(&ChatEvent::TextDelta {
        text: DEFAULT_ROUND_LIMIT_MARKER.into()
    }));
    assert!(events.contains(&ChatEvent::Finish { reason: "STOP".into() }));
    assert_eq!(events.last(), Some(&ChatEvent::TurnComplete { aborted: false }));
}

#[tokio::test]
async fn round_limit_keeps_transcript_alternating() {
    let backend = ScriptedBackend::new(vec![
        Script::Finite(vec![call("read_page_chunks", json!({ "indices": [0] })), stop()]),
        Script::Finite(vec![call("read_page_chunks", json!({ "indices": [1] })), stop()]),
        Script::Finite(vec![text("Here is the summary."), stop()]),
    ]);
    let page = StaticPage::new("https://example.com/a", "Intro paragraph");
    let mut chat = session(
        backend.clone(),
        page,
        AgentLoopConfig::default().max_rounds(2),
    );

    let (first, _) = run(&mut chat, 1, "Read everything").await;
    assert_eq!(first.status, TurnStatus::Done);
    assert_eq!(first.text, DEFAULT_ROUND_LIMIT_MARKER);
    run(&mut chat, 1, "Summarize what you saw").await;

    let requests = backend.requests();
    assert_eq!(requests.len(), 3);
    let roles: Vec<Role> = requests[2]
        .contents
        .iter()
        .map(|content| content.role)
        .collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Model, Role::User, Role::Model, Role::User]
    );
    assert!(roles.windows(2).all(|pair| pair[0] != pair[1]));
}

#[tokio::test]
async fn empty_reply_is_not_recorded() {
    let backend = ScriptedBackend::new(vec![
        Script::Finite(vec![stop()]),
        Script::Finite(vec![text("Second try."), stop()]),
    ]);
    let page = StaticPage::new("https://example.com/a", "Intro paragraph");
    let mut chat = session(backend.clone(), page, AgentLoopConfig::default());

    let (outcome, _) = run(&mut chat, 1, "Hello?").await;
    assert_eq!(outcome.status, TurnStatus::Done);
    assert!(chat.history().is_empty());

    run(&mut chat, 1, "Hello again").await;
    let roles: Vec<Role> = chat.history().iter().map(|content| content.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Model]);
}

#[tokio::test]
async fn cancellation_mid_stream_marks_text_as_stopped() {
    let backend = ScriptedBackend::new(vec![Script::Hang(vec![text("Partial answer")])]);
    let page = StaticPage::new("https://example.com/a", "Intro paragraph");
    let mut chat = session(backend, page, AgentLoopConfig::default());

    let (tx, mut rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();
    let trip = cancel.clone();
    let consumer = tokio::spawn(async move {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            if matches!(event, ChatEvent::TextDelta { .. }) {
                trip.cancel();
            }
            events.push(event);
        }
        events
    });

    let outcome = chat
        .run_turn(TabId(1), "Explain", tx, cancel)
        .await
        .unwrap();
    let events = consumer.await.unwrap();

    assert_eq!(outcome.status, TurnStatus::Aborted);
    assert_eq!(outcome.text, "Partial answer\n\n[Stopped by user]");
    assert_eq!(events.last(), Some(&ChatEvent::TurnComplete { aborted: true }));
    assert!(events.contains(&ChatEvent::TextDelta {
        text: "\n\n[Stopped by user]".into()
    }));
    assert!(!events.iter().any(|e| matches!(e, ChatEvent::Usage { .. })));

    let last = chat.history().last().unwrap();
    assert_eq!(last.role, Role::Model);
    assert_eq!(last.text(), "Partial answer\n\n[Stopped by user]");
    assert_eq!(chat.status(), TurnStatus::Aborted);
}

#[tokio::test]
async fn dropped_receiver_cancels_the_turn() {
    let backend = ScriptedBackend::new(vec![Script::Hang(vec![text("Nobody listens")])]);
    let page = StaticPage::new("https://example.com/a", "Intro paragraph");
    let mut chat = session(backend, page, AgentLoopConfig::default());

    let (tx, rx) = mpsc::channel(64);
    drop(rx);
    let cancel = CancellationToken::new();
    let outcome = chat
        .run_turn(TabId(1), "Explain", tx, cancel.clone())
        .await
        .unwrap();

    assert!(cancel.is_cancelled());
    assert_eq!(outcome.status, TurnStatus::Aborted);
}

#[tokio::test]
async fn inference_error_fails_the_turn() {
    let backend = ScriptedBackend::new(vec![Script::Finite(vec![StreamChunk::Error(
        InferenceError::terminal(400, "bad request"),
    )])]);
    let page = StaticPage::new("https://example.com/a", "Intro paragraph");
    let mut chat = session(backend, page, AgentLoopConfig::default());

    let (outcome, events) = run(&mut chat, 1, "Hello").await;

    assert_eq!(outcome.status, TurnStatus::Failed);
    assert_eq!(outcome.error, Some(InferenceError::terminal(400, "bad request")));
    assert!(matches!(&events[0], ChatEvent::Error { message } if message.contains("bad request")));
    assert_eq!(events.last(), Some(&ChatEvent::TurnComplete { aborted: false }));
    assert!(chat.history().is_empty());
}

#[tokio::test]
async fn page_switch_overrides_diff() {
    let backend = ScriptedBackend::new(vec![
        Script::Finite(vec![text("one"), stop()]),
        Script::Finite(vec![text("two"), stop()]),
        Script::Finite(vec![text("three"), stop()]),
        Script::Finite(vec![text("four"), stop()]),
    ]);
    let page = StaticPage::new("https://example.com/a", "First page");
    let mut chat = session(backend.clone(), page.clone(), AgentLoopConfig::default());

    run(&mut chat, 1, "first").await;
    page.set("https://example.com/b", "Second page");
    run(&mut chat, 1, "second").await;
    run(&mut chat, 1, "third").await;
    run(&mut chat, 2, "fourth").await;

    let systems: Vec<String> = backend
        .requests()
        .iter()
        .map(|request| request.system_instruction.clone().unwrap_or_default())
        .collect();
    assert!(!systems[0].contains("different page"));
    assert!(systems[1].contains("different page"));
    assert!(systems[1].contains("https://example.com/a (tab 1)"));
    assert!(!systems[1].contains("navigated"));
    assert!(systems[2].contains("has not changed"));
    assert!(systems[3].contains("different page"));
    assert_eq!(chat.page().map(|page| page.tab), Some(TabId(2)));
    assert_eq!(chat.history().len(), 8);
}

#[tokio::test]
async fn unreadable_page_still_answers() {
    let backend = ScriptedBackend::new(vec![Script::Finite(vec![text("No page."), stop()])]);
    let page = StaticPage::new("https://example.com/a", "Intro paragraph");
    page.fail();
    let mut chat = session(backend.clone(), page, AgentLoopConfig::default());

    let (outcome, _) = run(&mut chat, 9, "Hi").await;

    assert_eq!(outcome.status, TurnStatus::Done);
    let system = backend.requests()[0].system_instruction.clone().unwrap();
    assert!(system.contains("No page content is available"));
}

#[tokio::test]
async fn switch_to_unreadable_tab_announces_new_page() {
    let backend = ScriptedBackend::new(vec![
        Script::Finite(vec![text("one"), stop()]),
        Script::Finite(vec![text("two"), stop()]),
    ]);
    let page = StaticPage::new("https://example.com/a", "First page");
    let mut chat = session(backend.clone(), page.clone(), AgentLoopConfig::default());

    run(&mut chat, 1, "first").await;
    page.fail();
    run(&mut chat, 2, "second").await;

    let system = backend.requests()[1].system_instruction.clone().unwrap();
    assert!(system.contains("No page content is available"));
    assert!(system.contains("different page"));
    assert!(system.contains("https://example.com/a (tab 1)"));
    assert_eq!(chat.page().map(|page| page.tab), Some(TabId(2)));
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let backend = ScriptedBackend::new(Vec::new());
    let page = StaticPage::new("https://example.com/a", "Intro paragraph");
    let mut chat = session(backend.clone(), page, AgentLoopConfig::default());
    let (tx, _rx) = mpsc::channel(4);
    let result = chat
        .run_turn(TabId(1), "   ", tx, CancellationToken::new())
        .await;
    assert!(result.is_err());
    assert!(backend.requests().is_empty());
}
