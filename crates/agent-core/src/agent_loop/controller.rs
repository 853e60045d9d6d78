//! Chat session controller.
//!
//! Runs one user turn at a time: prepares the page context, streams model
//! rounds, executes requested tools, and reports events to the caller.

use std::sync::Arc;

use futures::StreamExt;
use pagelens_core_types::{TabId, TurnId};
use pagelens_inference::{
    part, Content, InferenceBackend, InferenceError, InferenceRequest, StreamChunk, Usage,
};
use pagelens_snapshot_store::{PageInput, SnapshotStore};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::AgentLoopConfig;
use super::prompt::{format_page_section, format_system_prompt, PageIdentity, PageView};
use super::types::{ChatEvent, TurnStatus};
use crate::errors::AgentError;
use crate::ports::{NoPageWriter, PageExtractor, PageWriter};
use crate::tools::{self, ToolContext, ToolInvocation};

/// Result of one chat turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub status: TurnStatus,
    /// Visible answer text streamed during the turn, across all rounds.
    pub text: String,
    /// Model rounds started.
    pub rounds: u32,
    /// Conversation after the turn, including tool traffic.
    pub conversation: Vec<Content>,
    /// Set when the turn failed.
    pub error: Option<InferenceError>,
}

/// Per-connection chat state: history and the page the model last saw.
pub struct ChatSession {
    backend: Arc<dyn InferenceBackend>,
    store: Arc<dyn SnapshotStore>,
    extractor: Arc<dyn PageExtractor>,
    writer: Arc<dyn PageWriter>,
    config: AgentLoopConfig,
    history: Vec<Content>,
    page: Option<PageIdentity>,
    status: TurnStatus,
}

/// Content streamed during one round.
#[derive(Default)]
struct RoundBuffer {
    parts: Vec<Value>,
    text: String,
    calls: Vec<(String, Value)>,
    finish: Option<String>,
    usage: Option<Usage>,
}

enum RoundEnd {
    Completed(RoundBuffer),
    Cancelled(RoundBuffer),
    Failed(InferenceError),
}

/// Forwards events to the caller; a dropped receiver cancels the turn.
struct EventSink {
    tx: mpsc::Sender<ChatEvent>,
    cancel: CancellationToken,
}

impl EventSink {
    async fn emit(&self, event: ChatEvent) {
        let sent = tokio::select! {
            _ = self.cancel.cancelled() => return,
            sent = self.tx.send(event) => sent,
        };
        if sent.is_err() {
            self.disconnected();
        }
    }

    /// Delivered even after cancellation.
    async fn emit_final(&self, event: ChatEvent) {
        if self.tx.send(event).await.is_err() {
            self.disconnected();
        }
    }

    fn disconnected(&self) {
        if !self.cancel.is_cancelled() {
            info!(target: "agent-loop", "event receiver dropped; cancelling turn");
            self.cancel.cancel();
        }
    }
}

impl ChatSession {
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        store: Arc<dyn SnapshotStore>,
        extractor: Arc<dyn PageExtractor>,
        config: AgentLoopConfig,
    ) -> Self {
        Self {
            backend,
            store,
            extractor,
            writer: Arc::new(NoPageWriter),
            config,
            history: Vec::new(),
            page: None,
            status: TurnStatus::Idle,
        }
    }

    /// Attach the page-write channel used by `write_editor`.
    pub fn with_writer(mut self, writer: Arc<dyn PageWriter>) -> Self {
        self.writer = writer;
        self
    }

    /// Seed the conversation, e.g. from an external transcript store.
    pub fn with_history(mut self, history: Vec<Content>) -> Self {
        self.history = history;
        self
    }

    pub fn config(&self) -> &AgentLoopConfig {
        &self.config
    }

    pub fn history(&self) -> &[Content] {
        &self.history
    }

    pub fn status(&self) -> TurnStatus {
        self.status
    }

    /// Page the model was last told about.
    pub fn page(&self) -> Option<&PageIdentity> {
        self.page.as_ref()
    }

    /// Forget history and page identity.
    pub fn reset(&mut self) {
        self.history.clear();
        self.page = None;
        self.status = TurnStatus::Idle;
    }

    /// Run one user turn against `tab`.
    ///
    /// Events are sent on `events` as they happen and always end with
    /// [`ChatEvent::TurnComplete`]. Cancelling `cancel`, or dropping the
    /// receiver, stops the turn at the next checkpoint.
    pub async fn run_turn(
        &mut self,
        tab: TabId,
        message: impl Into<String>,
        events: mpsc::Sender<ChatEvent>,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome, AgentError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(AgentError::invalid_request("message is empty"));
        }
        let turn = TurnId::new();
        let sink = EventSink {
            tx: events,
            cancel: cancel.clone(),
        };

        self.status = TurnStatus::Preparing;
        info!(target: "agent-loop", turn = %turn, tab = %tab, mode = ?self.config.mode, "turn started");
        let swept = self.store.prune_stale().await;
        if swept.pruned > 0 {
            debug!(target: "agent-loop", pruned = swept.pruned, "pruned stale tabs before turn");
        }

        let mut conversation = self.history.clone();
        conversation.push(Content::user_text(message));
        let mut text = String::new();

        let Some(view) = self.prepare_page(tab, &cancel).await else {
            return Ok(self
                .abort(&sink, conversation, RoundBuffer::default(), text, 0)
                .await);
        };
        let system = self.system_instruction(tab, &view);
        let declarations = tools::declarations(self.config.mode);
        let limit = self.config.round_limit();
        let mut round = 0;

        loop {
            if cancel.is_cancelled() {
                return Ok(self
                    .abort(&sink, conversation, RoundBuffer::default(), text, round)
                    .await);
            }
            round += 1;
            self.status = TurnStatus::Streaming;
            let request = InferenceRequest::new(self.config.model.clone(), conversation.clone())
                .with_system_instruction(system.clone())
                .with_tools(declarations.clone())
                .with_params(self.config.generation.clone());
            debug!(target: "agent-loop", turn = %turn, round, messages = request.contents.len(), "streaming round");

            let buffer = match self.stream_round(request, &sink, &cancel).await {
                RoundEnd::Completed(buffer) => buffer,
                RoundEnd::Cancelled(buffer) => {
                    text.push_str(&buffer.text);
                    return Ok(self.abort(&sink, conversation, buffer, text, round).await);
                }
                RoundEnd::Failed(err) => {
                    return Ok(self.fail(&sink, conversation, err, text, round).await);
                }
            };
            text.push_str(&buffer.text);

            if buffer.calls.is_empty() || round >= limit {
                let mut parts = without_calls(buffer.parts);
                if !buffer.calls.is_empty() {
                    warn!(
                        target: "agent-loop",
                        turn = %turn,
                        round,
                        pending = buffer.calls.len(),
                        "round limit reached; ending turn without running tools"
                    );
                    let marker = self.config.round_limit_marker.clone();
                    parts.push(part::text(marker.clone()));
                    text.push_str(&marker);
                    sink.emit_final(ChatEvent::TextDelta { text: marker }).await;
                }
                let parts = coalesce_parts(parts);
                if parts.is_empty() {
                    // Recording it would leave two user turns in a row.
                    debug!(target: "agent-loop", turn = %turn, round, "empty reply; turn not recorded");
                    conversation.truncate(self.history.len());
                } else {
                    conversation.push(Content::model(parts));
                }
                if let Some(usage) = buffer.usage {
                    sink.emit_final(ChatEvent::Usage { usage }).await;
                }
                if let Some(reason) = buffer.finish {
                    sink.emit_final(ChatEvent::Finish { reason }).await;
                }
                sink.emit_final(ChatEvent::TurnComplete { aborted: false }).await;
                self.status = TurnStatus::Done;
                self.history = conversation.clone();
                info!(target: "agent-loop", turn = %turn, rounds = round, "turn completed");
                return Ok(TurnOutcome {
                    status: TurnStatus::Done,
                    text,
                    rounds: round,
                    conversation,
                    error: None,
                });
            }

            self.status = TurnStatus::ToolExecuting;
            conversation.push(Content::model(coalesce_parts(buffer.parts)));
            let responses = self.run_tools(tab, buffer.calls, round, &sink).await;
            conversation.push(Content::user(responses));
        }
    }

    /// Read the live page into the store. `None` when cancelled meanwhile.
    async fn prepare_page(&self, tab: TabId, cancel: &CancellationToken) -> Option<PageView> {
        let extracted = tokio::select! {
            _ = cancel.cancelled() => return None,
            extracted = self.extractor.extract(tab) => extracted,
        };
        let mut view = PageView::default();
        match extracted {
            Ok(Some(page)) => {
                let outcome = self.store.push(tab, PageInput::from(page)).await;
                view.editors = outcome
                    .snapshot
                    .editor_contents
                    .iter()
                    .flatten()
                    .map(|(key, content)| (key.clone(), content.label.clone()))
                    .collect();
                debug!(target: "agent-loop", tab = %tab, diff = outcome.diff.kind(), "page ingested");
                view.diff = Some(outcome.diff);
            }
            Ok(None) => {
                info!(target: "agent-loop", tab = %tab, "page content unavailable");
            }
            Err(err) => {
                warn!(target: "agent-loop", tab = %tab, error = %err, "page extraction failed");
            }
        }
        view.meta = self.store.get_meta(tab).await;
        Some(view)
    }

    fn system_instruction(&mut self, tab: TabId, view: &PageView) -> String {
        let identity = PageIdentity {
            tab,
            url: view.url().map(str::to_string),
        };
        let switched_from = self
            .page
            .as_ref()
            .filter(|previous| previous.switched_to(&identity))
            .cloned();
        if let Some(previous) = &switched_from {
            info!(
                target: "agent-loop",
                from_tab = %previous.tab,
                to_tab = %tab,
                "active page changed since last turn"
            );
        }
        let keep_previous = identity.url.is_none()
            && self.page.as_ref().map(|page| page.tab) == Some(tab);
        if !keep_previous {
            self.page = Some(identity);
        }
        let section = format_page_section(tab, view, switched_from.as_ref());
        format_system_prompt(self.config.persona.as_deref(), self.config.mode, &section)
    }

    async fn stream_round(
        &self,
        request: InferenceRequest,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> RoundEnd {
        let mut stream = self.backend.stream(request, cancel.clone());
        let mut buffer = RoundBuffer::default();
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return RoundEnd::Cancelled(buffer),
                next = stream.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };
            match chunk {
                StreamChunk::Text { text, part } => {
                    buffer.text.push_str(&text);
                    buffer.parts.push(part);
                    sink.emit(ChatEvent::TextDelta { text }).await;
                }
                StreamChunk::Thinking { text, part } => {
                    buffer.parts.push(part);
                    sink.emit(ChatEvent::ThinkingDelta { text }).await;
                }
                StreamChunk::ToolCall { name, args, part } => {
                    buffer.parts.push(part);
                    buffer.calls.push((name, args));
                }
                StreamChunk::Finish { reason } => buffer.finish = Some(reason),
                StreamChunk::Usage(usage) => buffer.usage = Some(usage),
                StreamChunk::Error(err) => return RoundEnd::Failed(err),
            }
        }
        if cancel.is_cancelled() {
            RoundEnd::Cancelled(buffer)
        } else {
            RoundEnd::Completed(buffer)
        }
    }

    /// Execute calls in order; each yields one function response part.
    async fn run_tools(
        &self,
        tab: TabId,
        calls: Vec<(String, Value)>,
        round: u32,
        sink: &EventSink,
    ) -> Vec<Value> {
        let ctx = ToolContext {
            tab,
            mode: self.config.mode,
            store: self.store.as_ref(),
            writer: self.writer.as_ref(),
        };
        let mut responses = Vec::with_capacity(calls.len());
        for (name, args) in calls {
            let invocation = ToolInvocation::parse(&name, &args);
            sink.emit(ChatEvent::ToolCall {
                name: name.clone(),
                args,
                source: invocation.as_ref().ok().and_then(ToolInvocation::source),
                round,
            })
            .await;
            let result = match invocation {
                Ok(invocation) => tools::execute(&invocation, &ctx).await,
                Err(err) => Err(err),
            };
            let response = match result {
                Ok(value) => value,
                Err(err) => {
                    warn!(target: "agent-loop", tool = %name, round, error = %err, "tool call failed");
                    err.to_response()
                }
            };
            responses.push(part::function_response(&name, response));
        }
        responses
    }

    async fn abort(
        &mut self,
        sink: &EventSink,
        mut conversation: Vec<Content>,
        buffer: RoundBuffer,
        mut text: String,
        rounds: u32,
    ) -> TurnOutcome {
        let marker = self.config.stopped_marker.clone();
        let mut parts = coalesce_parts(without_calls(buffer.parts));
        parts.push(part::text(marker.clone()));
        conversation.push(Content::model(coalesce_parts(parts)));
        text.push_str(&marker);

        sink.emit_final(ChatEvent::TextDelta { text: marker }).await;
        sink.emit_final(ChatEvent::TurnComplete { aborted: true }).await;
        self.status = TurnStatus::Aborted;
        self.history = conversation.clone();
        info!(target: "agent-loop", rounds, "turn stopped by user");
        TurnOutcome {
            status: TurnStatus::Aborted,
            text,
            rounds,
            conversation,
            error: None,
        }
    }

    async fn fail(
        &mut self,
        sink: &EventSink,
        conversation: Vec<Content>,
        err: InferenceError,
        text: String,
        rounds: u32,
    ) -> TurnOutcome {
        warn!(target: "agent-loop", rounds, error = %err, "turn failed");
        sink.emit_final(ChatEvent::Error {
            message: err.to_string(),
        })
        .await;
        sink.emit_final(ChatEvent::TurnComplete { aborted: false }).await;
        self.status = TurnStatus::Failed;
        TurnOutcome {
            status: TurnStatus::Failed,
            text,
            rounds,
            conversation,
            error: Some(err),
        }
    }
}

fn without_calls(parts: Vec<Value>) -> Vec<Value> {
    parts
        .into_iter()
        .filter(|p| !part::is_function_call(p))
        .collect()
}

fn is_plain_text(value: &Value) -> bool {
    value.get("text").is_some_and(Value::is_string)
        && !part::is_thought(value)
        && !part::has_signature(value)
}

/// Merge runs of plain text parts. Thoughts, calls and signed parts are kept
/// verbatim.
pub(crate) fn coalesce_parts(parts: Vec<Value>) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(parts.len());
    for current in parts {
        if is_plain_text(&current) {
            if let Some(last) = out.last_mut().filter(|last| is_plain_text(last)) {
                let addition = current
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if let Some(Value::String(existing)) = last.get_mut("text") {
                    existing.push_str(addition);
                    continue;
                }
            }
        }
        out.push(current);
    }
    out
}
