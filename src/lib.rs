//! bevy_dinner_chat: a dinner-menu chat widget over an openai-style
//! chat completion endpoint.
//!
//! - `ChatController` owns the transcript and status of one conversation and
//!   drives the ui only through the `ChatView` capability trait.
//! - the plugin keeps one controller per `ChatSession` entity and re-emits every
//!   view call as a `ChatViewEvt`, so any ui (bevy ui, console, tests) can render it.
//! - never blocks the main thread: on native the http call runs on a tiny tokio
//!   runtime (no bevy pool blocking); on wasm we use bevy's async pool, which
//!   yields to the browser/event loop.
//! - at most one request per session is in flight; replies come back through a
//!   bounded inbox drained on the main thread.

use bevy::prelude::*;
use bevy::tasks::AsyncComputeTaskPool;
use flume::{Receiver, Sender, TryRecvError};
use std::sync::Arc;

pub mod config;
pub mod controller;
pub mod error;
pub mod status;
pub mod transcript;
pub mod transport;
pub mod view;
pub mod wire;

pub use config::{ChatConfig, StatusLabels};
pub use controller::{ChatController, PendingRequest, RequestId, Submission};
pub use error::ChatError;
pub use status::ApiStatus;
pub use transcript::{ChatRole, Transcript, Turn};
pub use transport::{CompletionTransport, default_transport};
pub use view::{ChatView, MessageId, ViewCommand};
pub use wire::{CompletionRequest, HttpReply};

/// the http transport every session uses.
///
/// inserted with the platform default by the plugin unless already present;
/// insert your own before adding the plugin to swap it (e.g. a proxy or a mock).
#[derive(Resource, Clone)]
pub struct ChatTransport(pub Arc<dyn CompletionTransport>);

impl Default for ChatTransport {
    fn default() -> Self {
        Self(default_transport())
    }
}

/// on native we keep a tiny tokio runtime to drive transport futures.
/// we spawn onto this rt from compute tasks so neither the main thread
/// nor bevy's compute pools block.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Resource, Clone)]
pub struct TokioRt(pub Arc<tokio::runtime::Runtime>);

#[cfg(not(target_arch = "wasm32"))]
impl Default for TokioRt {
    fn default() -> Self {
        info!(target: "dinner_chat", "DinnerChat: initializing Tokio multi-thread runtime (native)");
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("tokio runtime");
        Self(Arc::new(rt))
    }
}

/// system ordering so uis can run after we emit events
#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum ChatSet {
    /// dinner chat emits Chat* events here (in `Update`)
    Drain,
}

/// one conversation. the controller is initialized (status + greeting) the
/// frame the component is added.
#[derive(Component)]
pub struct ChatSession {
    controller: ChatController,
}

impl ChatSession {
    pub fn new(config: impl Into<Arc<ChatConfig>>) -> Self {
        Self { controller: ChatController::new(config) }
    }

    pub fn controller(&self) -> &ChatController {
        &self.controller
    }
}

/// insert this component to submit user text for the session entity.
#[derive(Component, Clone, Debug)]
pub struct ChatSubmit {
    pub text: String,
}

/// helper to submit input text on a session entity.
pub fn submit_user_text(commands: &mut Commands, target: Entity, text: impl Into<String>) {
    let text = text.into();
    info!(target: "dinner_chat", "submit_user_text -> len={}", text.len());
    commands.entity(target).insert(ChatSubmit { text });
}

/// every view call of a session, in order.
#[derive(Event, Debug, Clone)]
pub struct ChatViewEvt {
    pub entity: Entity,
    pub command: ViewCommand,
}
#[derive(Event, Debug)]
pub struct ChatStarted {
    pub entity: Entity,
    pub request: RequestId,
}
#[derive(Event, Debug)]
pub struct ChatCompletedEvt {
    pub entity: Entity,
    pub reply: String,
}
#[derive(Event, Debug)]
pub struct ChatErrorEvt {
    pub entity: Entity,
    pub error: ChatError,
}

/// cross-thread inbox for replies; producers send, main thread drains.
#[derive(Resource, Clone)]
struct ReplyInbox {
    tx: Sender<ReplyMsg>,
    rx: Receiver<ReplyMsg>,
}

impl Default for ReplyInbox {
    fn default() -> Self {
        let (tx, rx) = flume::bounded(256);
        Self { tx, rx }
    }
}

#[derive(Debug)]
struct ReplyMsg {
    entity: Entity,
    request: RequestId,
    result: Result<HttpReply, ChatError>,
}

/// send to inbox; waits (without blocking the thread) while full, drops if the app is gone.
async fn push_inbox(tx: &Sender<ReplyMsg>, msg: ReplyMsg) {
    if tx.send_async(msg).await.is_err() {
        debug!(target: "dinner_chat", "reply inbox closed; reply dropped");
    }
}

fn write_view(ev_view: &mut EventWriter<ChatViewEvt>, entity: Entity, commands: Vec<ViewCommand>) {
    for command in commands {
        ev_view.write(ChatViewEvt { entity, command });
    }
}

/// bevy plugin: wires systems, events, resources.
/// inserts the platform transport (and on native a tiny tokio runtime) unless present.
pub struct DinnerChatPlugin;

impl Plugin for DinnerChatPlugin {
    fn build(&self, app: &mut App) {
        info!(target: "dinner_chat", "DinnerChatPlugin: build()");
        app.init_resource::<ReplyInbox>()
            .init_resource::<ChatTransport>()
            .add_event::<ChatViewEvt>()
            .add_event::<ChatStarted>()
            .add_event::<ChatCompletedEvt>()
            .add_event::<ChatErrorEvt>()
            // write + read events in the same schedule (Update)
            .configure_sets(Update, ChatSet::Drain)
            .add_systems(
                Update,
                (initialize_sessions, spawn_chat_requests, drain_reply_inbox)
                    .chain()
                    .in_set(ChatSet::Drain),
            );

        #[cfg(not(target_arch = "wasm32"))]
        if app.world().get_resource::<TokioRt>().is_none() {
            app.insert_resource(TokioRt::default());
        }
    }
}

/// greets each newly added session exactly once.
fn initialize_sessions(
    mut q: Query<(Entity, &mut ChatSession), Added<ChatSession>>,
    mut ev_view: EventWriter<ChatViewEvt>,
) {
    for (e, mut session) in q.iter_mut() {
        let mut view: Vec<ViewCommand> = Vec::new();
        session.controller.initialize(&mut view);
        write_view(&mut ev_view, e, view);
    }
}

/// applies pending submissions and spawns the http call for each dispatched one.
#[allow(clippy::too_many_arguments)]
fn spawn_chat_requests(
    mut commands: Commands,
    transport: Res<ChatTransport>,
    inbox: Res<ReplyInbox>,
    mut q: Query<(Entity, &mut ChatSession, &ChatSubmit)>,
    mut ev_view: EventWriter<ChatViewEvt>,
    mut ev_start: EventWriter<ChatStarted>,
    mut ev_err: EventWriter<ChatErrorEvt>,

    // native-only: small runtime to drive transport futures
    #[cfg(not(target_arch = "wasm32"))] rt: Res<TokioRt>,
) {
    for (e, mut session, submit) in q.iter_mut() {
        // one-shot marker removal
        commands.entity(e).remove::<ChatSubmit>();

        let mut view: Vec<ViewCommand> = Vec::new();
        let submission = session.controller.begin_submit(&submit.text, &mut view);
        write_view(&mut ev_view, e, view);

        let req = match submission {
            Submission::Ignored => {
                debug!(target: "dinner_chat", "spawn_chat_requests: entity={:?} submission ignored", e);
                continue;
            }
            Submission::Failed(error) => {
                ev_err.write(ChatErrorEvt { entity: e, error });
                continue;
            }
            Submission::Dispatch(req) => req,
        };

        info!(target: "dinner_chat",
            "spawn_chat_requests: entity={:?} request={:?} msgs={} body_len={}",
            e, req.id, req.message_count, req.body.len()
        );
        ev_start.write(ChatStarted { entity: e, request: req.id });

        let transport = transport.0.clone();
        let run_tx = inbox.tx.clone();
        let pool = AsyncComputeTaskPool::get();
        #[cfg(not(target_arch = "wasm32"))]
        let (rt, join_tx) = (rt.0.clone(), inbox.tx.clone());

        // spawn an async compute task; internally we hand off to tokio (native).
        pool.spawn(async move {
            let request = req.id;
            let run = async move {
                let result = transport.post_json(&req.url, &req.bearer, req.body).await;
                push_inbox(&run_tx, ReplyMsg { entity: e, request, result }).await;
            };

            #[cfg(target_arch = "wasm32")]
            {
                // wasm path: just await directly (no tokio).
                run.await;
            }
            #[cfg(not(target_arch = "wasm32"))]
            {
                // native: hand off to tokio so bevy pools stay free.
                if let Err(join) = rt.spawn(run).await {
                    error!(target: "dinner_chat", "request task failed: {}", join);
                    let result = Err(ChatError::Transport(join.to_string()));
                    push_inbox(&join_tx, ReplyMsg { entity: e, request, result }).await;
                }
            }
        })
        .detach();
    }
}

/// drains the inbox, finishes the matching requests and emits user-facing events.
fn drain_reply_inbox(
    inbox: Res<ReplyInbox>,
    mut q: Query<&mut ChatSession>,
    mut ev_view: EventWriter<ChatViewEvt>,
    mut ev_done: EventWriter<ChatCompletedEvt>,
    mut ev_err: EventWriter<ChatErrorEvt>,
) {
    // drain up to a cap per frame to avoid long frames
    const MAX_PER_FRAME: usize = 64;
    for _ in 0..MAX_PER_FRAME {
        let msg = match inbox.rx.try_recv() {
            Ok(m) => m,
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => break,
        };
        let ReplyMsg { entity, request, result } = msg;
        let Ok(mut session) = q.get_mut(entity) else {
            warn!(target: "dinner_chat", "reply for despawned session {:?} dropped", entity);
            continue;
        };

        let mut view: Vec<ViewCommand> = Vec::new();
        let outcome = session.controller.finish(request, result, &mut view);
        write_view(&mut ev_view, entity, view);
        match outcome {
            Some(Ok(reply)) => {
                ev_done.write(ChatCompletedEvt { entity, reply });
            }
            Some(Err(error)) => {
                ev_err.write(ChatErrorEvt { entity, error });
            }
            None => {}
        }
    }
}
