//! Shared test doubles.
//!
//! - [`FakeBrowser`]: wiremock discovery endpoint plus a WebSocket server
//!   that answers commands through a script
//! - [`ScriptedClient`]: in-memory [`ProtocolClient`] with scripted
//!   evaluation results and call counters

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chart_cdp::identifiers::{HandlerId, RequestId, SessionId};
use chart_cdp::protocol::{Command, Event, TargetInfo};
use chart_cdp::transport::{EventHandler, EventRegistry};
use chart_cdp::{Error, ProtocolClient, Result};

// ============================================================================
// Tracing
// ============================================================================

/// Installs a test subscriber when `RUST_LOG` is set.
pub fn init_tracing() {
    if std::env::var_os("RUST_LOG").is_some() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

// ============================================================================
// Targets
// ============================================================================

/// Builds a `/json/list` entry.
pub fn target(id: &str, kind: &str, url: &str) -> Value {
    json!({ "id": id, "type": kind, "title": format!("Tab {id}"), "url": url })
}

/// Parses `/json/list` entries.
pub fn targets(list: &[Value]) -> Vec<TargetInfo> {
    serde_json::from_value(Value::Array(list.to_vec())).expect("target list")
}

/// An `ok: true` script envelope.
pub fn ok_envelope(data: Value) -> Value {
    json!({ "ok": true, "data": data })
}

// ============================================================================
// FakeBrowser
// ============================================================================

/// One command received by the fake browser.
#[derive(Debug, Clone)]
pub struct Incoming {
    pub id: u64,
    pub method: String,
    pub session_id: Option<String>,
    pub params: Value,
}

/// Maps a command to the messages sent back (replies and/or events).
pub type Script = Arc<dyn Fn(&Incoming) -> Vec<Value> + Send + Sync>;

/// Reply to `incoming` with `result`.
pub fn reply(incoming: &Incoming, result: Value) -> Value {
    let mut message = json!({ "id": incoming.id, "result": result });
    if let Some(session) = &incoming.session_id {
        message["sessionId"] = json!(session);
    }
    message
}

/// Error reply to `incoming`.
pub fn error_reply(incoming: &Incoming, code: i64, message: &str) -> Value {
    json!({ "id": incoming.id, "error": { "code": code, "message": message } })
}

/// Event scoped to a session.
pub fn session_event(method: &str, session: &str, params: Value) -> Value {
    json!({ "method": method, "sessionId": session, "params": params })
}

/// Answers attach and evaluate; everything else gets `{}`.
pub fn default_script(eval_value: Value) -> Script {
    Arc::new(move |incoming: &Incoming| {
        let result = match incoming.method.as_str() {
            "Target.attachToTarget" => {
                let target = incoming.params["targetId"].as_str().unwrap_or_default();
                json!({ "sessionId": format!("S-{target}") })
            }
            "Runtime.evaluate" => json!({ "result": { "type": "object", "value": eval_value } }),
            _ => json!({}),
        };
        vec![reply(incoming, result)]
    })
}

/// Discovery endpoint plus a scripted WebSocket server.
pub struct FakeBrowser {
    pub http: MockServer,
    pub ws_addr: SocketAddr,
    log: Arc<Mutex<Vec<Incoming>>>,
    outbound: Arc<Mutex<Vec<mpsc::UnboundedSender<Message>>>>,
    kill: CancellationToken,
}

impl FakeBrowser {
    /// Starts the fake browser listing `targets`.
    pub async fn start(target_list: Vec<Value>, script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let ws_addr = listener.local_addr().expect("addr");
        let log: Arc<Mutex<Vec<Incoming>>> = Arc::default();
        let outbound: Arc<Mutex<Vec<mpsc::UnboundedSender<Message>>>> = Arc::default();
        let kill = CancellationToken::new();

        let http = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Browser": "FakeChrome/1.0",
                "Protocol-Version": "1.3",
                "webSocketDebuggerUrl": format!("ws://{ws_addr}/devtools/browser/fake"),
            })))
            .mount(&http)
            .await;
        Mock::given(method("GET"))
            .and(path("/json/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(target_list)))
            .mount(&http)
            .await;

        tokio::spawn(accept_loop(
            listener,
            script,
            Arc::clone(&log),
            Arc::clone(&outbound),
            kill.clone(),
        ));

        Self {
            http,
            ws_addr,
            log,
            outbound,
            kill,
        }
    }

    /// Discovery endpoint URL.
    pub fn endpoint(&self) -> String {
        self.http.uri()
    }

    /// Commands received so far.
    pub fn received(&self) -> Vec<Incoming> {
        self.log.lock().clone()
    }

    /// Number of received commands with `method`.
    pub fn count(&self, method: &str) -> usize {
        self.log.lock().iter().filter(|i| i.method == method).count()
    }

    /// Pushes a message to every open connection.
    pub fn push(&self, message: Value) {
        for tx in self.outbound.lock().iter() {
            let _ = tx.send(Message::Text(message.to_string().into()));
        }
    }

    /// Closes every open connection from the server side.
    pub fn kill_connections(&self) {
        self.kill.cancel();
    }
}

async fn accept_loop(
    listener: TcpListener,
    script: Script,
    log: Arc<Mutex<Vec<Incoming>>>,
    outbound: Arc<Mutex<Vec<mpsc::UnboundedSender<Message>>>>,
    kill: CancellationToken,
) {
    while let Ok((stream, _)) = listener.accept().await {
        let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
            continue;
        };
        let (tx, rx) = mpsc::unbounded_channel();
        outbound.lock().push(tx.clone());
        tokio::spawn(serve_connection(
            ws,
            Arc::clone(&script),
            Arc::clone(&log),
            tx,
            rx,
            kill.clone(),
        ));
    }
}

async fn serve_connection(
    ws: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    script: Script,
    log: Arc<Mutex<Vec<Incoming>>>,
    tx: mpsc::UnboundedSender<Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
    kill: CancellationToken,
) {
    let (mut sink, mut source) = ws.split();
    loop {
        tokio::select! {
            () = kill.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            Some(message) = rx.recv() => {
                if sink.send(message).await.is_err() {
                    break;
                }
            }
            message = source.next() => {
                let Some(Ok(Message::Text(text))) = message else {
                    break;
                };
                let Ok(value) = serde_json::from_str::<Value>(&text) else {
                    continue;
                };
                let incoming = Incoming {
                    id: value["id"].as_u64().unwrap_or_default(),
                    method: value["method"].as_str().unwrap_or_default().to_string(),
                    session_id: value["sessionId"].as_str().map(str::to_string),
                    params: value.get("params").cloned().unwrap_or(Value::Null),
                };
                log.lock().push(incoming.clone());
                for out in script(&incoming) {
                    let _ = tx.send(Message::Text(out.to_string().into()));
                }
            }
        }
    }
}

// ============================================================================
// ScriptedClient
// ============================================================================

/// In-memory protocol client.
///
/// Evaluation results are popped from a queue; an empty queue answers with
/// `default_eval`. Every call is counted.
pub struct ScriptedClient {
    pub targets: Mutex<Vec<TargetInfo>>,
    pub eval_results: Mutex<VecDeque<Result<Value>>>,
    pub default_eval: Mutex<Value>,
    pub eval_delay: Mutex<Duration>,
    pub ack_delay: Mutex<Duration>,
    /// Delay for session-scoped `Page.*` commands other than acks. A delay
    /// past the request timeout fails with a request timeout.
    pub page_delay: Mutex<Duration>,
    pub connected: AtomicBool,
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub attaches: AtomicUsize,
    pub evaluates: AtomicUsize,
    pub acks: AtomicUsize,
    pub methods: Mutex<Vec<String>>,
    /// In-flight evaluations per session and the maximum ever seen.
    in_flight: Mutex<HashMap<SessionId, usize>>,
    pub max_in_flight_per_session: AtomicUsize,
    total_in_flight: AtomicUsize,
    pub max_in_flight_total: AtomicUsize,
    pub events: EventRegistry,
}

impl ScriptedClient {
    pub fn new(list: &[Value]) -> Arc<Self> {
        Arc::new(Self {
            targets: Mutex::new(targets(list)),
            eval_results: Mutex::new(VecDeque::new()),
            default_eval: Mutex::new(ok_envelope(json!({ "v": 1 }))),
            eval_delay: Mutex::new(Duration::ZERO),
            ack_delay: Mutex::new(Duration::ZERO),
            page_delay: Mutex::new(Duration::ZERO),
            connected: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            attaches: AtomicUsize::new(0),
            evaluates: AtomicUsize::new(0),
            acks: AtomicUsize::new(0),
            methods: Mutex::new(Vec::new()),
            in_flight: Mutex::new(HashMap::new()),
            max_in_flight_per_session: AtomicUsize::new(0),
            total_in_flight: AtomicUsize::new(0),
            max_in_flight_total: AtomicUsize::new(0),
            events: EventRegistry::new(),
        })
    }

    /// Queues evaluation outcomes, consumed in order.
    pub fn script_evals(&self, results: impl IntoIterator<Item = Result<Value>>) {
        self.eval_results.lock().extend(results);
    }

    /// Replaces the target list.
    pub fn set_targets(&self, list: &[Value]) {
        *self.targets.lock() = targets(list);
    }

    /// Delivers an event as the receive loop would.
    pub fn emit(&self, method: &str, session: &str, params: Value) -> usize {
        let event: Event =
            serde_json::from_value(session_event(method, session, params)).expect("event");
        self.events.dispatch(&event)
    }

    pub fn count(&self, method: &str) -> usize {
        self.methods.lock().iter().filter(|m| *m == method).count()
    }

    async fn run_evaluate(&self, session_id: &SessionId) -> Result<Value> {
        self.evaluates.fetch_add(1, Ordering::SeqCst);
        {
            let mut in_flight = self.in_flight.lock();
            let count = in_flight.entry(session_id.clone()).or_default();
            *count += 1;
            self.max_in_flight_per_session
                .fetch_max(*count, Ordering::SeqCst);
        }
        let total = self.total_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight_total.fetch_max(total, Ordering::SeqCst);

        let delay = *self.eval_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.total_in_flight.fetch_sub(1, Ordering::SeqCst);
        if let Some(count) = self.in_flight.lock().get_mut(session_id) {
            *count -= 1;
        }

        let scripted = self.eval_results.lock().pop_front();
        let value = match scripted {
            Some(result) => result?,
            None => self.default_eval.lock().clone(),
        };
        Ok(json!({ "result": { "type": "object", "value": value } }))
    }
}

#[async_trait]
impl ProtocolClient for ScriptedClient {
    async fn connect(&self) -> Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn list_targets(&self) -> Result<Vec<TargetInfo>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.targets.lock().clone())
    }

    async fn send(&self, command: Command, _timeout: Duration) -> Result<Value> {
        self.methods.lock().push(command.method().to_string());
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        match command {
            Command::Target(chart_cdp::protocol::TargetCommand::AttachToTarget {
                target_id, ..
            }) => {
                let n = self.attaches.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(json!({ "sessionId": format!("S{n}-{target_id}") }))
            }
            _ => Ok(json!({})),
        }
    }

    async fn send_on_session(
        &self,
        session_id: &SessionId,
        command: Command,
        timeout: Duration,
    ) -> Result<Value> {
        let method = command.method();
        self.methods.lock().push(method.to_string());
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        match method {
            "Runtime.evaluate" => self.run_evaluate(session_id).await,
            "Page.screencastFrameAck" => {
                let delay = *self.ack_delay.lock();
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                self.acks.fetch_add(1, Ordering::SeqCst);
                Ok(json!({}))
            }
            m if m.starts_with("Page.") => {
                let delay = *self.page_delay.lock();
                if delay > timeout {
                    tokio::time::sleep(timeout).await;
                    return Err(Error::request_timeout(
                        RequestId::new(0),
                        timeout.as_millis() as u64,
                    ));
                }
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(json!({}))
            }
            _ => Ok(json!({})),
        }
    }

    fn register_event_handler(&self, method: &str, handler: EventHandler) -> HandlerId {
        self.events.register(method, handler)
    }

    fn unregister_event_handler(&self, id: HandlerId) -> bool {
        self.events.unregister(id)
    }
}
