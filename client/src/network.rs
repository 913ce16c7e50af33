use crate::commands::TurnNegotiator;
use crate::config::{ClientConfig, Role};
use crate::error::{ClientError, Result};
use crate::events::{EventChannel, EventKind, GameEvent, Subscription};
use crate::game::GameMirror;
use crate::http::{GameServerApi, SnapshotRequest};
use futures_util::future::LocalBoxFuture;
use futures_util::stream::{FuturesUnordered, SplitSink, SplitStream};
use futures_util::{FutureExt, SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{
    decode_server_message, encode_client_message, ClientMessage, Color, GamePhase, GameSnapshot,
    GameUpdate, Joined, PlayerTurn, ServerMessage, Target,
};
use std::cell::RefCell;
use std::rc::Rc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingSnapshot = LocalBoxFuture<'static, (SnapshotRequest, Result<GameSnapshot>)>;

/// Lifecycle of the single owned socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    /// The server or the transport ended the connection
    Closed,
}

struct Socket {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
}

/// Owns at most one WebSocket to the observer or player feed.
pub struct Connection {
    url: String,
    role: Role,
    state: ConnectionState,
    socket: Option<Socket>,
}

impl Connection {
    pub fn new(url: impl Into<String>, role: Role) -> Self {
        Self {
            url: url.into(),
            role,
            state: ConnectionState::Disconnected,
            socket: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Opens a fresh socket, tearing down any previous one first so a stale
    /// socket can never deliver frames again.
    pub async fn open(&mut self) -> Result<()> {
        if self.socket.is_some() {
            debug!("Tearing down previous socket before reconnecting");
            self.teardown().await;
        }

        self.state = ConnectionState::Connecting;
        info!("Connecting to {}...", self.url);

        match connect_async(self.url.as_str()).await {
            Ok((stream, _)) => {
                let (sink, stream) = stream.split();
                self.socket = Some(Socket { sink, stream });
                self.state = ConnectionState::Open;
                info!("Connected to {}", self.url);
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                error!("Failed to connect to {}: {}", self.url, e);
                Err(e.into())
            }
        }
    }

    pub async fn send(&mut self, message: &ClientMessage) -> Result<()> {
        if self.role == Role::Observer {
            return Err(ClientError::ReadOnly);
        }

        let state = self.state;
        let socket = match (self.socket.as_mut(), state) {
            (Some(socket), ConnectionState::Open) => socket,
            _ => return Err(ClientError::NotConnected { state }),
        };

        let text = encode_client_message(message)?;
        let result = socket.sink.send(Message::Text(text)).await;

        if let Err(e) = result {
            error!("Failed to send to {}: {}", self.url, e);
            self.mark_closed();
            return Err(e.into());
        }
        Ok(())
    }

    /// Waits for the next text frame.
    ///
    /// Returns `Ok(None)` once the server closes the socket. Without a socket
    /// this never resolves, which keeps it usable as a `select!` branch.
    pub async fn next_frame(&mut self) -> Result<Option<String>> {
        let Some(socket) = self.socket.as_mut() else {
            return std::future::pending().await;
        };

        loop {
            let frame = socket.stream.next().await;
            match frame {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => return Ok(Some(text)),
                    Err(_) => warn!("Dropping non-UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    info!("Server closed connection: {:?}", frame);
                    break;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    error!("WebSocket error: {}", e);
                    self.mark_closed();
                    return Err(e.into());
                }
                None => break,
            }
        }

        self.mark_closed();
        Ok(None)
    }

    /// Closes the socket. Returns whether one was open.
    pub async fn close(&mut self) -> bool {
        let was_open = self.is_open();
        self.teardown().await;
        self.state = ConnectionState::Disconnected;
        was_open
    }

    async fn teardown(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            if let Err(e) = socket.sink.close().await {
                debug!("Error while closing socket: {}", e);
            }
        }
    }

    fn mark_closed(&mut self) {
        self.socket = None;
        self.state = ConnectionState::Closed;
    }
}

/// Identity the server assigned to us on `joined`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub player_id: String,
    pub color: Color,
}

/// Requests fed into [`Client::run`] by the operator or the UI layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Connect,
    Disconnect,
    Sync,
    Start,
    Stop,
    SelectCommand(String),
    ClickTarget { x: u32, y: u32 },
    Shutdown,
}

/// Top-level client session: one connection, one mirror, one event channel.
pub struct Client {
    config: ClientConfig,
    events: Rc<EventChannel>,
    connection: Connection,
    api: GameServerApi,
    mirror: Rc<RefCell<GameMirror>>,
    negotiator: Rc<RefCell<TurnNegotiator>>,
    identity: Option<Identity>,
    scoped_subscriptions: Vec<Subscription>,
    pending: FuturesUnordered<PendingSnapshot>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_events(config, Rc::new(EventChannel::new()))
    }

    pub fn with_events(config: ClientConfig, events: Rc<EventChannel>) -> Self {
        Client {
            connection: Connection::new(config.socket_url(), config.role),
            api: GameServerApi::new(&config),
            mirror: Rc::new(RefCell::new(GameMirror::new(config.reject_stale_rounds))),
            negotiator: Rc::new(RefCell::new(TurnNegotiator::new())),
            identity: None,
            scoped_subscriptions: Vec::new(),
            pending: FuturesUnordered::new(),
            events,
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn events(&self) -> Rc<EventChannel> {
        Rc::clone(&self.events)
    }

    pub fn mirror(&self) -> Rc<RefCell<GameMirror>> {
        Rc::clone(&self.mirror)
    }

    pub fn negotiator(&self) -> Rc<RefCell<TurnNegotiator>> {
        Rc::clone(&self.negotiator)
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Subscribes for the lifetime of the current connection; `disconnect`
    /// detaches it. Subscribe on [`Client::events`] directly to outlive it.
    pub fn subscribe<F>(&mut self, kind: EventKind, handler: F) -> Subscription
    where
        F: FnMut(&GameEvent) + 'static,
    {
        let subscription = self.events.subscribe(kind, handler);
        self.scoped_subscriptions.push(subscription);
        subscription
    }

    /// Opens the socket and, for players, asks to join.
    pub async fn connect(&mut self) -> Result<()> {
        self.identity = None;
        self.negotiator.borrow_mut().reset();

        if let Err(e) = self.connection.open().await {
            self.events.emit(GameEvent::Connect(false));
            return Err(e);
        }
        self.events.emit(GameEvent::Connect(true));

        if self.config.role == Role::Player {
            self.join().await?;
        }
        Ok(())
    }

    pub async fn join(&mut self) -> Result<()> {
        info!("Joining game");
        self.send(&ClientMessage::Join).await
    }

    /// Processes frames until the server closes the socket.
    pub async fn listen(&mut self) -> Result<()> {
        if !self.connection.is_open() {
            return Err(ClientError::NotConnected {
                state: self.connection.state(),
            });
        }

        info!("Listening for messages...");
        loop {
            let frame = self.connection.next_frame().await;
            if !self.on_frame(frame) {
                return Ok(());
            }
        }
    }

    /// Closes the socket and detaches connection-scoped subscriptions.
    /// Safe to call at any time, including with requests in flight.
    pub async fn disconnect(&mut self) {
        if self.connection.close().await {
            info!("Disconnected from {}", self.connection.url());
            self.events.emit(GameEvent::Connect(false));
        }
        self.identity = None;
        self.events.unsubscribe_all(self.scoped_subscriptions.drain(..));
    }

    pub async fn sync(&mut self) -> Result<GameSnapshot> {
        self.fetch_and_apply(SnapshotRequest::Sync).await
    }

    pub async fn start(&mut self) -> Result<GameSnapshot> {
        self.fetch_and_apply(SnapshotRequest::Start).await
    }

    pub async fn stop(&mut self) -> Result<GameSnapshot> {
        self.fetch_and_apply(SnapshotRequest::Stop).await
    }

    /// Like [`Client::sync`] but falls back to `Waiting` when the server
    /// cannot be reached.
    pub async fn fetch_game_state(&mut self) -> GamePhase {
        match self.sync().await {
            Ok(snapshot) => snapshot.state,
            Err(e) => {
                warn!("Could not fetch game state: {}", e);
                GamePhase::Waiting
            }
        }
    }

    async fn fetch_and_apply(&mut self, request: SnapshotRequest) -> Result<GameSnapshot> {
        let snapshot = self.api.fetch(request).await?;
        self.apply_snapshot(request, snapshot.clone())?;
        Ok(snapshot)
    }

    /// Fires a snapshot request without waiting for it; [`Client::run`]
    /// applies the response whenever it lands.
    pub fn request(&mut self, request: SnapshotRequest) {
        let api = self.api.clone();
        debug!("Queueing {} request", request);
        self.pending.push(
            async move {
                let result = api.fetch(request).await;
                (request, result)
            }
            .boxed_local(),
        );
    }

    /// Applies a snapshot, then tells everyone about it.
    pub fn apply_snapshot(
        &mut self,
        request: SnapshotRequest,
        snapshot: GameSnapshot,
    ) -> Result<()> {
        self.mirror.borrow_mut().apply_snapshot(&snapshot)?;
        info!("Applied {} snapshot: {}", request, self.mirror.borrow());

        self.events.emit(GameEvent::State(snapshot.state));
        self.events.emit(GameEvent::Sync(snapshot));

        match request {
            SnapshotRequest::Start => self.events.emit(GameEvent::Start),
            SnapshotRequest::Stop => self.events.emit(GameEvent::Stop),
            SnapshotRequest::Sync => {}
        }
        Ok(())
    }

    /// Decodes and applies one inbound frame. Bad frames are logged and
    /// dropped; nothing here can end the connection.
    pub fn handle_frame(&mut self, text: &str) {
        let message = match decode_server_message(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping malformed frame: {}", e);
                return;
            }
        };

        debug!("Received {}", message.tag());
        match message {
            ServerMessage::GameUpdate(update) => self.on_game_update(update),
            ServerMessage::PlayerTurn(turn) => self.on_player_turn(turn),
            ServerMessage::Joined(joined) => self.on_joined(joined),
            ServerMessage::Unrecognized(tag) => warn!("Unknown message type: {}", tag),
        }
    }

    fn on_game_update(&mut self, update: GameUpdate) {
        let outcome = {
            let mut mirror = self.mirror.borrow_mut();
            let outcome = mirror.apply_delta(update.round, &update.map_changes);
            if !outcome.rejected {
                if let Some(players) = update.players {
                    mirror.replace_players(players);
                }
                if let Some(turn_number) = update.turn_number {
                    mirror.set_turn_number(turn_number);
                }
            }
            outcome
        };

        if outcome.rejected {
            return;
        }

        self.events.emit(GameEvent::Update {
            round: update.round,
            changes: outcome.applied,
        });
    }

    fn on_player_turn(&mut self, turn: PlayerTurn) {
        if let Some(turn_number) = turn.turn_number {
            self.mirror.borrow_mut().set_turn_number(turn_number);
        }
        self.negotiator
            .borrow_mut()
            .replace_commands(turn.available_commands.clone());

        self.events.emit(GameEvent::PlayerTurn(turn.available_commands));
    }

    fn on_joined(&mut self, joined: Joined) {
        if let Some(identity) = &self.identity {
            if identity.player_id != joined.player_id {
                warn!(
                    "Ignoring join as {} while already joined as {}; reconnect to change identity",
                    joined.player_id, identity.player_id
                );
                return;
            }
        }

        info!("Joined as {} ({})", joined.player_id, joined.color);
        self.identity = Some(Identity {
            player_id: joined.player_id.clone(),
            color: joined.color.clone(),
        });
        self.events.emit(GameEvent::Joined {
            player_id: joined.player_id,
            color: joined.color,
        });
    }

    /// Selects a command type for the current turn and returns its targets.
    pub fn select_command(&mut self, command_type: &str) -> Result<Vec<Target>> {
        let targets = self.negotiator.borrow_mut().select(command_type)?.to_vec();
        self.events
            .emit(GameEvent::CommandSelected(command_type.to_string()));
        Ok(targets)
    }

    /// Sends the selected command at `(x, y)`.
    pub async fn click_target(&mut self, x: u32, y: u32) -> Result<()> {
        self.events.emit(GameEvent::TargetClicked { x, y });
        self.ensure_can_send()?;

        let player_move = self.negotiator.borrow_mut().choose_target(x, y)?;
        self.send_move(player_move.command, player_move.targets).await
    }

    pub async fn send_move(&mut self, command: String, targets: Vec<Target>) -> Result<()> {
        info!("Sending {} at {:?}", command, targets);
        let message = ClientMessage::PlayerMove {
            command: command.clone(),
            targets: targets.clone(),
        };
        self.send(&message).await?;

        self.events.emit(GameEvent::MoveSent { command, targets });
        Ok(())
    }

    fn ensure_can_send(&self) -> Result<()> {
        if self.config.role == Role::Observer {
            return Err(ClientError::ReadOnly);
        }
        if !self.connection.is_open() {
            return Err(ClientError::NotConnected {
                state: self.connection.state(),
            });
        }
        Ok(())
    }

    async fn send(&mut self, message: &ClientMessage) -> Result<()> {
        let result = self.connection.send(message).await;
        if let Err(e) = &result {
            if e.is_transport() {
                self.events.emit(GameEvent::Connect(false));
            }
        }
        result
    }

    /// Handles a frame result; returns false once the socket is gone.
    fn on_frame(&mut self, frame: Result<Option<String>>) -> bool {
        match frame {
            Ok(Some(text)) => {
                self.handle_frame(&text);
                true
            }
            Ok(None) => {
                info!("Connection closed");
                self.events.emit(GameEvent::Connect(false));
                false
            }
            Err(e) => {
                error!("Connection lost: {}", e);
                self.events.emit(GameEvent::Connect(false));
                false
            }
        }
    }

    fn on_snapshot_response(&mut self, request: SnapshotRequest, result: Result<GameSnapshot>) {
        match result {
            Ok(snapshot) => {
                if let Err(e) = self.apply_snapshot(request, snapshot) {
                    warn!("Discarding {} snapshot: {}", request, e);
                }
            }
            Err(e) => warn!("{} request failed: {}", request, e),
        }
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        let result = match command {
            SessionCommand::Connect => self.connect().await,
            SessionCommand::Disconnect => {
                self.disconnect().await;
                Ok(())
            }
            SessionCommand::Sync => {
                self.request(SnapshotRequest::Sync);
                Ok(())
            }
            SessionCommand::Start => {
                self.request(SnapshotRequest::Start);
                Ok(())
            }
            SessionCommand::Stop => {
                self.request(SnapshotRequest::Stop);
                Ok(())
            }
            SessionCommand::SelectCommand(command_type) => {
                self.select_command(&command_type).map(|_| ())
            }
            SessionCommand::ClickTarget { x, y } => self.click_target(x, y).await,
            SessionCommand::Shutdown => Ok(()),
        };

        if let Err(e) = result {
            error!("Command failed: {}", e);
        }
    }

    /// Main loop: inbound frames, finished HTTP requests and session
    /// commands, one at a time, until `Shutdown` or the sender is dropped.
    pub async fn run(
        &mut self,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                frame = self.connection.next_frame() => {
                    self.on_frame(frame);
                },

                Some((request, result)) = self.pending.next(), if !self.pending.is_empty() => {
                    self.on_snapshot_response(request, result);
                },

                command = commands.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
            }
        }

        self.disconnect().await;
        Ok(())
    }
}
