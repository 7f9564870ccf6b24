//! The room actor: one task that owns the authoritative state.
//!
//! Transport events arrive on one channel in order; the actor applies
//! the room rules and resolves each delivery instruction against the
//! connection map. Sessions outlive connections, so the actor keeps the
//! binding between them: a disconnect parks the session in grace, a
//! resume rebinds it to the new connection.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use atrium_net::{ConnectionId, ConnectionMap, ServerEvent};
use atrium_room::{
    ClientMessage, Outbound, RoomServer, ServerMessage, SessionId, deserialize_message,
    serialize_message,
};
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// How often grace windows are checked. A session expires within one
/// interval of its deadline.
pub const GRACE_SWEEP_INTERVAL: Duration = Duration::from_millis(250);

/// Owns the room rules and the session/connection bindings.
pub struct RoomTask {
    room: RoomServer,
    connections: Arc<ConnectionMap>,
    session_by_connection: FxHashMap<ConnectionId, SessionId>,
    connection_by_session: FxHashMap<SessionId, ConnectionId>,
}

impl RoomTask {
    pub fn new(connections: Arc<ConnectionMap>) -> Self {
        Self {
            room: RoomServer::new(),
            connections,
            session_by_connection: FxHashMap::default(),
            connection_by_session: FxHashMap::default(),
        }
    }

    /// Drive the room until the transport's event stream closes.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<ServerEvent>) {
        let mut sweep = tokio::time::interval(GRACE_SWEEP_INTERVAL);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
                _ = sweep.tick() => self.sweep(Instant::now()).await,
            }
        }
        info!("room task stopped");
    }

    async fn handle_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Connected { connection, addr } => {
                debug!(connection = connection.0, peer = %addr, "awaiting join or resume");
            }
            ServerEvent::Message {
                connection,
                payload,
            } => match deserialize_message::<ClientMessage>(&payload) {
                Ok(message) => self.handle_message(connection, message).await,
                Err(error) => {
                    warn!(connection = connection.0, %error, "undecodable frame dropped");
                }
            },
            ServerEvent::Disconnected { connection } => {
                if let Some(id) = self.unbind(connection) {
                    let events = self.room.on_leave(id, false, Instant::now());
                    self.deliver(None, events).await;
                }
            }
        }
    }

    async fn handle_message(&mut self, connection: ConnectionId, message: ClientMessage) {
        match message {
            ClientMessage::Join {
                name,
                avatar_key,
                env_key,
            } => {
                // A second join on the same connection abandons the old
                // session outright.
                if let Some(old) = self.unbind(connection) {
                    let events = self.room.on_leave(old, true, Instant::now());
                    self.deliver(Some(connection), events).await;
                }
                let (id, events) = self.room.join(&name, &avatar_key, &env_key);
                self.bind(connection, id);
                self.deliver(Some(connection), events).await;
            }
            ClientMessage::Resume { session_id } => {
                let events = self.room.resume(session_id);
                if self.room.player(session_id).is_some() {
                    self.kick_stale_binding(session_id, connection).await;
                    self.bind(connection, session_id);
                }
                self.deliver(Some(connection), events).await;
            }
            ClientMessage::Move(update) => {
                if let Some(id) = self.session_of(connection) {
                    let events = self.room.on_move(id, update);
                    self.deliver(Some(connection), events).await;
                } else {
                    debug!(connection = connection.0, "move before join dropped");
                }
            }
            ClientMessage::Chat { text } => {
                if let Some(id) = self.session_of(connection) {
                    let events = self.room.on_chat(id, &text, wall_clock_ms());
                    self.deliver(Some(connection), events).await;
                }
            }
            ClientMessage::Emote { emote } => {
                if let Some(id) = self.session_of(connection) {
                    let events = self.room.on_emote(id, &emote);
                    self.deliver(Some(connection), events).await;
                }
            }
            ClientMessage::Leave => {
                if let Some(id) = self.unbind(connection) {
                    let events = self.room.on_leave(id, true, Instant::now());
                    // Close the leaver's stream before fanning out, so it
                    // does not hear its own departure.
                    self.connections.remove(&connection).await;
                    self.deliver(None, events).await;
                }
            }
        }
    }

    /// Expire grace sessions as of `now`.
    async fn sweep(&mut self, now: Instant) {
        let events = self.room.sweep_expired(now);
        self.deliver(None, events).await;
    }

    // -----------------------------------------------------------------
    // Bindings
    // -----------------------------------------------------------------

    fn session_of(&self, connection: ConnectionId) -> Option<SessionId> {
        self.session_by_connection.get(&connection).copied()
    }

    fn bind(&mut self, connection: ConnectionId, id: SessionId) {
        self.session_by_connection.insert(connection, id);
        self.connection_by_session.insert(id, connection);
    }

    fn unbind(&mut self, connection: ConnectionId) -> Option<SessionId> {
        let id = self.session_by_connection.remove(&connection)?;
        // The reverse entry may already point at a newer connection
        // after a resume; only clear it if it is still ours.
        if self.connection_by_session.get(&id) == Some(&connection) {
            self.connection_by_session.remove(&id);
        }
        Some(id)
    }

    /// A resume is claiming a session that still has a (dead or hijacked)
    /// connection bound. The newest connection wins; the old one is
    /// unbound and closed.
    async fn kick_stale_binding(&mut self, id: SessionId, newcomer: ConnectionId) {
        if let Some(old) = self.connection_by_session.get(&id).copied()
            && old != newcomer
        {
            warn!(session = %id, stale = old.0, takeover = newcomer.0, "closing stale connection");
            self.session_by_connection.remove(&old);
            self.connections.remove(&old).await;
        }
    }

    // -----------------------------------------------------------------
    // Delivery
    // -----------------------------------------------------------------

    async fn deliver(&self, origin: Option<ConnectionId>, events: Vec<Outbound>) {
        for event in events {
            match event {
                Outbound::Reply(message) => {
                    let Some(connection) = origin else {
                        warn!("reply with no originating connection dropped");
                        continue;
                    };
                    if let Some(bytes) = encode(&message) {
                        self.connections.send_to(connection, bytes).await;
                    }
                }
                Outbound::BroadcastExcept(skip, message) => {
                    if let Some(bytes) = encode(&message) {
                        self.send_sessions(Some(skip), bytes).await;
                    }
                }
                Outbound::Broadcast(message) => {
                    if let Some(bytes) = encode(&message) {
                        self.send_sessions(None, bytes).await;
                    }
                }
            }
        }
    }

    /// Send to every bound session's connection. Connections that have
    /// not joined yet hear nothing.
    async fn send_sessions(&self, skip: Option<SessionId>, bytes: Vec<u8>) {
        for (id, connection) in &self.connection_by_session {
            if Some(*id) == skip {
                continue;
            }
            self.connections.send_to(*connection, bytes.clone()).await;
        }
    }
}

fn encode(message: &ServerMessage) -> Option<Vec<u8>> {
    match serialize_message(message) {
        Ok(bytes) => Some(bytes),
        Err(error) => {
            warn!(%error, "failed to encode server message");
            None
        }
    }
}

fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use atrium_room::{MoveUpdate, RECONNECT_GRACE};
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Peer {
        connection: ConnectionId,
        rx: UnboundedReceiver<Vec<u8>>,
    }

    impl Peer {
        fn try_next(&mut self) -> Option<ServerMessage> {
            self.rx
                .try_recv()
                .ok()
                .map(|bytes| deserialize_message(&bytes).unwrap())
        }

        fn drain(&mut self) -> Vec<ServerMessage> {
            let mut messages = Vec::new();
            while let Some(message) = self.try_next() {
                messages.push(message);
            }
            messages
        }
    }

    async fn peer(connections: &ConnectionMap, id: u64) -> Peer {
        let (tx, rx) = mpsc::unbounded_channel();
        connections.insert(ConnectionId(id), tx).await.unwrap();
        Peer {
            connection: ConnectionId(id),
            rx,
        }
    }

    fn fixture() -> (RoomTask, Arc<ConnectionMap>) {
        let connections = Arc::new(ConnectionMap::new(16));
        (RoomTask::new(Arc::clone(&connections)), connections)
    }

    fn message_event(connection: ConnectionId, message: &ClientMessage) -> ServerEvent {
        ServerEvent::Message {
            connection,
            payload: serialize_message(message).unwrap(),
        }
    }

    async fn join(task: &mut RoomTask, who: &mut Peer, name: &str) -> SessionId {
        task.handle_event(message_event(
            who.connection,
            &ClientMessage::Join {
                name: name.into(),
                avatar_key: "scout".into(),
                env_key: "whitespace".into(),
            },
        ))
        .await;
        who.drain()
            .into_iter()
            .find_map(|m| match m {
                ServerMessage::Welcome { session_id, .. } => Some(session_id),
                _ => None,
            })
            .expect("no welcome after join")
    }

    async fn send_move(task: &mut RoomTask, from: ConnectionId, x: f32) {
        task.handle_event(message_event(
            from,
            &ClientMessage::Move(MoveUpdate {
                x: Some(x),
                ..MoveUpdate::default()
            }),
        ))
        .await;
    }

    #[tokio::test]
    async fn test_join_welcomes_and_announces() {
        let (mut task, connections) = fixture();
        let mut ada = peer(&connections, 1).await;
        let mut grace = peer(&connections, 2).await;

        join(&mut task, &mut ada, "Ada").await;
        let b = join(&mut task, &mut grace, "Grace").await;

        // Ada hears the announcement exactly once.
        match ada.try_next() {
            Some(ServerMessage::PlayerJoined { player }) => {
                assert_eq!(player.id, b);
                assert_eq!(player.name, "Grace");
            }
            other => panic!("expected PlayerJoined, got {other:?}"),
        }
        assert!(ada.try_next().is_none());
    }

    #[tokio::test]
    async fn test_move_reaches_others_but_not_sender() {
        let (mut task, connections) = fixture();
        let mut ada = peer(&connections, 1).await;
        let mut grace = peer(&connections, 2).await;
        let a = join(&mut task, &mut ada, "Ada").await;
        join(&mut task, &mut grace, "Grace").await;
        ada.drain();

        send_move(&mut task, ada.connection, 5.0).await;

        match grace.try_next() {
            Some(ServerMessage::PlayerDelta { id, update }) => {
                assert_eq!(id, a);
                assert_eq!(update.x, Some(5.0));
            }
            other => panic!("expected PlayerDelta, got {other:?}"),
        }
        assert!(ada.try_next().is_none());
    }

    #[tokio::test]
    async fn test_move_before_join_dropped() {
        let (mut task, connections) = fixture();
        let mut ada = peer(&connections, 1).await;
        join(&mut task, &mut ada, "Ada").await;
        let mut stranger = peer(&connections, 9).await;

        send_move(&mut task, stranger.connection, 5.0).await;

        assert!(ada.try_next().is_none());
        assert!(stranger.try_next().is_none());
    }

    #[tokio::test]
    async fn test_chat_echoes_to_everyone_with_timestamp() {
        let (mut task, connections) = fixture();
        let mut ada = peer(&connections, 1).await;
        let mut grace = peer(&connections, 2).await;
        let a = join(&mut task, &mut ada, "Ada").await;
        join(&mut task, &mut grace, "Grace").await;
        ada.drain();

        task.handle_event(message_event(
            ada.connection,
            &ClientMessage::Chat {
                text: "  hello  ".into(),
            },
        ))
        .await;

        for who in [&mut ada, &mut grace] {
            match who.try_next() {
                Some(ServerMessage::Chat {
                    id,
                    text,
                    timestamp_ms,
                    ..
                }) => {
                    assert_eq!(id, a);
                    assert_eq!(text, "hello");
                    assert!(timestamp_ms > 0);
                }
                other => panic!("expected Chat, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_emote_rebroadcast_includes_sender() {
        let (mut task, connections) = fixture();
        let mut ada = peer(&connections, 1).await;
        let a = join(&mut task, &mut ada, "Ada").await;

        task.handle_event(message_event(
            ada.connection,
            &ClientMessage::Emote {
                emote: "wave".into(),
            },
        ))
        .await;

        match ada.try_next() {
            Some(ServerMessage::Emote { id, emote }) => {
                assert_eq!(id, a);
                assert_eq!(emote, "wave");
            }
            other => panic!("expected Emote, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_leave_notifies_others_and_closes_stream() {
        let (mut task, connections) = fixture();
        let mut ada = peer(&connections, 1).await;
        let mut grace = peer(&connections, 2).await;
        let a = join(&mut task, &mut ada, "Ada").await;
        join(&mut task, &mut grace, "Grace").await;

        task.handle_event(message_event(ada.connection, &ClientMessage::Leave))
            .await;

        assert!(matches!(
            grace.try_next(),
            Some(ServerMessage::PlayerLeft { id }) if id == a
        ));
        assert_eq!(connections.len().await, 1);
    }

    #[tokio::test]
    async fn test_disconnect_is_silent_until_grace_expires() {
        let (mut task, connections) = fixture();
        let mut ada = peer(&connections, 1).await;
        let mut grace = peer(&connections, 2).await;
        let a = join(&mut task, &mut ada, "Ada").await;
        join(&mut task, &mut grace, "Grace").await;

        task.handle_event(ServerEvent::Disconnected {
            connection: ada.connection,
        })
        .await;
        assert!(grace.try_next().is_none());

        task.sweep(Instant::now() + RECONNECT_GRACE).await;
        assert!(matches!(
            grace.try_next(),
            Some(ServerMessage::PlayerLeft { id }) if id == a
        ));
    }

    #[tokio::test]
    async fn test_resume_rebinds_and_survives_sweep() {
        let (mut task, connections) = fixture();
        let mut ada = peer(&connections, 1).await;
        let mut grace = peer(&connections, 2).await;
        let a = join(&mut task, &mut ada, "Ada").await;
        join(&mut task, &mut grace, "Grace").await;
        send_move(&mut task, ada.connection, 7.0).await;

        task.handle_event(ServerEvent::Disconnected {
            connection: ada.connection,
        })
        .await;

        let mut revenant = peer(&connections, 3).await;
        task.handle_event(message_event(
            revenant.connection,
            &ClientMessage::Resume { session_id: a },
        ))
        .await;

        match revenant.try_next() {
            Some(ServerMessage::Welcome {
                session_id,
                players,
                ..
            }) => {
                assert_eq!(session_id, a);
                let me = players.iter().find(|p| p.id == a).unwrap();
                assert_eq!(me.x, 7.0);
            }
            other => panic!("expected Welcome, got {other:?}"),
        }

        // The rebound session outlives the old grace deadline, and moves
        // flow from the new connection.
        grace.drain();
        task.sweep(Instant::now() + RECONNECT_GRACE * 2).await;
        assert!(grace.try_next().is_none());

        send_move(&mut task, revenant.connection, 9.0).await;
        assert!(matches!(
            grace.try_next(),
            Some(ServerMessage::PlayerDelta { id, .. }) if id == a
        ));
    }

    #[tokio::test]
    async fn test_resume_after_expiry_rejected_without_binding() {
        let (mut task, connections) = fixture();
        let mut ada = peer(&connections, 1).await;
        let mut grace = peer(&connections, 2).await;
        let a = join(&mut task, &mut ada, "Ada").await;
        join(&mut task, &mut grace, "Grace").await;

        task.handle_event(ServerEvent::Disconnected {
            connection: ada.connection,
        })
        .await;
        task.sweep(Instant::now() + RECONNECT_GRACE).await;
        grace.drain();

        let mut revenant = peer(&connections, 3).await;
        task.handle_event(message_event(
            revenant.connection,
            &ClientMessage::Resume { session_id: a },
        ))
        .await;
        assert!(matches!(
            revenant.try_next(),
            Some(ServerMessage::ResumeExpired)
        ));

        // The rejected connection holds no session, so its moves drop.
        send_move(&mut task, revenant.connection, 1.0).await;
        assert!(grace.try_next().is_none());
    }

    #[tokio::test]
    async fn test_resume_kicks_stale_connection() {
        let (mut task, connections) = fixture();
        let mut ada = peer(&connections, 1).await;
        let mut grace = peer(&connections, 2).await;
        let a = join(&mut task, &mut ada, "Ada").await;
        join(&mut task, &mut grace, "Grace").await;

        // Resume without a disconnect: a new connection claims the
        // session while the old one is still bound.
        let mut takeover = peer(&connections, 3).await;
        task.handle_event(message_event(
            takeover.connection,
            &ClientMessage::Resume { session_id: a },
        ))
        .await;

        assert!(matches!(
            takeover.try_next(),
            Some(ServerMessage::Welcome { session_id, .. }) if session_id == a
        ));
        assert_eq!(connections.len().await, 2);

        // The old connection lost its binding.
        grace.drain();
        send_move(&mut task, ada.connection, 4.0).await;
        assert!(grace.try_next().is_none());

        send_move(&mut task, takeover.connection, 4.0).await;
        assert!(matches!(
            grace.try_next(),
            Some(ServerMessage::PlayerDelta { id, .. }) if id == a
        ));
    }

    #[tokio::test]
    async fn test_second_join_on_connection_replaces_session() {
        let (mut task, connections) = fixture();
        let mut ada = peer(&connections, 1).await;
        let mut grace = peer(&connections, 2).await;
        let a = join(&mut task, &mut ada, "Ada").await;
        join(&mut task, &mut grace, "Grace").await;
        grace.drain();

        let a2 = join(&mut task, &mut ada, "Ada2").await;
        assert_ne!(a, a2);

        let seen = grace.drain();
        assert!(seen
            .iter()
            .any(|m| matches!(m, ServerMessage::PlayerLeft { id } if *id == a)));
        assert!(seen
            .iter()
            .any(|m| matches!(m, ServerMessage::PlayerJoined { player } if player.id == a2)));
    }

    #[tokio::test]
    async fn test_undecodable_frame_ignored() {
        let (mut task, connections) = fixture();
        let mut ada = peer(&connections, 1).await;
        join(&mut task, &mut ada, "Ada").await;

        task.handle_event(ServerEvent::Message {
            connection: ada.connection,
            payload: vec![0xFF, 0x01, 0x02],
        })
        .await;
        assert!(ada.try_next().is_none());
    }
}
