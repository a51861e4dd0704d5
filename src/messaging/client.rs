use std::time::Instant;

use chrono::Utc;

use crate::messaging::destinations::{
    mark_as_read_address, send_address, typing_address, Channel,
};
use crate::messaging::payload::{InboundPayload, MessageType, OutgoingMessage, EMPTY_SIGNAL};
use crate::messaging::schedule::{ReconnectPolicy, TypingDebounce};
use crate::messaging::stomp::{BusConnector, BusMessage, BusSession, HandshakeRequest};
#[cfg(not(feature = "coverage"))]
use crate::messaging::stomp::{tcp_connect, tls_connect, SocketBusConnector};
use crate::messaging::subscriptions::SubscriptionSet;
use crate::messaging::{ClientEvent, MessagingConfig, NoopBusConnector};
use crate::transport::errors::TransportError;
use crate::transport::types::{ConnState, ConversationId};

pub const NOT_CONNECTED: &str = "Not connected to the message bus";

/// Chat client bound to one bus connection and at most one active conversation.
pub struct MessagingClient {
    config: MessagingConfig,
    conn_state: ConnState,
    events: Vec<ClientEvent>,
    connector: Box<dyn BusConnector>,
    session: Option<Box<dyn BusSession>>,
    subscriptions: SubscriptionSet,
    current_conversation: Option<ConversationId>,
    reconnect: ReconnectPolicy,
    typing: TypingDebounce,
}

impl MessagingClient {
    pub fn new(config: MessagingConfig) -> Self {
        Self::with_connector(config, Box::new(NoopBusConnector))
    }

    #[cfg(not(feature = "coverage"))]
    pub fn new_with_socket(config: MessagingConfig) -> Self {
        let connector: Box<dyn BusConnector> = if config.tls {
            Box::new(SocketBusConnector::new(tls_connect))
        } else {
            Box::new(SocketBusConnector::new(tcp_connect))
        };
        Self::with_connector(config, connector)
    }

    pub fn with_connector(config: MessagingConfig, connector: Box<dyn BusConnector>) -> Self {
        let reconnect = ReconnectPolicy::new(config.reconnect_delay());
        let typing = TypingDebounce::new(config.typing_idle());
        Self {
            config,
            conn_state: ConnState::Disconnected,
            events: Vec::new(),
            connector,
            session: None,
            subscriptions: SubscriptionSet::new(),
            current_conversation: None,
            reconnect,
            typing,
        }
    }

    pub fn config(&self) -> &MessagingConfig {
        &self.config
    }

    pub fn conn_state(&self) -> ConnState {
        self.conn_state
    }

    pub fn is_connected(&self) -> bool {
        self.conn_state.is_connected()
    }

    pub fn take_events(&mut self) -> Vec<ClientEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn current_conversation(&self) -> Option<ConversationId> {
        self.current_conversation
    }

    pub fn subscriptions(&self) -> &SubscriptionSet {
        &self.subscriptions
    }

    pub fn next_reconnect(&self) -> Option<Instant> {
        self.reconnect.next_attempt()
    }

    pub fn is_typing(&self, now: Instant) -> bool {
        self.typing.is_typing(now)
    }

    /// Queues a user-visible error banner.
    pub fn report_error(&mut self, message: impl Into<String>) {
        self.events.push(ClientEvent::Error(message.into()));
    }

    pub fn connect(&mut self, now: Instant) -> Result<(), TransportError> {
        if matches!(self.conn_state, ConnState::Connected | ConnState::Connecting) {
            return Ok(());
        }

        if self.config.host.trim().is_empty() {
            return Err(TransportError::InvalidConfig("host is required".to_string()));
        }
        if self.config.login.trim().is_empty() {
            return Err(TransportError::InvalidConfig("login is required".to_string()));
        }

        self.set_conn_state(ConnState::Connecting);
        let request = HandshakeRequest {
            host: self.config.host.clone(),
            port: self.config.port,
            virtual_host: self.config.virtual_host().to_string(),
            login: self.config.login.clone(),
            passcode: self.config.passcode.clone(),
        };
        let handshake = match self.connector.handshake(request) {
            Ok(handshake) => handshake,
            Err(error) => {
                self.connection_lost(now, &error);
                return Err(error);
            }
        };
        log::info!(
            "connected to {}:{} (protocol {})",
            self.config.host,
            self.config.port,
            handshake.server_version.as_deref().unwrap_or("unknown")
        );
        self.session = Some(handshake.session);
        self.reconnect.reset();
        self.set_conn_state(ConnState::Connected);

        if let Err(error) = self.subscribe_initial() {
            self.connection_lost(now, &error);
            return Err(error);
        }
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(error) = session.disconnect() {
                log::warn!("disconnect failed: {error}");
            }
        }
        self.subscriptions.clear();
        self.reconnect.cancel();
        self.typing.reset();
        self.current_conversation = None;
        if self.conn_state != ConnState::Disconnected {
            self.set_conn_state(ConnState::Disconnected);
        }
    }

    /// Makes `conversation` the active one, dropping every channel of the previous one first.
    pub fn subscribe_to_conversation(
        &mut self,
        conversation: ConversationId,
    ) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }
        if self.current_conversation == Some(conversation) {
            return Ok(());
        }

        if let Some(previous) = self.current_conversation.take() {
            let session = self.session.as_mut().ok_or(TransportError::Disconnected)?;
            for id in self.subscriptions.remove_conversation(previous) {
                session.unsubscribe(&id)?;
            }
            log::debug!("left conversation {previous}");
        }

        self.current_conversation = Some(conversation);
        for channel in Channel::for_conversation(conversation) {
            self.subscribe_channel(channel)?;
        }
        log::debug!("joined conversation {conversation}");
        Ok(())
    }

    pub fn send_message(
        &mut self,
        conversation: ConversationId,
        content: &str,
        message_type: MessageType,
    ) -> Result<(), TransportError> {
        if !self.is_connected() {
            self.report_error(NOT_CONNECTED);
            return Err(TransportError::Disconnected);
        }
        let message = OutgoingMessage::new(conversation, content, message_type, Utc::now());
        self.publish(&send_address(conversation), &message.to_json())
    }

    /// Sends the trimmed draft to the active conversation. Returns false when nothing was sent.
    pub fn send_current(&mut self, draft: &str) -> Result<bool, TransportError> {
        let content = draft.trim();
        let Some(conversation) = self.current_conversation else {
            return Ok(false);
        };
        if content.is_empty() {
            return Ok(false);
        }
        self.send_message(conversation, content, MessageType::Text)?;
        Ok(true)
    }

    pub fn send_typing_indicator(
        &mut self,
        conversation: ConversationId,
    ) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }
        self.publish(&typing_address(conversation), EMPTY_SIGNAL)
    }

    pub fn mark_as_read(&mut self, conversation: ConversationId) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }
        self.publish(&mark_as_read_address(conversation), EMPTY_SIGNAL)
    }

    /// Records a keystroke in the draft. Returns true when a typing indicator went out.
    pub fn on_input(&mut self, now: Instant) -> Result<bool, TransportError> {
        let Some(conversation) = self.current_conversation else {
            return Ok(false);
        };
        if !self.typing.keystroke(now) {
            return Ok(false);
        }
        self.send_typing_indicator(conversation)?;
        Ok(true)
    }

    /// Advances timers: clears the typing flag and performs a due reconnect.
    pub fn tick(&mut self, now: Instant) {
        self.typing.expire(now);
        let idle = matches!(self.conn_state, ConnState::Disconnected | ConnState::Error);
        if idle && self.reconnect.take_due(now) {
            log::info!("reconnect attempt {}", self.reconnect.attempts());
            if let Err(error) = self.connect(now) {
                log::debug!("reconnect failed: {error}");
            }
        }
    }

    /// Drains every inbound message currently available. Returns how many were handled.
    pub fn poll(&mut self, now: Instant) -> Result<usize, TransportError> {
        let mut handled = 0;
        loop {
            let Some(session) = self.session.as_mut() else {
                return Ok(handled);
            };
            let message = match session.next_message() {
                Ok(Some(message)) => message,
                Ok(None) => return Ok(handled),
                Err(error) => {
                    self.connection_lost(now, &error);
                    return Err(error);
                }
            };
            handled += 1;
            self.dispatch(message, now)?;
        }
    }

    fn dispatch(&mut self, message: BusMessage, now: Instant) -> Result<(), TransportError> {
        match message {
            BusMessage::Message {
                subscription,
                destination,
                body,
            } => {
                let Some(channel) = self.subscriptions.channel(&subscription) else {
                    log::debug!("dropping message for inactive {subscription} ({destination})");
                    return Ok(());
                };
                let payload = InboundPayload::decode(channel.kind(), &body)?;
                self.apply_payload(payload);
            }
            BusMessage::Receipt { receipt_id } => {
                log::debug!("receipt {receipt_id}");
            }
            BusMessage::Error { message, body } => {
                log::warn!("server error: {message} {body}");
                self.report_error(message.clone());
                self.enter_retry(now, &TransportError::Protocol(message), ConnState::Error);
            }
        }
        Ok(())
    }

    fn apply_payload(&mut self, payload: InboundPayload) {
        let event = match payload {
            InboundPayload::Error(notice) => ClientEvent::Error(notice.error),
            InboundPayload::Notification(notification) => {
                ClientEvent::Notification(notification.text().to_string())
            }
            InboundPayload::Message(message) => ClientEvent::Message(message),
            InboundPayload::ConversationNotification(message) => {
                ClientEvent::ConversationNotification(message)
            }
            InboundPayload::Typing(notice) => {
                if !notice.typing {
                    return;
                }
                ClientEvent::Typing(notice)
            }
            InboundPayload::ReadReceipt(receipt) => {
                log::info!(
                    "conversation {} read by user {}",
                    receipt.conversation_id,
                    receipt.read_by_user_id
                );
                ClientEvent::ReadReceipt(receipt)
            }
        };
        self.events.push(event);
    }

    fn subscribe_initial(&mut self) -> Result<(), TransportError> {
        for channel in Channel::user_scoped() {
            self.subscribe_channel(channel)?;
        }
        if let Some(conversation) = self.current_conversation {
            for channel in Channel::for_conversation(conversation) {
                self.subscribe_channel(channel)?;
            }
        }
        Ok(())
    }

    fn subscribe_channel(&mut self, channel: Channel) -> Result<(), TransportError> {
        let session = self.session.as_mut().ok_or(TransportError::Disconnected)?;
        let id = self.subscriptions.register(channel);
        session.subscribe(&id, &channel.destination())
    }

    fn publish(&mut self, destination: &str, body: &str) -> Result<(), TransportError> {
        let session = self.session.as_mut().ok_or(TransportError::Disconnected)?;
        log::debug!("publish {destination}");
        session.publish(destination, body)
    }

    fn connection_lost(&mut self, now: Instant, error: &TransportError) {
        self.enter_retry(now, error, ConnState::Disconnected);
    }

    fn enter_retry(&mut self, now: Instant, error: &TransportError, state: ConnState) {
        self.session = None;
        self.subscriptions.clear();
        self.typing.reset();
        self.set_conn_state(state);
        let retry_at = self.reconnect.schedule(now);
        log::warn!(
            "message bus connection failed: {error}; retrying in {:?}",
            retry_at.saturating_duration_since(now)
        );
    }

    fn set_conn_state(&mut self, next: ConnState) {
        self.conn_state = next;
        self.events.push(ClientEvent::ConnectionState(next));
    }
}

#[cfg(test)]
mod tests {
    use super::{MessagingClient, NOT_CONNECTED};
    use crate::messaging::config::DEFAULT_PORT;
    use crate::messaging::payload::MessageType;
    use crate::messaging::stomp::BusMessage;
    use crate::messaging::testing::{
        client_with, connected_client, sub_id, test_config, Call, Inbound,
    };
    use crate::messaging::{ClientEvent, MessagingConfig};
    use crate::transport::errors::TransportError;
    use crate::transport::types::{ConnState, ConversationId};
    use std::time::{Duration, Instant};

    /// Connect transitions through connecting and connected and subscribes the user queues.
    #[test]
    fn connect_subscribes_user_queues() {
        // Arrange
        let (mut client, bus, _) = client_with(0);

        // Act
        client.connect(Instant::now()).expect("connect failed");

        // Assert
        assert_eq!(client.conn_state(), ConnState::Connected);
        assert_eq!(
            client.take_events(),
            vec![
                ClientEvent::ConnectionState(ConnState::Connecting),
                ClientEvent::ConnectionState(ConnState::Connected),
            ]
        );
        assert_eq!(
            bus.borrow().calls,
            vec![
                Call::Subscribe("sub-0".to_string(), "/user/queue/errors".to_string()),
                Call::Subscribe("sub-1".to_string(), "/user/queue/notifications".to_string()),
            ]
        );
        let request = bus.borrow().last_request.clone().expect("missing request");
        assert_eq!(request.login, "alice");
        assert_eq!(request.virtual_host, "bus.example");
    }

    /// Repeated connect calls are no-ops after the first connection.
    #[test]
    fn connect_is_idempotent() {
        // Arrange
        let (mut client, bus, now) = connected_client();

        // Act
        client.connect(now).expect("second connect failed");

        // Assert
        assert!(client.take_events().is_empty());
        assert_eq!(bus.borrow().handshakes, 1);
    }

    /// Connect rejects blank host values before any handshake.
    #[test]
    fn connect_rejects_empty_host() {
        // Arrange
        let mut client = MessagingClient::new(MessagingConfig::new(
            " ".to_string(),
            DEFAULT_PORT,
            "alice".to_string(),
        ));

        // Act
        let err = client.connect(Instant::now()).expect_err("expected failure");

        // Assert
        assert!(matches!(err, TransportError::InvalidConfig(_)));
        assert!(client.next_reconnect().is_none());
    }

    /// Connect rejects blank logins.
    #[test]
    fn connect_rejects_empty_login() {
        // Arrange
        let mut client = MessagingClient::new(MessagingConfig::new(
            "bus.example".to_string(),
            DEFAULT_PORT,
            String::new(),
        ));

        // Act
        let err = client.connect(Instant::now()).expect_err("expected failure");

        // Assert
        assert!(matches!(err, TransportError::InvalidConfig(_)));
    }

    /// The no-op connector connects without any network.
    #[test]
    fn noop_connector_connects() {
        let mut client = MessagingClient::new(test_config());
        client.connect(Instant::now()).expect("connect failed");
        assert!(client.is_connected());
        assert_eq!(client.subscriptions().len(), 2);
    }

    /// A failed handshake marks the client disconnected and schedules one retry five seconds out.
    #[test]
    fn connect_failure_schedules_retry() {
        // Arrange
        let (mut client, bus, _) = client_with(1);
        let now = Instant::now();

        // Act
        let err = client.connect(now).expect_err("expected failure");

        // Assert
        assert!(matches!(err, TransportError::Io(_)));
        assert_eq!(client.conn_state(), ConnState::Disconnected);
        assert_eq!(client.next_reconnect(), Some(now + Duration::from_secs(5)));
        assert_eq!(
            client.take_events(),
            vec![
                ClientEvent::ConnectionState(ConnState::Connecting),
                ClientEvent::ConnectionState(ConnState::Disconnected),
            ]
        );

        // Act
        client.tick(now + Duration::from_secs(4));
        // Assert
        assert_eq!(bus.borrow().handshakes, 1);

        // Act
        client.tick(now + Duration::from_secs(5));
        // Assert
        assert_eq!(bus.borrow().handshakes, 2);
        assert!(client.is_connected());
        assert!(client.next_reconnect().is_none());
    }

    /// Reconnect attempts continue at the fixed interval with no cap.
    #[test]
    fn retries_are_unbounded() {
        // Arrange
        let (mut client, bus, _) = client_with(25);
        let mut now = Instant::now();
        let _ = client.connect(now);

        // Act
        while !client.is_connected() {
            let next = client.next_reconnect().expect("retry not scheduled");
            assert_eq!(next - now, Duration::from_secs(5));
            now = next;
            client.tick(now);
        }

        // Assert
        assert_eq!(bus.borrow().handshakes, 26);
    }

    /// Selecting a conversation subscribes its four channels.
    #[test]
    fn subscribe_to_conversation_subscribes_four_channels() {
        // Arrange
        let (mut client, bus, _) = connected_client();

        // Act
        client
            .subscribe_to_conversation(ConversationId(7))
            .expect("subscribe failed");

        // Assert
        let calls = bus.borrow().calls[2..].to_vec();
        assert_eq!(
            calls,
            vec![
                Call::Subscribe("sub-2".to_string(), "/topic/conversation/7".to_string()),
                Call::Subscribe(
                    "sub-3".to_string(),
                    "/user/queue/conversation/7/notification".to_string()
                ),
                Call::Subscribe("sub-4".to_string(), "/topic/conversation/7/typing".to_string()),
                Call::Subscribe(
                    "sub-5".to_string(),
                    "/user/queue/conversation/7/read-receipt".to_string()
                ),
            ]
        );
        assert_eq!(client.current_conversation(), Some(ConversationId(7)));
    }

    /// Switching drops all four channels of the old conversation before subscribing the new one.
    #[test]
    fn switching_unsubscribes_previous_first() {
        // Arrange
        let (mut client, bus, _) = connected_client();
        client.subscribe_to_conversation(ConversationId(1)).unwrap();
        let before = bus.borrow().calls.len();

        // Act
        client.subscribe_to_conversation(ConversationId(2)).unwrap();

        // Assert
        let calls = bus.borrow().calls[before..].to_vec();
        assert_eq!(
            &calls[..4],
            &[
                Call::Unsubscribe("sub-2".to_string()),
                Call::Unsubscribe("sub-3".to_string()),
                Call::Unsubscribe("sub-4".to_string()),
                Call::Unsubscribe("sub-5".to_string()),
            ]
        );
        assert!(calls[4..]
            .iter()
            .all(|call| matches!(call, Call::Subscribe(_, destination) if destination.contains("/2"))));
        assert_eq!(client.subscriptions().len(), 6);
    }

    /// Messages delivered on the old conversation's subscription after a switch never render.
    #[test]
    fn previous_conversation_messages_are_dropped() {
        // Arrange
        let (mut client, bus, now) = connected_client();
        client.subscribe_to_conversation(ConversationId(1)).unwrap();
        let old_id = sub_id(&client, "/topic/conversation/1");
        client.subscribe_to_conversation(ConversationId(2)).unwrap();
        let new_id = sub_id(&client, "/topic/conversation/2");
        bus.borrow_mut()
            .push_message(&old_id, r#"{"conversationId": 1, "content": "stale"}"#);
        bus.borrow_mut()
            .push_message(&new_id, r#"{"conversationId": 2, "content": "fresh"}"#);

        // Act
        let handled = client.poll(now).expect("poll failed");

        // Assert
        assert_eq!(handled, 2);
        let events = client.take_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            ClientEvent::Message(message) if message.content == "fresh"
        ));
    }

    /// Re-selecting the active conversation does nothing.
    #[test]
    fn reselecting_conversation_is_noop() {
        // Arrange
        let (mut client, bus, _) = connected_client();
        client.subscribe_to_conversation(ConversationId(3)).unwrap();
        let before = bus.borrow().calls.len();

        // Act
        client.subscribe_to_conversation(ConversationId(3)).unwrap();

        // Assert
        assert_eq!(bus.borrow().calls.len(), before);
    }

    /// Subscribing requires a live connection.
    #[test]
    fn subscribe_requires_connection() {
        // Arrange
        let (mut client, _, _) = client_with(0);

        // Act
        let err = client
            .subscribe_to_conversation(ConversationId(1))
            .expect_err("expected failure");

        // Assert
        assert!(matches!(err, TransportError::Disconnected));
        assert!(client.current_conversation().is_none());
    }

    /// Sending while disconnected surfaces an error and publishes nothing.
    #[test]
    fn send_message_while_disconnected() {
        // Arrange
        let (mut client, bus, _) = client_with(0);

        // Act
        let err = client
            .send_message(ConversationId(4), "hi", MessageType::Text)
            .expect_err("expected failure");

        // Assert
        assert!(matches!(err, TransportError::Disconnected));
        assert_eq!(
            client.take_events(),
            vec![ClientEvent::Error(NOT_CONNECTED.to_string())]
        );
        assert!(bus.borrow().publishes().is_empty());
    }

    /// A sent message is published as JSON to the conversation's send address.
    #[test]
    fn send_message_publishes_json() {
        // Arrange
        let (mut client, bus, _) = connected_client();

        // Act
        client
            .send_message(ConversationId(4), "hello there", MessageType::Text)
            .expect("send failed");

        // Assert
        let publishes = bus.borrow().publishes();
        assert_eq!(publishes.len(), 1);
        assert_eq!(publishes[0].0, "/app/chat/send/4");
        let body: serde_json::Value = serde_json::from_str(&publishes[0].1).unwrap();
        assert_eq!(body["conversationId"], 4);
        assert_eq!(body["content"], "hello there");
        assert_eq!(body["messageType"], "TEXT");
        assert!(body["timestamp"].is_string());
    }

    /// Drafts are trimmed and blank drafts are not sent.
    #[test]
    fn send_current_trims_draft() {
        // Arrange
        let (mut client, bus, _) = connected_client();
        client.subscribe_to_conversation(ConversationId(9)).unwrap();

        // Act
        let blank = client.send_current("   ").unwrap();
        let sent = client.send_current("  on my way \n").unwrap();

        // Assert
        assert!(!blank);
        assert!(sent);
        let publishes = bus.borrow().publishes();
        assert_eq!(publishes.len(), 1);
        let body: serde_json::Value = serde_json::from_str(&publishes[0].1).unwrap();
        assert_eq!(body["content"], "on my way");
    }

    /// Typing and read signals publish empty objects to their own addresses.
    #[test]
    fn signals_publish_empty_objects() {
        // Arrange
        let (mut client, bus, _) = connected_client();

        // Act
        client.send_typing_indicator(ConversationId(3)).unwrap();
        client.mark_as_read(ConversationId(3)).unwrap();

        // Assert
        assert_eq!(
            bus.borrow().publishes(),
            vec![
                ("/app/chat/typing/3".to_string(), "{}".to_string()),
                ("/app/chat/mark-as-read/3".to_string(), "{}".to_string()),
            ]
        );
    }

    /// Signals fail quietly when disconnected.
    #[test]
    fn signals_require_connection() {
        let (mut client, _, _) = client_with(0);
        assert!(client.mark_as_read(ConversationId(1)).is_err());
        assert!(client.send_typing_indicator(ConversationId(1)).is_err());
        assert!(client.take_events().is_empty());
    }

    /// Keystrokes within a second send one indicator; typing again after idle sends another.
    #[test]
    fn typing_indicator_is_debounced() {
        // Arrange
        let (mut client, bus, now) = connected_client();
        client.subscribe_to_conversation(ConversationId(5)).unwrap();

        // Act
        let first = client.on_input(now).unwrap();
        let second = client.on_input(now + Duration::from_millis(400)).unwrap();
        client.tick(now + Duration::from_millis(1_500));
        let typing_after_idle = client.is_typing(now + Duration::from_millis(1_500));
        let third = client.on_input(now + Duration::from_millis(1_600)).unwrap();

        // Assert
        assert!(first);
        assert!(!second);
        assert!(!typing_after_idle);
        assert!(third);
        assert_eq!(bus.borrow().publishes().len(), 2);
    }

    /// Typing before joining a conversation does not hold back the first indicator after joining.
    #[test]
    fn typing_without_conversation_does_not_arm_debounce() {
        // Arrange
        let (mut client, bus, now) = connected_client();

        // Act
        let before_join = client.on_input(now).unwrap();
        client.subscribe_to_conversation(ConversationId(5)).unwrap();
        let after_join = client.on_input(now + Duration::from_millis(200)).unwrap();

        // Assert
        assert!(!before_join);
        assert!(after_join);
        assert_eq!(bus.borrow().publishes().len(), 1);
    }

    /// Each channel kind dispatches to its own event.
    #[test]
    fn poll_dispatches_by_channel() {
        // Arrange
        let (mut client, bus, now) = connected_client();
        client.subscribe_to_conversation(ConversationId(8)).unwrap();
        let errors = sub_id(&client, "/user/queue/errors");
        let notifications = sub_id(&client, "/user/queue/notifications");
        let conversation_notice = sub_id(&client, "/user/queue/conversation/8/notification");
        let typing = sub_id(&client, "/topic/conversation/8/typing");
        let receipts = sub_id(&client, "/user/queue/conversation/8/read-receipt");
        {
            let mut bus = bus.borrow_mut();
            bus.push_message(&errors, r#"{"error": "Failed to send message", "success": false}"#);
            bus.push_message(&notifications, r#""Booking confirmed""#);
            bus.push_message(
                &conversation_notice,
                r#"{"conversationId": 8, "senderName": "Sam", "content": "hi"}"#,
            );
            bus.push_message(&typing, r#"{"conversationId": 8, "typingUser": "Sam", "typing": true}"#);
            bus.push_message(&typing, r#"{"conversationId": 8, "typingUser": "Sam", "typing": false}"#);
            bus.push_message(&receipts, r#"{"conversationId": 8, "readByUserId": 21}"#);
        }

        // Act
        let handled = client.poll(now).expect("poll failed");

        // Assert
        assert_eq!(handled, 6);
        let events = client.take_events();
        assert_eq!(events.len(), 5);
        assert_eq!(events[0], ClientEvent::Error("Failed to send message".to_string()));
        assert_eq!(events[1], ClientEvent::Notification("Booking confirmed".to_string()));
        assert!(matches!(
            &events[2],
            ClientEvent::ConversationNotification(message) if message.sender_name == "Sam"
        ));
        assert!(matches!(&events[3], ClientEvent::Typing(notice) if notice.typing_user == "Sam"));
        assert!(matches!(
            &events[4],
            ClientEvent::ReadReceipt(receipt) if receipt.read_by_user_id == 21
        ));
    }

    /// Malformed bodies fail with a named payload error instead of a panic.
    #[test]
    fn poll_reports_malformed_payload() {
        // Arrange
        let (mut client, bus, now) = connected_client();
        let errors = sub_id(&client, "/user/queue/errors");
        bus.borrow_mut().push_message(&errors, "<html>");

        // Act
        let err = client.poll(now).expect_err("expected failure");

        // Assert
        assert!(matches!(err, TransportError::Payload(_)));
        assert!(client.is_connected());
    }

    /// A server ERROR frame surfaces the message and drops the connection.
    #[test]
    fn server_error_drops_connection() {
        // Arrange
        let (mut client, bus, now) = connected_client();
        bus.borrow_mut()
            .inbound
            .push_back(Inbound::Message(BusMessage::Error {
                message: "session expired".to_string(),
                body: String::new(),
            }));

        // Act
        client.poll(now).expect("poll failed");

        // Assert
        assert_eq!(client.conn_state(), ConnState::Error);
        assert_eq!(
            client.take_events(),
            vec![
                ClientEvent::Error("session expired".to_string()),
                ClientEvent::ConnectionState(ConnState::Error),
            ]
        );
        assert_eq!(client.next_reconnect(), Some(now + Duration::from_secs(5)));
    }

    /// After a dropped stream the reconnect restores the active conversation's channels.
    #[test]
    fn reconnect_restores_conversation() {
        // Arrange
        let (mut client, bus, now) = connected_client();
        client.subscribe_to_conversation(ConversationId(4)).unwrap();
        bus.borrow_mut().inbound.push_back(Inbound::Eof);

        // Act
        let err = client.poll(now).expect_err("expected disconnect");
        client.tick(now + Duration::from_secs(5));

        // Assert
        assert!(matches!(err, TransportError::Disconnected));
        assert!(client.is_connected());
        assert_eq!(client.current_conversation(), Some(ConversationId(4)));
        assert_eq!(client.subscriptions().len(), 6);
        assert_eq!(bus.borrow().handshakes, 2);
    }

    /// Disconnect sends DISCONNECT, clears subscriptions and schedules nothing.
    #[test]
    fn disconnect_clears_state() {
        // Arrange
        let (mut client, bus, _) = connected_client();
        client.subscribe_to_conversation(ConversationId(4)).unwrap();

        // Act
        client.disconnect();

        // Assert
        assert_eq!(bus.borrow().calls.last(), Some(&Call::Disconnect));
        assert!(client.subscriptions().is_empty());
        assert!(client.current_conversation().is_none());
        assert!(client.next_reconnect().is_none());
        assert_eq!(client.conn_state(), ConnState::Disconnected);
    }
}
