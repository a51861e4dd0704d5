//! Recording bus fakes shared by the messaging and upload tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Instant;

use crate::messaging::config::DEFAULT_PORT;
use crate::messaging::stomp::{
    BusConnector, BusHandshake, BusMessage, BusSession, HandshakeRequest,
};
use crate::messaging::{MessagingClient, MessagingConfig};
use crate::transport::errors::TransportError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    Subscribe(String, String),
    Unsubscribe(String),
    Publish(String, String),
    Disconnect,
}

pub(crate) enum Inbound {
    Message(BusMessage),
    Eof,
}

#[derive(Default)]
pub(crate) struct Bus {
    pub(crate) calls: Vec<Call>,
    pub(crate) inbound: VecDeque<Inbound>,
    pub(crate) handshakes: usize,
    pub(crate) last_request: Option<HandshakeRequest>,
}

impl Bus {
    pub(crate) fn push_message(&mut self, subscription: &str, body: &str) {
        self.inbound.push_back(Inbound::Message(BusMessage::Message {
            subscription: subscription.to_string(),
            destination: "/test".to_string(),
            body: body.to_string(),
        }));
    }

    pub(crate) fn publishes(&self) -> Vec<(String, String)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Publish(destination, body) => Some((destination.clone(), body.clone())),
                _ => None,
            })
            .collect()
    }
}

pub(crate) struct TestSession {
    bus: Rc<RefCell<Bus>>,
}

impl BusSession for TestSession {
    fn subscribe(&mut self, id: &str, destination: &str) -> Result<(), TransportError> {
        self.bus
            .borrow_mut()
            .calls
            .push(Call::Subscribe(id.to_string(), destination.to_string()));
        Ok(())
    }

    fn unsubscribe(&mut self, id: &str) -> Result<(), TransportError> {
        self.bus
            .borrow_mut()
            .calls
            .push(Call::Unsubscribe(id.to_string()));
        Ok(())
    }

    fn publish(&mut self, destination: &str, body: &str) -> Result<(), TransportError> {
        self.bus
            .borrow_mut()
            .calls
            .push(Call::Publish(destination.to_string(), body.to_string()));
        Ok(())
    }

    fn next_message(&mut self) -> Result<Option<BusMessage>, TransportError> {
        match self.bus.borrow_mut().inbound.pop_front() {
            Some(Inbound::Message(message)) => Ok(Some(message)),
            Some(Inbound::Eof) => Err(TransportError::Disconnected),
            None => Ok(None),
        }
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        self.bus.borrow_mut().calls.push(Call::Disconnect);
        Ok(())
    }
}

pub(crate) struct TestConnector {
    bus: Rc<RefCell<Bus>>,
    failures: Rc<RefCell<usize>>,
}

impl BusConnector for TestConnector {
    fn handshake(&mut self, request: HandshakeRequest) -> Result<BusHandshake, TransportError> {
        {
            let mut bus = self.bus.borrow_mut();
            bus.handshakes += 1;
            bus.last_request = Some(request);
        }
        let mut failures = self.failures.borrow_mut();
        if *failures > 0 {
            *failures -= 1;
            return Err(TransportError::Io("connection refused".to_string()));
        }
        Ok(BusHandshake {
            server_version: Some("1.2".to_string()),
            session: Box::new(TestSession {
                bus: Rc::clone(&self.bus),
            }),
        })
    }
}

pub(crate) fn test_config() -> MessagingConfig {
    MessagingConfig::new("bus.example".to_string(), DEFAULT_PORT, "alice".to_string())
}

pub(crate) fn client_with(
    failures: usize,
) -> (MessagingClient, Rc<RefCell<Bus>>, Rc<RefCell<usize>>) {
    let bus = Rc::new(RefCell::new(Bus::default()));
    let failures = Rc::new(RefCell::new(failures));
    let connector = TestConnector {
        bus: Rc::clone(&bus),
        failures: Rc::clone(&failures),
    };
    let client = MessagingClient::with_connector(test_config(), Box::new(connector));
    (client, bus, failures)
}

pub(crate) fn connected_client() -> (MessagingClient, Rc<RefCell<Bus>>, Instant) {
    let (mut client, bus, _) = client_with(0);
    let now = Instant::now();
    client.connect(now).expect("connect failed");
    client.take_events();
    (client, bus, now)
}

pub(crate) fn sub_id(client: &MessagingClient, destination: &str) -> String {
    let bus_channel = client
        .subscriptions()
        .channels()
        .into_iter()
        .find(|channel| channel.destination() == destination)
        .expect("channel not subscribed");
    client
        .subscriptions()
        .id_for(bus_channel)
        .expect("missing id")
        .to_string()
}
