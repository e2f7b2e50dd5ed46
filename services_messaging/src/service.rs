//! The message service handle

use crate::channel::{send_order, ChannelTable};
use crate::events::ProtocolEvent;
use crate::pending::{Continuation, PendingCalls};
use crate::router::{RouteHandler, Router};
use crate::transport::{InboundMessage, Transport};
use codec::{Value, ValueMap};
use core_types::{NodeEnvironment, NodeId};
use ipc::{headers, Envelope, Message, Request, Response, ResponseStatus};
use services_almanac::{AddressBook, EntityKind, NodeRecord, Sighting};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

/// Path of the liveness request every node answers
pub const PING_PATH: &str = "ping";

/// Path of the request that carries a routine to run remotely
pub const COMMAND_PATH: &str = "command";

/// Supplies the fields stamped into every outbound header
pub trait HeaderProvider {
    fn node_id(&self) -> NodeId;
    fn node_name(&self) -> String;
    fn environment(&self) -> NodeEnvironment;
}

type EventHandler = Rc<dyn Fn(&ProtocolEvent)>;

struct MessagingState {
    channels: ChannelTable,
    router: Router,
    pending: PendingCalls,
    subscribers: Vec<EventHandler>,
}

/// Sends and receives requests and responses for one node
///
/// Cloning yields another handle to the same service, so route handlers and
/// scheduled tasks can hold one.
#[derive(Clone)]
pub struct MessageService {
    state: Rc<RefCell<MessagingState>>,
    transport: Rc<dyn Transport>,
    headers: Rc<dyn HeaderProvider>,
    book: Rc<dyn AddressBook>,
}

impl MessageService {
    pub fn new(
        channels: ChannelTable,
        transport: Rc<dyn Transport>,
        headers: Rc<dyn HeaderProvider>,
        book: Rc<dyn AddressBook>,
    ) -> Self {
        Self {
            state: Rc::new(RefCell::new(MessagingState {
                channels,
                router: Router::new(),
                pending: PendingCalls::new(),
                subscribers: Vec::new(),
            })),
            transport,
            headers,
            book,
        }
    }

    /// Registers a request handler for `path`
    pub fn add_route(&self, path: impl Into<String>, handler: RouteHandler) {
        self.state.borrow_mut().router.add_route(path, handler);
    }

    /// Registers a listener for protocol events
    pub fn subscribe(&self, handler: impl Fn(&ProtocolEvent) + 'static) {
        self.state.borrow_mut().subscribers.push(Rc::new(handler));
    }

    pub fn channels(&self) -> ChannelTable {
        self.state.borrow().channels.clone()
    }

    /// Number of calls still waiting for a response
    pub fn pending_count(&self) -> usize {
        self.state.borrow().pending.len()
    }

    /// Sender id, sender name and environment fields
    pub fn standard_header(&self) -> ValueMap {
        let environment = self.headers.environment();
        let mut header = ValueMap::new();
        let mut put = |key: &str, value: String| {
            header.insert(key.to_string(), Value::from(value));
        };
        put(headers::ORIGIN_ID, self.headers.node_id().to_string());
        put(headers::ORIGIN_NAME, self.headers.node_name());
        put(headers::X, environment.position.x.to_string());
        put(headers::Y, environment.position.y.to_string());
        put(headers::Z, environment.position.z.to_string());
        put(headers::SPEED, environment.speed.to_string());
        put(headers::SAFE_RADIUS, environment.safe_radius.to_string());
        header
    }

    /// A request for `path` with the standard header plus `header` overrides
    pub fn create_request(
        &self,
        path: &str,
        body: Option<ValueMap>,
        header: Option<ValueMap>,
    ) -> Request {
        let mut fields = self.standard_header();
        fields.insert(headers::PATH.to_string(), Value::from(path));
        if let Some(overrides) = header {
            fields.extend(overrides);
        }
        Request::new(fields, body.unwrap_or_default())
    }

    /// A response to `request`, addressed back to its sender on the channel
    /// it arrived on
    pub fn create_response(
        &self,
        request: &Request,
        status: ResponseStatus,
        body: Option<ValueMap>,
    ) -> Response {
        let mut fields = self.standard_header();
        fields.insert(
            headers::TARGET_ID.to_string(),
            Value::from(request.origin_id().to_string()),
        );
        fields.insert(
            headers::TARGET_NAME.to_string(),
            Value::from(request.origin_name()),
        );
        fields.insert(
            headers::RESPONDING_TO_ID.to_string(),
            Value::from(request.id().as_str()),
        );
        let mut response = Response::new(status, fields, body.unwrap_or_default());
        response.channels = request.channels.clone();
        response
    }

    /// Sends to one node, trying each of the message's channels in turn
    ///
    /// The public channel is tried last and the first channel the transport
    /// accepts wins. A request registers `continuation` under its id until a
    /// response arrives or the next inbound pass expires it. Returns false
    /// and emits [`ProtocolEvent::RequestFailed`] when no channel delivers.
    pub fn send_unicast(
        &self,
        target: NodeId,
        message: impl Into<Envelope>,
        continuation: Option<Continuation>,
    ) -> bool {
        let envelope = message.into();
        let id = envelope.message().id();
        let expects_reply = matches!(envelope, Envelope::Request(_));
        if expects_reply {
            self.state
                .borrow_mut()
                .pending
                .register(id.clone(), continuation);
        }

        let wire = envelope.to_wire();
        for channel in self.channels_for(envelope.message()) {
            let sealed = self.state.borrow().channels.seal(&channel, &wire);
            let payload = match sealed {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(channel = %channel, error = %err, "cannot encipher for channel");
                    continue;
                }
            };
            if self.transport.send_unicast(target, &channel, &payload) {
                debug!(id = %id, target = %target, channel = %channel, "message sent");
                self.emit(&ProtocolEvent::RequestSent);
                return true;
            }
        }

        warn!(id = %id, target = %target, "no channel delivered the message");
        if expects_reply {
            self.state.borrow_mut().pending.take(&id);
        }
        self.emit(&ProtocolEvent::RequestFailed { target_id: target });
        false
    }

    /// Sends an independently enciphered copy on every channel of this node
    pub fn send_broadcast(&self, message: impl Into<Envelope>, continuation: Option<Continuation>) {
        let envelope = message.into();
        let id = envelope.message().id();
        if matches!(envelope, Envelope::Request(_)) {
            self.state
                .borrow_mut()
                .pending
                .register(id.clone(), continuation);
        }

        let wire = envelope.to_wire();
        let channels = self.channels();
        for channel in channels.iter() {
            match channels.seal(&channel.name, &wire) {
                Ok(payload) => self.transport.send_broadcast(&channel.name, &payload),
                Err(err) => {
                    warn!(channel = %channel.name, error = %err, "cannot encipher for channel")
                }
            }
        }
        debug!(id = %id, channels = channels.len(), "message broadcast");
        self.emit(&ProtocolEvent::RequestSent);
    }

    /// Broadcasts a `ping` request on every channel
    pub fn ping(&self) {
        let request = self.create_request(PING_PATH, None, None);
        self.send_broadcast(request, None);
    }

    /// Sends `routine` to the node behind `record` as a `command` request
    pub fn send_command(
        &self,
        record: &NodeRecord,
        routine: &str,
        continuation: Option<Continuation>,
    ) -> bool {
        let target: NodeId = match record.id.parse() {
            Ok(id) => id,
            Err(err) => {
                warn!(record = %record.id, error = %err, "record is not addressable");
                return false;
            }
        };
        let mut body = ValueMap::new();
        body.insert(ipc::body::COMMAND.to_string(), Value::from(routine));
        let mut request = self
            .create_request(COMMAND_PATH, Some(body), None)
            .to(&record.id, record.display_name());
        request.channels = record.channels.clone();
        self.send_unicast(target, request, continuation)
    }

    /// The known node matching `identifier` by id or nickname
    pub fn find_node(&self, identifier: &str) -> Option<NodeRecord> {
        self.book
            .get_record(identifier)
            .filter(|record| record.kind == EntityKind::Grid)
    }

    /// Every known node other than this one
    pub fn remote_nodes(&self) -> Vec<NodeRecord> {
        let local = self.headers.node_id().to_string();
        self.book
            .get_records_by_kind(EntityKind::Grid)
            .into_iter()
            .filter(|record| record.id != local)
            .collect()
    }

    /// Drains the transport and handles everything received
    ///
    /// When anything was received, the whole pending table is cleared at the
    /// end of the pass, including calls registered while handling it. A
    /// response that did not arrive within the pass is never delivered.
    /// Returns the number of messages taken from the transport.
    pub fn process_inbox(&self) -> usize {
        let inbound = self.transport.receive();
        if inbound.is_empty() {
            return 0;
        }

        for message in &inbound {
            self.handle_inbound(message);
        }
        let expired = self.state.borrow_mut().pending.clear();
        if expired > 0 {
            debug!(expired, "pending requests expired");
        }
        inbound.len()
    }

    fn handle_inbound(&self, inbound: &InboundMessage) {
        let opened = self
            .state
            .borrow()
            .channels
            .open(&inbound.channel, &inbound.payload);
        let text = match opened {
            Ok(text) => text,
            Err(err) => {
                warn!(channel = %inbound.channel, error = %err, "dropping undecipherable message");
                return;
            }
        };
        let mut envelope = match Envelope::parse(&text) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(channel = %inbound.channel, error = %err, "dropping unreadable message");
                return;
            }
        };
        envelope
            .message_mut()
            .channels
            .insert(inbound.channel.clone());
        self.refresh_sender(envelope.message());

        match envelope {
            Envelope::Request(request) => self.handle_request(request),
            Envelope::Response(response) => self.handle_response(response),
        }
    }

    fn refresh_sender(&self, message: &Message) {
        if !message.has_header(headers::ORIGIN_ID) {
            return;
        }
        let origin = message.origin_id();
        self.book.record_sighting(Sighting {
            id: origin.to_string(),
            name: message.origin_name().to_string(),
            environment: message.origin_environment(),
            channels: message.channels.clone(),
            is_local: origin == self.headers.node_id(),
        });
    }

    fn handle_request(&self, request: Request) {
        self.emit(&ProtocolEvent::RequestReceived);
        let router = self.state.borrow().router.clone();
        debug!(path = request.path(), origin = %request.origin_id(), "routing request");
        match router.handle(request.path(), &request) {
            Some(response) => {
                self.send_unicast(request.origin_id(), response, None);
            }
            None => debug!(path = request.path(), "request not answered"),
        }
    }

    fn handle_response(&self, response: Response) {
        let Some(id) = response.responding_to_id() else {
            warn!(status = %response.status(), "dropping response without RespondingToId");
            return;
        };
        let entry = self.state.borrow_mut().pending.take(&id);
        match entry {
            None => warn!("No active request found for RespondingToId: {}", id),
            Some(None) => debug!(id = %id, status = %response.status(), "response received"),
            Some(Some(continuation)) => continuation(&response),
        }
    }

    fn channels_for(&self, message: &Message) -> Vec<String> {
        if message.channels.is_empty() {
            let names = self.state.borrow().channels.names();
            send_order(&names)
        } else {
            send_order(&message.channels)
        }
    }

    fn emit(&self, event: &ProtocolEvent) {
        let subscribers = self.state.borrow().subscribers.clone();
        for subscriber in subscribers {
            subscriber(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::PUBLIC_CHANNEL;
    use services_almanac::{Almanac, Transponder};
    use std::cell::Cell;

    struct Identity {
        id: NodeId,
        name: &'static str,
    }

    impl HeaderProvider for Identity {
        fn node_id(&self) -> NodeId {
            self.id
        }

        fn node_name(&self) -> String {
            self.name.to_string()
        }

        fn environment(&self) -> NodeEnvironment {
            NodeEnvironment::default()
        }
    }

    /// Records sends and serves a hand-filled inbox
    struct Mailbox {
        reachable: Cell<bool>,
        attempts: Cell<usize>,
        sent: RefCell<Vec<(Option<NodeId>, String, String)>>,
        inbox: RefCell<Vec<InboundMessage>>,
    }

    impl Mailbox {
        fn new() -> Rc<Self> {
            Rc::new(Self {
                reachable: Cell::new(true),
                attempts: Cell::new(0),
                sent: RefCell::new(Vec::new()),
                inbox: RefCell::new(Vec::new()),
            })
        }

        fn push(&self, channel: &str, payload: &str) {
            self.inbox.borrow_mut().push(InboundMessage {
                channel: channel.to_string(),
                payload: payload.to_string(),
            });
        }

        /// Moves everything this mailbox sent into `other`'s inbox
        fn deliver_to(&self, other: &Mailbox) {
            for (_, channel, payload) in self.sent.borrow_mut().drain(..) {
                other.push(&channel, &payload);
            }
        }
    }

    impl Transport for Mailbox {
        fn send_unicast(&self, target: NodeId, channel: &str, payload: &str) -> bool {
            self.attempts.set(self.attempts.get() + 1);
            if !self.reachable.get() {
                return false;
            }
            self.sent
                .borrow_mut()
                .push((Some(target), channel.to_string(), payload.to_string()));
            true
        }

        fn send_broadcast(&self, channel: &str, payload: &str) {
            self.sent
                .borrow_mut()
                .push((None, channel.to_string(), payload.to_string()));
        }

        fn receive(&self) -> Vec<InboundMessage> {
            self.inbox.borrow_mut().drain(..).collect()
        }
    }

    fn channels(passcode: &str) -> ChannelTable {
        let mut table = ChannelTable::new();
        table.insert(PUBLIC_CHANNEL, "").unwrap();
        table.insert("ops", passcode).unwrap();
        table
    }

    fn node(id: i64, name: &'static str, passcode: &str) -> (MessageService, Rc<Mailbox>, Almanac) {
        let mailbox = Mailbox::new();
        let almanac = Almanac::new();
        let service = MessageService::new(
            channels(passcode),
            mailbox.clone(),
            Rc::new(Identity {
                id: NodeId::new(id),
                name,
            }),
            Rc::new(almanac.clone()),
        );
        (service, mailbox, almanac)
    }

    fn answer_ping(service: &MessageService) -> Rc<Cell<usize>> {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let responder = service.clone();
        service.add_route(
            PING_PATH,
            Rc::new(move |request: &Request| {
                counter.set(counter.get() + 1);
                Some(responder.create_response(request, ResponseStatus::Ok, None))
            }),
        );
        calls
    }

    #[test]
    fn test_create_request_stamps_standard_header() {
        let (service, _, _) = node(7, "Miner1", "key");
        let mut overrides = ValueMap::new();
        overrides.insert("Extra".to_string(), Value::from("1"));
        let request = service.create_request("ping", None, Some(overrides));

        assert_eq!(request.path(), "ping");
        assert_eq!(request.origin_id(), NodeId::new(7));
        assert_eq!(request.origin_name(), "Miner1");
        assert_eq!(request.header_str(headers::SAFE_RADIUS), "0");
        assert_eq!(request.header_str("Extra"), "1");
        assert!(!request.id().as_str().is_empty());
    }

    #[test]
    fn test_create_response_answers_request() {
        let (a, _, _) = node(1, "Alpha", "key");
        let (b, _, _) = node(2, "Bravo", "key");
        let mut request = a.create_request("ping", None, None);
        request.channels.insert("ops".to_string());

        let response = b.create_response(&request, ResponseStatus::Ok, None);
        assert_eq!(response.status(), ResponseStatus::Ok);
        assert_eq!(response.responding_to_id(), Some(request.id()));
        assert_eq!(response.target_id(), "1");
        assert_eq!(response.header_str(headers::TARGET_NAME), "Alpha");
        assert_eq!(response.origin_name(), "Bravo");
        assert!(response.channels.contains("ops"));
        assert_ne!(response.id(), request.id());
    }

    #[test]
    fn test_unicast_prefers_private_channel() {
        let (service, mailbox, _) = node(1, "Alpha", "key");
        let request = service.create_request("ping", None, None);

        assert!(service.send_unicast(NodeId::new(2), request, None));
        let sent = mailbox.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, Some(NodeId::new(2)));
        assert_eq!(sent[0].1, "ops");
        assert!(codec::is_encrypted(&sent[0].2));
        assert_eq!(service.pending_count(), 1);
    }

    #[test]
    fn test_unicast_failure_is_signalled() {
        let (service, mailbox, _) = node(1, "Alpha", "key");
        mailbox.reachable.set(false);
        let failures = Rc::new(RefCell::new(Vec::new()));
        let seen = failures.clone();
        service.subscribe(move |event| seen.borrow_mut().push(event.clone()));

        let request = service.create_request("ping", None, None);
        assert!(!service.send_unicast(NodeId::new(9), request, None));
        assert_eq!(mailbox.attempts.get(), 2);
        assert_eq!(service.pending_count(), 0);
        assert_eq!(
            failures.borrow().as_slice(),
            &[ProtocolEvent::RequestFailed {
                target_id: NodeId::new(9)
            }]
        );
    }

    #[test]
    fn test_broadcast_uses_every_channel_once() {
        let (service, mailbox, _) = node(1, "Alpha", "key");
        service.ping();

        let sent = mailbox.sent.borrow();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|(target, _, _)| target.is_none()));
        let public = sent.iter().find(|(_, c, _)| c == PUBLIC_CHANNEL).unwrap();
        let private = sent.iter().find(|(_, c, _)| c == "ops").unwrap();
        assert!(public.2.starts_with(ipc::REQUEST_PREFIX));
        assert!(codec::is_encrypted(&private.2));
        assert_eq!(service.pending_count(), 1);
    }

    #[test]
    fn test_request_response_round_trip() {
        let (a, a_box, _) = node(1, "Alpha", "key");
        let (b, b_box, b_book) = node(2, "Bravo", "key");
        let routed = answer_ping(&b);

        let answered = Rc::new(Cell::new(None));
        let slot = answered.clone();
        let request = a.create_request(PING_PATH, None, None);
        assert!(a.send_unicast(
            NodeId::new(2),
            request,
            Some(Box::new(move |response: &Response| slot.set(Some(response.status()))))
        ));

        a_box.deliver_to(&b_box);
        assert_eq!(b.process_inbox(), 1);
        assert_eq!(routed.get(), 1);

        let alpha = b_book.get_record("Alpha").unwrap();
        assert_eq!(alpha.id, "1");
        assert!(alpha.channels.contains("ops"));

        let reply = b_box.sent.borrow()[0].clone();
        assert_eq!(reply.0, Some(NodeId::new(1)));
        assert_eq!(reply.1, "ops");

        b_box.deliver_to(&a_box);
        assert_eq!(a.process_inbox(), 1);
        assert_eq!(answered.get(), Some(ResponseStatus::Ok));
        assert_eq!(a.pending_count(), 0);
    }

    #[test]
    fn test_late_response_is_not_delivered() {
        let (a, a_box, _) = node(1, "Alpha", "key");
        let (b, b_box, _) = node(2, "Bravo", "key");
        answer_ping(&b);

        let delivered = Rc::new(Cell::new(false));
        let flag = delivered.clone();
        let request = a.create_request(PING_PATH, None, None);
        a.send_unicast(
            NodeId::new(2),
            request,
            Some(Box::new(move |_: &Response| flag.set(true))),
        );
        a_box.deliver_to(&b_box);
        b.process_inbox();

        // An unrelated pass on the sender expires the call
        a_box.push(PUBLIC_CHANNEL, "noise");
        assert_eq!(a.process_inbox(), 1);
        assert_eq!(a.pending_count(), 0);

        b_box.deliver_to(&a_box);
        a.process_inbox();
        assert!(!delivered.get());
    }

    #[test]
    fn test_call_made_during_pass_expires_with_it() {
        let (a, a_box, _) = node(1, "Alpha", "key");
        let (b, b_box, _) = node(2, "Bravo", "key");
        answer_ping(&a);

        let delivered = Rc::new(Cell::new(false));
        let flag = delivered.clone();
        let relay = b.clone();
        b.add_route(
            "relay",
            Rc::new(move |request: &Request| {
                let ping = relay.create_request(PING_PATH, None, None);
                let flag = flag.clone();
                relay.send_unicast(
                    request.origin_id(),
                    ping,
                    Some(Box::new(move |_: &Response| flag.set(true))),
                );
                None::<Response>
            }),
        );

        let request = a.create_request("relay", None, None);
        assert!(a.send_unicast(NodeId::new(2), request, None));
        a_box.deliver_to(&b_box);
        assert_eq!(b.process_inbox(), 1);
        assert_eq!(b.pending_count(), 0);

        b_box.deliver_to(&a_box);
        assert_eq!(a.process_inbox(), 1);
        a_box.deliver_to(&b_box);
        assert_eq!(b.process_inbox(), 1);
        assert!(!delivered.get());
    }

    #[test]
    fn test_empty_inbox_is_not_a_pass() {
        let (a, _, _) = node(1, "Alpha", "key");
        let request = a.create_request(PING_PATH, None, None);
        a.send_unicast(NodeId::new(2), request, None);

        assert_eq!(a.process_inbox(), 0);
        assert_eq!(a.pending_count(), 1);
    }

    #[test]
    fn test_response_without_responding_to_id_is_dropped() {
        let (a, a_box, _) = node(1, "Alpha", "key");
        let request = a.create_request(PING_PATH, None, None);
        a.send_unicast(NodeId::new(2), request, None);
        a_box.sent.borrow_mut().clear();

        let orphan = Response::new(ResponseStatus::Ok, ValueMap::new(), ValueMap::new());
        a_box.push(PUBLIC_CHANNEL, &orphan.to_wire());
        assert_eq!(a.process_inbox(), 1);
        assert!(a_box.sent.borrow().is_empty());
    }

    #[test]
    fn test_wrong_passcode_yields_unroutable_garbage() {
        let (a, a_box, _) = node(1, "Alpha", "key");
        let (b, b_box, b_book) = node(2, "Bravo", "other");
        let routed = answer_ping(&b);

        let request = a.create_request(PING_PATH, None, None);
        a.send_unicast(NodeId::new(2), request, None);
        a_box.deliver_to(&b_box);

        assert_eq!(b.process_inbox(), 1);
        assert_eq!(routed.get(), 0);
        assert!(b_book.is_empty());
        assert!(b_box.sent.borrow().is_empty());
    }

    #[test]
    fn test_unrouted_request_gets_no_reply() {
        let (a, a_box, _) = node(1, "Alpha", "key");
        let (b, b_box, _) = node(2, "Bravo", "key");
        let received = Rc::new(Cell::new(0));
        let count = received.clone();
        b.subscribe(move |event| {
            if *event == ProtocolEvent::RequestReceived {
                count.set(count.get() + 1);
            }
        });

        let request = a.create_request("dock", None, None);
        a.send_unicast(NodeId::new(2), request, None);
        a_box.deliver_to(&b_box);

        assert_eq!(b.process_inbox(), 1);
        assert_eq!(received.get(), 1);
        assert!(b_box.sent.borrow().is_empty());
    }

    #[test]
    fn test_own_messages_mark_local_record() {
        let (a, a_box, a_book) = node(1, "Alpha", "key");
        a.ping();
        let (_, channel, payload) = a_box.sent.borrow()[0].clone();
        a_box.push(&channel, &payload);

        a.process_inbox();
        let own = a_book.get_record("1").unwrap();
        assert_eq!(own.transponder, Transponder::Local);
        assert!(a.remote_nodes().is_empty());
    }

    #[test]
    fn test_send_command_addresses_record() {
        let (a, a_box, a_book) = node(1, "Alpha", "key");
        let mut record = NodeRecord::grid("2", NodeEnvironment::default());
        record.add_nickname("Bravo");
        record.channels.insert("ops".to_string());
        a_book.add_or_update_record(record);

        let found = a.find_node("Bravo").unwrap();
        assert!(a.send_command(&found, "light/on --all;", None));
        assert_eq!(a.remote_nodes().len(), 1);

        let (target, channel, payload) = a_box.sent.borrow()[0].clone();
        assert_eq!(target, Some(NodeId::new(2)));
        assert_eq!(channel, "ops");
        let text = channels("key").open("ops", &payload).unwrap();
        let request = Request::from_wire(&text).unwrap();
        assert_eq!(request.path(), COMMAND_PATH);
        assert_eq!(request.target_name(), "Bravo");
        assert_eq!(request.body_str(ipc::body::COMMAND), "light/on --all;");
    }
}
