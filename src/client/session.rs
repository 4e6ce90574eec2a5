// ABOUTME: Transceiver session: bind handshake, background reader, keep-alive and rebind
// ABOUTME: Submits are correlated to responses by sequence number so many can be in flight

use crate::client::error::{SmppError, SmppResult};
use crate::client::keepalive::{KeepAliveManager, KeepAliveStatus};
use crate::client::traits::{
    CloseReason, InboundHandler, LoggingEvents, SessionEvents, SmppTransmitter, SubmitReceipt,
};
use crate::client::types::{BindCredentials, SessionSettings};
use crate::codec::{CodecError, Frame};
use crate::connection::{FrameReader, FrameWriter};
use crate::datatypes::{
    BindTransceiverResponse, CommandId, CommandStatus, DataSmResponse, DeliverSmResponse,
    EnquireLink, EnquireLinkResponse, GenericNack, SubmitSm, Unbind, UnbindResponse,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{Notify, oneshot, watch};
use tokio::time::{MissedTickBehavior, timeout};
use tracing::{debug, info, warn};

type BoxedRead = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;

/// A bound transceiver session.
///
/// Cloning is cheap and every clone drives the same link. A background task
/// reads the link: it answers deliver_sm, data_sm, enquire_link and unbind
/// itself, hands every frame to the [`InboundHandler`], and completes the
/// request waiting on each response.
///
/// Sessions opened with [`SessionBuilder::connect`] reconnect and rebind on
/// their own when the link drops, pausing
/// [`SessionSettings::rebind_interval`] between attempts. Requests made while
/// the link is down fail with [`SmppError::ConnectionClosed`].
///
/// Call [`Session::close`] to unbind; the background tasks run until then.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

struct Link {
    writer: FrameWriter<BoxedWrite>,
    generation: u64,
    // Wakes the reader task of this link so it stops and reports the link lost.
    kill: Arc<Notify>,
}

struct Inner {
    credentials: BindCredentials,
    settings: SessionSettings,
    can_rebind: bool,
    handler: Arc<dyn InboundHandler>,
    events: Arc<dyn SessionEvents>,

    sequence: AtomicU32,
    generation: AtomicU64,
    link: tokio::sync::Mutex<Option<Link>>,
    pending: Mutex<HashMap<u32, oneshot::Sender<Frame>>>,
    keep_alive: Mutex<KeepAliveManager>,

    closed: AtomicBool,
    link_lost: Notify,
    shutdown: watch::Sender<bool>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Session {
    pub fn builder(credentials: BindCredentials) -> SessionBuilder {
        SessionBuilder::new(credentials)
    }

    /// Sends enquire_link and waits for the response.
    pub async fn enquire_link(&self) -> SmppResult<()> {
        self.inner.ensure_open()?;
        self.inner
            .enquire_link(self.inner.settings.response_timeout)
            .await
    }

    /// Whether a link is currently bound.
    pub async fn is_bound(&self) -> bool {
        !self.inner.closed.load(Ordering::Acquire) && self.inner.link.lock().await.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn keep_alive_status(&self) -> KeepAliveStatus {
        lock(&self.inner.keep_alive).status()
    }

    /// Unbinds and drops the link. Idempotent.
    ///
    /// An unbind the SMSC does not answer in time still closes the session;
    /// the error is returned for logging.
    pub async fn close(&self) -> SmppResult<()> {
        let inner = &self.inner;
        if inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let unbind = Frame::Unbind(Unbind::new(inner.next_sequence()));
        let result = match inner.request(unbind, inner.settings.response_timeout).await {
            Ok(response) => expect_response(response, CommandId::UnbindResp).map(|_| ()),
            Err(SmppError::ConnectionClosed) => Ok(()),
            Err(e) => Err(e),
        };

        if let Some(mut link) = inner.link.lock().await.take() {
            link.kill.notify_one();
            if let Err(e) = link.writer.shutdown().await {
                debug!("shutdown after unbind: {e}");
            }
        }
        inner.fail_pending();
        inner.shutdown.send_replace(true);
        inner.events.on_closed(CloseReason::Requested);
        result
    }
}

impl SmppTransmitter for Session {
    async fn submit_sm(&self, submit: &SubmitSm) -> SmppResult<SubmitReceipt> {
        let inner = &self.inner;
        inner.ensure_open()?;

        let sequence_number = inner.next_sequence();
        let mut pdu = submit.clone();
        pdu.sequence_number = sequence_number;

        let result = inner
            .request(
                Frame::SubmitSm(Box::new(pdu)),
                inner.settings.response_timeout,
            )
            .await
            .and_then(|response| expect_response(response, CommandId::SubmitSmResp));

        match result {
            Ok(Frame::SubmitSmResp(resp)) => {
                debug!(
                    "submit_sm #{} to {} accepted as {}",
                    sequence_number, submit.destination, resp.message_id
                );
                Ok(SubmitReceipt {
                    sequence_number,
                    message_id: resp.message_id,
                })
            }
            Ok(other) => Err(SmppError::UnexpectedPdu {
                expected: CommandId::SubmitSmResp,
                actual: other.command_id(),
            }),
            Err(e) => {
                inner.events.on_submit_error(sequence_number, &e);
                Err(e)
            }
        }
    }
}

/// The answer to a request PDU that could not be decoded: its own response
/// with an error status where one exists, generic_nack otherwise.
fn rejection(error: &CodecError) -> Option<Frame> {
    match error {
        CodecError::InvalidCommandId {
            sequence_number, ..
        } => Some(Frame::GenericNack(GenericNack::invalid_command_id(
            *sequence_number,
        ))),
        CodecError::UndecodablePdu {
            command_id,
            sequence_number,
            ..
        } if !command_id.is_response() => {
            let status = error.to_command_status();
            let seq = *sequence_number;
            Some(match command_id {
                CommandId::DeliverSm => Frame::DeliverSmResp(DeliverSmResponse::error(seq, status)),
                CommandId::DataSm => Frame::DataSmResp(DataSmResponse::error(seq, status)),
                _ => Frame::GenericNack(GenericNack::new(status, seq)),
            })
        }
        _ => None,
    }
}

/// Turns GenericNack and non-zero statuses into errors and checks the type.
fn expect_response(response: Frame, expected: CommandId) -> SmppResult<Frame> {
    match response {
        Frame::GenericNack(nack) => Err(SmppError::GenericNack(nack.command_status)),
        frame if frame.command_id() != expected => Err(SmppError::UnexpectedPdu {
            expected,
            actual: frame.command_id(),
        }),
        frame if !frame.command_status().is_ok() => Err(SmppError::Protocol(frame.command_status())),
        frame => Ok(frame),
    }
}

impl Inner {
    fn ensure_open(&self) -> SmppResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SmppError::InvalidState("session closed".to_string()));
        }
        Ok(())
    }

    /// Sequence numbers run 1..=0x7FFFFFFF and wrap.
    fn next_sequence(&self) -> u32 {
        loop {
            let sequence_number = self.sequence.fetch_add(1, Ordering::Relaxed) & 0x7FFF_FFFF;
            if sequence_number != 0 {
                return sequence_number;
            }
        }
    }

    async fn send(&self, frame: &Frame) -> SmppResult<()> {
        let mut guard = self.link.lock().await;
        let link = guard.as_mut().ok_or(SmppError::ConnectionClosed)?;
        if let Err(e) = link.writer.write_frame(frame).await {
            if e.is_fatal() {
                link.kill.notify_one();
            }
            return Err(e.into());
        }
        Ok(())
    }

    async fn request(&self, frame: Frame, wait: Duration) -> SmppResult<Frame> {
        let sequence_number = frame.sequence_number();
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(sequence_number, tx);

        if let Err(e) = self.send(&frame).await {
            lock(&self.pending).remove(&sequence_number);
            return Err(e);
        }

        match timeout(wait, rx).await {
            Ok(Ok(response)) => Ok(response),
            // Sender dropped: the link went down with the request outstanding.
            Ok(Err(_)) => Err(SmppError::ConnectionClosed),
            Err(_) => {
                lock(&self.pending).remove(&sequence_number);
                Err(SmppError::Timeout)
            }
        }
    }

    async fn enquire_link(&self, wait: Duration) -> SmppResult<()> {
        let frame = Frame::EnquireLink(EnquireLink::new(self.next_sequence()));
        let response = self.request(frame, wait).await?;
        expect_response(response, CommandId::EnquireLinkResp).map(|_| ())
    }

    fn fail_pending(&self) {
        let dropped = std::mem::take(&mut *lock(&self.pending));
        if !dropped.is_empty() {
            debug!("failing {} outstanding requests", dropped.len());
        }
    }

    async fn kill_link(&self) {
        if let Some(link) = self.link.lock().await.as_ref() {
            link.kill.notify_one();
        }
    }

    /// Connects over TCP and binds.
    async fn connect(inner: &Arc<Inner>, addr: &str) -> SmppResult<()> {
        let stream = timeout(inner.settings.response_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| SmppError::Timeout)??;
        stream.set_nodelay(true)?;
        info!("connected to {addr}");
        Inner::establish(inner, stream).await
    }

    /// Binds over `stream`, installs it as the current link and starts its reader.
    async fn establish<S>(inner: &Arc<Inner>, stream: S) -> SmppResult<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let mut reader = FrameReader::new(Box::new(read_half) as BoxedRead);
        let mut writer = FrameWriter::new(Box::new(write_half) as BoxedWrite);

        let response = inner.bind(&mut reader, &mut writer).await?;
        info!(
            "bound as transceiver {} to {}",
            inner.credentials.system_id, response.system_id
        );

        let generation = inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let kill = Arc::new(Notify::new());
        *inner.link.lock().await = Some(Link {
            writer,
            generation,
            kill: Arc::clone(&kill),
        });
        lock(&inner.keep_alive).on_activity();

        tokio::spawn(Arc::clone(inner).read_loop(reader, generation, kill));
        Ok(())
    }

    /// bind_transceiver handshake, run before the reader task owns the stream.
    async fn bind(
        &self,
        reader: &mut FrameReader<BoxedRead>,
        writer: &mut FrameWriter<BoxedWrite>,
    ) -> SmppResult<BindTransceiverResponse> {
        let sequence_number = self.next_sequence();
        let bind = self.credentials.to_bind(sequence_number)?;
        writer.write_frame(&Frame::BindTransceiver(bind)).await?;

        let exchange = async {
            loop {
                match reader.read_frame().await? {
                    None => return Err(SmppError::ConnectionClosed),
                    Some(Frame::BindTransceiverResp(resp))
                        if resp.sequence_number == sequence_number =>
                    {
                        if !resp.command_status.is_ok() {
                            return Err(SmppError::Protocol(resp.command_status));
                        }
                        return Ok(resp);
                    }
                    Some(Frame::GenericNack(nack)) => {
                        return Err(SmppError::GenericNack(nack.command_status));
                    }
                    Some(other) => {
                        debug!("ignoring {:?} before bind completed", other.command_id())
                    }
                }
            }
        };

        timeout(self.settings.response_timeout, exchange)
            .await
            .map_err(|_| SmppError::Timeout)?
    }

    async fn read_loop(
        self: Arc<Self>,
        mut reader: FrameReader<BoxedRead>,
        generation: u64,
        kill: Arc<Notify>,
    ) {
        let reason = loop {
            let result = tokio::select! {
                _ = kill.notified() => break CloseReason::LinkLost,
                result = reader.read_frame() => result,
            };

            match result {
                Ok(Some(frame)) => {
                    if let Some(reason) = self.dispatch(frame).await {
                        break reason;
                    }
                }
                Ok(None) => {
                    info!("SMSC closed the connection");
                    break CloseReason::LinkLost;
                }
                Err(e) => {
                    if let Some(reply) = rejection(&e) {
                        if let Err(send_err) = self.send(&reply).await {
                            warn!("failed to reject {:?}: {send_err}", reply.command_id());
                        }
                    }

                    let fatal = e.is_fatal();
                    self.events.on_receive_error(&SmppError::Codec(e));
                    if fatal {
                        break CloseReason::LinkLost;
                    }
                }
            }
        };

        self.link_down(generation, reason).await;
    }

    /// Acknowledges, hands off and correlates one inbound frame. Returns a
    /// reason when the frame ends the link.
    async fn dispatch(&self, frame: Frame) -> Option<CloseReason> {
        let sequence_number = frame.sequence_number();

        let reply = match &frame {
            Frame::DeliverSm(_) => Some(Frame::DeliverSmResp(DeliverSmResponse::new(
                sequence_number,
            ))),
            Frame::DataSm(_) => Some(Frame::DataSmResp(DataSmResponse::new(sequence_number, ""))),
            Frame::EnquireLink(_) => Some(Frame::EnquireLinkResp(EnquireLinkResponse::new(
                sequence_number,
            ))),
            Frame::Unbind(_) => Some(Frame::UnbindResp(UnbindResponse::new(sequence_number))),
            Frame::Unknown { header, .. } if !header.command_id.is_response() => {
                Some(Frame::GenericNack(GenericNack::new(
                    CommandStatus::InvalidCommandId,
                    sequence_number,
                )))
            }
            _ => None,
        };

        if let Some(reply) = reply {
            if let Err(e) = self.send(&reply).await {
                warn!(
                    "failed to answer {:?} #{}: {}",
                    frame.command_id(),
                    sequence_number,
                    e
                );
            }
        }

        self.handler.on_frame(&frame);

        if matches!(frame, Frame::Unbind(_)) {
            info!("SMSC requested unbind");
            return Some(CloseReason::UnboundByPeer);
        }

        if frame.is_response() {
            lock(&self.keep_alive).on_activity();
            let waiter = lock(&self.pending).remove(&sequence_number);
            match waiter {
                Some(tx) => {
                    // The requester may have timed out already.
                    let _ = tx.send(frame);
                }
                None => debug!(
                    "no request waiting for {:?} #{}",
                    frame.command_id(),
                    sequence_number
                ),
            }
        }

        None
    }

    /// Tears down link `generation` once its reader has stopped.
    async fn link_down(&self, generation: u64, reason: CloseReason) {
        {
            let mut guard = self.link.lock().await;
            if guard.as_ref().map(|link| link.generation) != Some(generation) {
                // Already replaced or taken by close().
                self.fail_pending();
                return;
            }
            if let Some(mut link) = guard.take() {
                if let Err(e) = link.writer.shutdown().await {
                    debug!("shutdown of lost link: {e}");
                }
            }
        }
        self.fail_pending();

        if self.closed.load(Ordering::Acquire) {
            return;
        }

        if self.can_rebind {
            warn!("link lost ({reason:?})");
            self.link_lost.notify_one();
        } else if !self.closed.swap(true, Ordering::AcqRel) {
            self.shutdown.send_replace(true);
            self.events.on_closed(reason);
        }
    }

    async fn keep_alive_loop(self: Arc<Self>) {
        let mut shutdown = self.shutdown.subscribe();
        let (interval, wait) = {
            let manager = lock(&self.keep_alive);
            (manager.interval(), manager.timeout())
        };
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.wait_for(|closed| *closed) => break,
                _ = ticker.tick() => {}
            }

            if self.link.lock().await.is_none() {
                continue;
            }

            {
                let mut manager = lock(&self.keep_alive);
                if !manager.should_ping() {
                    continue;
                }
                manager.on_ping_sent();
            }

            let result = self.enquire_link(wait).await;
            let failed = {
                let mut manager = lock(&self.keep_alive);
                match result {
                    Ok(()) => manager.on_ping_success(),
                    Err(_) => manager.on_ping_failure(),
                }
                manager.is_connection_failed()
            };

            if failed {
                warn!("keep-alive gave up on the link");
                self.kill_link().await;
            }
        }
        debug!("keep-alive stopped");
    }

    async fn rebind_loop(self: Arc<Self>, addr: String, pause: Duration) {
        let mut shutdown = self.shutdown.subscribe();

        loop {
            tokio::select! {
                _ = shutdown.wait_for(|closed| *closed) => return,
                _ = self.link_lost.notified() => {}
            }

            loop {
                if self.closed.load(Ordering::Acquire) {
                    return;
                }
                info!("rebinding to {addr}");
                match Inner::connect(&self, &addr).await {
                    Ok(()) => break,
                    Err(e) => self.events.on_rebind_error(&e),
                }
                tokio::select! {
                    _ = shutdown.wait_for(|closed| *closed) => return,
                    _ = tokio::time::sleep(pause) => {}
                }
            }
        }
    }
}

struct IgnoreInbound;

impl InboundHandler for IgnoreInbound {
    fn on_frame(&self, frame: &Frame) {
        debug!("inbound {:?} not handled", frame.command_id());
    }
}

/// Configures and opens a [`Session`].
pub struct SessionBuilder {
    credentials: BindCredentials,
    settings: SessionSettings,
    handler: Arc<dyn InboundHandler>,
    events: Arc<dyn SessionEvents>,
}

impl SessionBuilder {
    pub fn new(credentials: BindCredentials) -> Self {
        Self {
            credentials,
            settings: SessionSettings::default(),
            handler: Arc::new(IgnoreInbound),
            events: Arc::new(LoggingEvents),
        }
    }

    crate::macros::builder_setters! {
        settings: SessionSettings,
        handler: Arc<dyn InboundHandler>,
        events: Arc<dyn SessionEvents>,
    }

    /// Connects to `addr` over TCP and binds. The session rebinds to the
    /// same address if the link drops, unless `rebind_interval` is `None`.
    pub async fn connect(self, addr: impl Into<String>) -> SmppResult<Session> {
        let addr = addr.into();
        let rebind_interval = self.settings.rebind_interval;
        let inner = self.into_inner(rebind_interval.is_some());

        Inner::connect(&inner, &addr).await?;
        Self::spawn_keep_alive(&inner);
        if let Some(pause) = rebind_interval {
            tokio::spawn(Arc::clone(&inner).rebind_loop(addr, pause));
        }
        Ok(Session { inner })
    }

    /// Binds over an already connected stream. There is nothing to
    /// reconnect to, so losing the stream closes the session.
    pub async fn open<S>(self, stream: S) -> SmppResult<Session>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let inner = self.into_inner(false);
        Inner::establish(&inner, stream).await?;
        Self::spawn_keep_alive(&inner);
        Ok(Session { inner })
    }

    fn spawn_keep_alive(inner: &Arc<Inner>) {
        if inner.settings.keep_alive.enabled {
            tokio::spawn(Arc::clone(inner).keep_alive_loop());
        }
    }

    fn into_inner(self, can_rebind: bool) -> Arc<Inner> {
        let (shutdown, _) = watch::channel(false);
        Arc::new(Inner {
            keep_alive: Mutex::new(KeepAliveManager::new(self.settings.keep_alive.clone())),
            credentials: self.credentials,
            settings: self.settings,
            can_rebind,
            handler: self.handler,
            events: self.events,
            sequence: AtomicU32::new(1),
            generation: AtomicU64::new(0),
            link: tokio::sync::Mutex::new(None),
            pending: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            link_lost: Notify::new(),
            shutdown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::keepalive::KeepAliveConfig;
    use crate::datatypes::{
        Address, BindTransceiverResponse, DataCoding, DeliverSm, EsmClass, SubmitSmResponse,
    };
    use bytes::Bytes;
    use tokio::io::{DuplexStream, ReadHalf, WriteHalf};

    type Smsc = (
        FrameReader<ReadHalf<DuplexStream>>,
        FrameWriter<WriteHalf<DuplexStream>>,
    );

    fn settings() -> SessionSettings {
        SessionSettings {
            response_timeout: Duration::from_secs(2),
            keep_alive: KeepAliveConfig::disabled(),
            rebind_interval: None,
        }
    }

    fn smsc_side(stream: DuplexStream) -> Smsc {
        let (r, w) = tokio::io::split(stream);
        (FrameReader::new(r), FrameWriter::new(w))
    }

    async fn accept_bind(smsc: &mut Smsc) {
        let Some(Frame::BindTransceiver(bind)) = smsc.0.read_frame().await.unwrap() else {
            panic!("expected bind_transceiver");
        };
        assert_eq!(bind.system_id, "esme");
        let resp = BindTransceiverResponse::new(bind.sequence_number, "SMSC");
        smsc.1
            .write_frame(&Frame::BindTransceiverResp(resp))
            .await
            .unwrap();
    }

    fn submit() -> SubmitSm {
        SubmitSm::new(
            Address::unknown("100").unwrap(),
            Address::unknown("200").unwrap(),
            DataCoding::SmscDefault,
            EsmClass::default(),
            Bytes::from_static(b"hi"),
        )
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<CommandId>>);

    impl InboundHandler for Recorder {
        fn on_frame(&self, frame: &Frame) {
            self.0.lock().unwrap().push(frame.command_id());
        }
    }

    #[derive(Default)]
    struct Closes(Mutex<Vec<CloseReason>>);

    impl SessionEvents for Closes {
        fn on_closed(&self, reason: CloseReason) {
            self.0.lock().unwrap().push(reason);
        }
    }

    fn undecodable(command_id: CommandId, sequence_number: u32, source: CodecError) -> CodecError {
        CodecError::UndecodablePdu {
            command_id,
            sequence_number,
            source: Box::new(source),
        }
    }

    #[test]
    fn undecodable_requests_get_their_own_error_response() {
        let err = undecodable(CommandId::DataSm, 12, CodecError::TlvError("short".into()));
        match rejection(&err) {
            Some(Frame::DataSmResp(resp)) => {
                assert_eq!(resp.sequence_number, 12);
                assert_eq!(resp.command_status, CommandStatus::InvalidOptionalPartOfPdu);
            }
            other => panic!("expected data_sm_resp, got {other:?}"),
        }

        let err = undecodable(
            CommandId::DeliverSm,
            13,
            CodecError::FieldValidation {
                field: "source_addr",
                reason: "not UTF-8".into(),
            },
        );
        match rejection(&err) {
            Some(Frame::DeliverSmResp(resp)) => {
                assert_eq!(resp.sequence_number, 13);
                assert_eq!(resp.command_status, CommandStatus::InvalidSourceAddress);
            }
            other => panic!("expected deliver_sm_resp, got {other:?}"),
        }
    }

    #[test]
    fn other_undecodable_requests_get_generic_nack() {
        let err = undecodable(CommandId::BindTransceiver, 3, CodecError::TlvError("x".into()));
        match rejection(&err) {
            Some(Frame::GenericNack(nack)) => {
                assert_eq!(nack.sequence_number, 3);
                assert_eq!(nack.command_status, CommandStatus::InvalidOptionalPartOfPdu);
            }
            other => panic!("expected generic_nack, got {other:?}"),
        }
    }

    #[test]
    fn undecodable_responses_are_not_answered() {
        let err = undecodable(CommandId::SubmitSmResp, 4, CodecError::TlvError("x".into()));
        assert!(rejection(&err).is_none());
        assert!(rejection(&CodecError::ConnectionReset).is_none());
    }

    #[tokio::test]
    async fn submit_is_correlated_with_its_response() {
        let (client, server) = tokio::io::duplex(4096);
        let smsc = tokio::spawn(async move {
            let mut smsc = smsc_side(server);
            accept_bind(&mut smsc).await;
            let Some(Frame::SubmitSm(pdu)) = smsc.0.read_frame().await.unwrap() else {
                panic!("expected submit_sm");
            };
            assert_ne!(pdu.sequence_number, 0);
            let resp = SubmitSmResponse::new(pdu.sequence_number, "msg-1");
            smsc.1.write_frame(&Frame::SubmitSmResp(resp)).await.unwrap();
            smsc
        });

        let session = Session::builder(BindCredentials::transceiver("esme", "pw"))
            .settings(settings())
            .open(client)
            .await
            .unwrap();
        let receipt = session.submit_sm(&submit()).await.unwrap();
        assert_eq!(receipt.message_id, "msg-1");
        let _smsc = smsc.await.unwrap();
    }

    #[tokio::test]
    async fn rejected_bind_reports_status() {
        let (client, server) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let mut smsc = smsc_side(server);
            let Some(Frame::BindTransceiver(bind)) = smsc.0.read_frame().await.unwrap() else {
                panic!("expected bind_transceiver");
            };
            let resp =
                BindTransceiverResponse::error(bind.sequence_number, CommandStatus::InvalidPassword);
            smsc.1
                .write_frame(&Frame::BindTransceiverResp(resp))
                .await
                .unwrap();
            smsc
        });

        let result = Session::builder(BindCredentials::transceiver("esme", "bad"))
            .settings(settings())
            .open(client)
            .await;
        assert!(matches!(
            result,
            Err(SmppError::Protocol(CommandStatus::InvalidPassword))
        ));
    }

    #[tokio::test]
    async fn rejected_submit_is_a_protocol_error() {
        let (client, server) = tokio::io::duplex(4096);
        let smsc = tokio::spawn(async move {
            let mut smsc = smsc_side(server);
            accept_bind(&mut smsc).await;
            let Some(Frame::SubmitSm(pdu)) = smsc.0.read_frame().await.unwrap() else {
                panic!("expected submit_sm");
            };
            let resp = SubmitSmResponse::error(pdu.sequence_number, CommandStatus::ThrottlingError);
            smsc.1.write_frame(&Frame::SubmitSmResp(resp)).await.unwrap();
            smsc
        });

        let session = Session::builder(BindCredentials::transceiver("esme", "pw"))
            .settings(settings())
            .open(client)
            .await
            .unwrap();
        let err = session.submit_sm(&submit()).await.unwrap_err();
        assert!(matches!(
            err,
            SmppError::Protocol(CommandStatus::ThrottlingError)
        ));
        let _smsc = smsc.await.unwrap();
    }

    #[tokio::test]
    async fn deliver_sm_is_acknowledged_then_handed_off() {
        let (client, server) = tokio::io::duplex(4096);
        let recorder = Arc::new(Recorder::default());

        let smsc = tokio::spawn(async move {
            let mut smsc = smsc_side(server);
            accept_bind(&mut smsc).await;
            let deliver = DeliverSm::builder()
                .sequence_number(77)
                .source(Address::unknown("200").unwrap())
                .destination(Address::unknown("100").unwrap())
                .short_message(Bytes::from_static(b"hello"))
                .build();
            smsc.1
                .write_frame(&Frame::DeliverSm(Box::new(deliver)))
                .await
                .unwrap();
            let Some(Frame::DeliverSmResp(resp)) = smsc.0.read_frame().await.unwrap() else {
                panic!("expected deliver_sm_resp");
            };
            assert_eq!(resp.sequence_number, 77);
            smsc
        });

        let _session = Session::builder(BindCredentials::transceiver("esme", "pw"))
            .settings(settings())
            .handler(recorder.clone())
            .open(client)
            .await
            .unwrap();
        let _smsc = smsc.await.unwrap();

        // The handler runs right after the ack is written.
        for _ in 0..50 {
            if !recorder.0.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(*recorder.0.lock().unwrap(), vec![CommandId::DeliverSm]);
    }

    #[tokio::test]
    async fn peer_unbind_closes_session() {
        let (client, server) = tokio::io::duplex(4096);
        let closes = Arc::new(Closes::default());

        let smsc = tokio::spawn(async move {
            let mut smsc = smsc_side(server);
            accept_bind(&mut smsc).await;
            smsc.1
                .write_frame(&Frame::Unbind(Unbind::new(9)))
                .await
                .unwrap();
            let Some(Frame::UnbindResp(resp)) = smsc.0.read_frame().await.unwrap() else {
                panic!("expected unbind_resp");
            };
            assert_eq!(resp.sequence_number, 9);
            smsc
        });

        let session = Session::builder(BindCredentials::transceiver("esme", "pw"))
            .settings(settings())
            .events(closes.clone())
            .open(client)
            .await
            .unwrap();
        let _smsc = smsc.await.unwrap();

        for _ in 0..50 {
            if session.is_closed() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(session.is_closed());
        assert_eq!(*closes.0.lock().unwrap(), vec![CloseReason::UnboundByPeer]);
        assert!(matches!(
            session.submit_sm(&submit()).await,
            Err(SmppError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn close_sends_unbind() {
        let (client, server) = tokio::io::duplex(4096);
        let smsc = tokio::spawn(async move {
            let mut smsc = smsc_side(server);
            accept_bind(&mut smsc).await;
            let Some(Frame::Unbind(unbind)) = smsc.0.read_frame().await.unwrap() else {
                panic!("expected unbind");
            };
            smsc.1
                .write_frame(&Frame::UnbindResp(UnbindResponse::new(unbind.sequence_number)))
                .await
                .unwrap();
            smsc
        });

        let session = Session::builder(BindCredentials::transceiver("esme", "pw"))
            .settings(settings())
            .open(client)
            .await
            .unwrap();
        assert!(session.is_bound().await);
        assert!(!session.keep_alive_status().running);
        session.close().await.unwrap();
        assert!(session.is_closed());
        assert!(!session.is_bound().await);
        session.close().await.unwrap();
        let _smsc = smsc.await.unwrap();
    }
}
