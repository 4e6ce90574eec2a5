//! End-to-end tests: a scripted SMSC on one side of an in-memory stream, the
//! gateway on the other.

use crate::client::{BindCredentials, KeepAliveConfig, Session, SessionSettings, SmppError};
use crate::codec::{CodecError, Frame};
use crate::connection::FrameReader;
use crate::datatypes::*;
use crate::gateway::{GatewayError, MessageSender};
use crate::message::{
    CompletedMessage, ConcatInfo, DeliveryReceipt, InboundDispatcher, MessageSink, Reassembler,
};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};

mod frame_tests {
    use super::*;

    #[test]
    fn check_needs_four_bytes() {
        let data = [0x00, 0x00];
        let mut cursor = Cursor::new(&data[..]);
        assert!(matches!(Frame::check(&mut cursor), Err(CodecError::Incomplete)));
    }

    #[test]
    fn check_rejects_short_command_length() {
        let data = [
            0x00, 0x00, 0x00, 0x05, // command_length = 5 (under the header size)
            0x00, 0x00, 0x00, 0x15, // enquire_link
            0x00, 0x00, 0x00, 0x00, // command_status
            0x00, 0x00, 0x00, 0x01, // sequence_number
        ];
        let mut cursor = Cursor::new(&data[..]);
        let err = Frame::check(&mut cursor).unwrap_err();
        assert!(matches!(err, CodecError::InvalidPduLength { length: 5, .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn check_rejects_oversized_command_length() {
        let data = [
            0xFF, 0xFF, 0xFF, 0xFF, // command_length = u32::MAX
            0x00, 0x00, 0x00, 0x15, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
        ];
        let mut cursor = Cursor::new(&data[..]);
        assert!(matches!(
            Frame::check(&mut cursor),
            Err(CodecError::InvalidPduLength { .. })
        ));
    }

    #[test]
    fn check_waits_for_the_whole_body() {
        let submit = SubmitSm::new(
            Address::unknown("1").unwrap(),
            Address::unknown("2").unwrap(),
            DataCoding::SmscDefault,
            EsmClass::default(),
            bytes::Bytes::from_static(b"partial"),
        );
        let bytes = Frame::SubmitSm(Box::new(submit)).to_bytes().unwrap();
        let mut cursor = Cursor::new(&bytes[..bytes.len() - 1]);
        assert!(matches!(Frame::check(&mut cursor), Err(CodecError::Incomplete)));
    }

    #[test]
    fn concatenated_submit_survives_the_wire() {
        let units = crate::message::encode_and_split(
            &Address::unknown("12345").unwrap(),
            &Address::unknown("447700900000").unwrap(),
            &"w".repeat(170),
            0x2A,
        )
        .unwrap();
        assert_eq!(units.len(), 2);

        let bytes = Frame::SubmitSm(Box::new(units[1].clone())).to_bytes().unwrap();
        let Frame::SubmitSm(parsed) = Frame::parse(&bytes).unwrap() else {
            panic!("expected submit_sm");
        };
        assert!(parsed.esm_class.has_udhi());
        assert_eq!(parsed.registered_delivery, REGISTERED_DELIVERY_RECEIPT);
        assert_eq!(&parsed.short_message[..6], &ConcatInfo::new(0x2A, 2, 2).to_udh());
        assert_eq!(parsed.short_message.len(), 6 + 17);
    }
}

type SmscReader = FrameReader<ReadHalf<DuplexStream>>;

/// SMSC side of the link: accepts the bind and answers each submit_sm.
struct FakeSmsc {
    reader: SmscReader,
    // Raw so malformed PDUs can be written too.
    writer: WriteHalf<DuplexStream>,
    next_id: u32,
}

impl FakeSmsc {
    async fn accept(stream: DuplexStream) -> FakeSmsc {
        let (r, w) = tokio::io::split(stream);
        let mut smsc = FakeSmsc {
            reader: FrameReader::new(r),
            writer: w,
            next_id: 1,
        };
        let Some(Frame::BindTransceiver(bind)) = smsc.reader.read_frame().await.unwrap() else {
            panic!("expected bind_transceiver");
        };
        let resp = BindTransceiverResponse::new(bind.sequence_number, "FAKE");
        smsc.send(Frame::BindTransceiverResp(resp)).await;
        smsc
    }

    async fn send(&mut self, frame: Frame) {
        self.send_raw(&frame.to_bytes().unwrap()).await;
    }

    async fn send_raw(&mut self, pdu: &[u8]) {
        self.writer.write_all(pdu).await.unwrap();
    }

    /// Reads the next submit_sm, skipping acknowledgements from the gateway.
    async fn next_submit(&mut self) -> SubmitSm {
        loop {
            match self.reader.read_frame().await.unwrap() {
                Some(Frame::SubmitSm(submit)) => return *submit,
                Some(Frame::DeliverSmResp(_)) => continue,
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    async fn answer(&mut self, submit: &SubmitSm, status: CommandStatus) {
        let resp = if status.is_ok() {
            let id = format!("id-{}", self.next_id);
            self.next_id += 1;
            SubmitSmResponse::new(submit.sequence_number, &id)
        } else {
            SubmitSmResponse::error(submit.sequence_number, status)
        };
        self.send(Frame::SubmitSmResp(resp)).await;
    }

    async fn expect_deliver_resp(&mut self, sequence_number: u32) {
        match self.reader.read_frame().await.unwrap() {
            Some(Frame::DeliverSmResp(resp)) => assert_eq!(resp.sequence_number, sequence_number),
            other => panic!("expected deliver_sm_resp, got {other:?}"),
        }
    }
}

#[derive(Default)]
struct Inbox {
    messages: Mutex<Vec<CompletedMessage>>,
    receipts: Mutex<Vec<DeliveryReceipt>>,
}

impl MessageSink for Arc<Inbox> {
    fn on_message(&self, message: CompletedMessage) {
        self.messages.lock().unwrap().push(message);
    }

    fn on_receipt(&self, receipt: DeliveryReceipt) {
        self.receipts.lock().unwrap().push(receipt);
    }
}

fn settings() -> SessionSettings {
    SessionSettings {
        response_timeout: Duration::from_secs(2),
        keep_alive: KeepAliveConfig::disabled(),
        rebind_interval: None,
    }
}

async fn gateway(stream: DuplexStream, inbox: Arc<Inbox>) -> MessageSender<Session> {
    let dispatcher = InboundDispatcher::new(Arc::new(Reassembler::default()), inbox);
    let session = Session::builder(BindCredentials::transceiver("esme", "secret"))
        .settings(settings())
        .handler(Arc::new(dispatcher))
        .open(stream)
        .await
        .unwrap();
    MessageSender::with_first_reference(session, Address::unknown("12345").unwrap(), 0x10)
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    for _ in 0..100 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

fn mo_part(sequence_number: u32, reference: u8, total: u8, index: u8, text: &str) -> Frame {
    let mut payload = ConcatInfo::new(reference, total, index).to_udh().to_vec();
    payload.extend_from_slice(text.as_bytes());
    Frame::DeliverSm(Box::new(
        DeliverSm::builder()
            .sequence_number(sequence_number)
            .source(Address::unknown("447700900001").unwrap())
            .destination(Address::unknown("12345").unwrap())
            .esm_class(EsmClass::default().with_udhi())
            .short_message(payload)
            .build(),
    ))
}

#[tokio::test]
async fn long_message_is_submitted_part_by_part() {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let text: String = "The quick brown fox jumps over the lazy dog. ".repeat(8);

    let smsc = tokio::spawn(async move {
        let mut smsc = FakeSmsc::accept(server).await;
        let mut parts = Vec::new();
        for _ in 0..3 {
            let submit = smsc.next_submit().await;
            smsc.answer(&submit, CommandStatus::Ok).await;
            parts.push(submit);
        }
        (smsc, parts)
    });

    let sender = gateway(client, Arc::default()).await;
    let receipts = sender.send_message("447700900000", &text).await.unwrap();
    let (_smsc, parts) = smsc.await.unwrap();

    let ids: Vec<&str> = receipts.iter().map(|r| r.message_id.as_str()).collect();
    assert_eq!(ids, vec!["id-1", "id-2", "id-3"]);

    let mut rejoined = Vec::new();
    for (i, part) in parts.iter().enumerate() {
        assert_eq!(part.data_coding, DataCoding::SmscDefault);
        assert_eq!(&part.short_message[..6], &ConcatInfo::new(0x10, 3, i as u8 + 1).to_udh());
        rejoined.extend_from_slice(&part.short_message[6..]);
    }
    assert_eq!(rejoined, text.as_bytes());
}

#[tokio::test]
async fn rejected_part_stops_the_message() {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let text = "é".repeat(400);

    let smsc = tokio::spawn(async move {
        let mut smsc = FakeSmsc::accept(server).await;
        let first = smsc.next_submit().await;
        smsc.answer(&first, CommandStatus::Ok).await;
        let second = smsc.next_submit().await;
        smsc.answer(&second, CommandStatus::MessageQueueFull).await;

        // Nothing else arrives before the gateway goes quiet.
        let third = tokio::time::timeout(Duration::from_millis(200), smsc.reader.read_frame()).await;
        assert!(third.is_err(), "a third part was submitted");
        smsc
    });

    let sender = gateway(client, Arc::default()).await;
    let err = sender.send_message("447700900000", &text).await.unwrap_err();
    let _smsc = smsc.await.unwrap();

    match err {
        GatewayError::Submit(err) => {
            assert_eq!(err.part, 2);
            assert_eq!(err.total, 3);
            assert_eq!(err.destination, "447700900000");
            assert!(matches!(
                err.source,
                SmppError::Protocol(CommandStatus::MessageQueueFull)
            ));
        }
        other => panic!("expected submit error, got {other:?}"),
    }
}

#[tokio::test]
async fn inbound_parts_are_reassembled_and_receipts_logged() {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let inbox = Arc::new(Inbox::default());

    let smsc = tokio::spawn(async move {
        let mut smsc = FakeSmsc::accept(server).await;

        smsc.send(mo_part(101, 7, 3, 2, "f2")).await;
        smsc.expect_deliver_resp(101).await;
        smsc.send(mo_part(102, 7, 3, 1, "f1")).await;
        smsc.expect_deliver_resp(102).await;
        smsc.send(mo_part(103, 7, 3, 3, "f3")).await;
        smsc.expect_deliver_resp(103).await;

        let receipt = DeliverSm::builder()
            .sequence_number(104)
            .esm_class(EsmClass::from_byte(0x04))
            .short_message(&b"id:id-1 sub:001 dlvrd:001 stat:DELIVRD err:000 text:"[..])
            .build();
        smsc.send(Frame::DeliverSm(Box::new(receipt))).await;
        smsc.expect_deliver_resp(104).await;
        smsc
    });

    let _sender = gateway(client, inbox.clone()).await;
    let _smsc = smsc.await.unwrap();

    wait_until(|| !inbox.receipts.lock().unwrap().is_empty()).await;
    let messages = inbox.messages.lock().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].text, "f1f2f3");
    assert_eq!(messages[0].source.as_str(), "447700900001");
    assert_eq!(inbox.receipts.lock().unwrap()[0].id, "id-1");
}

#[tokio::test]
async fn enquire_link_from_smsc_is_answered() {
    let (client, server) = tokio::io::duplex(64 * 1024);

    let smsc = tokio::spawn(async move {
        let mut smsc = FakeSmsc::accept(server).await;
        smsc.send(Frame::EnquireLink(EnquireLink::new(55))).await;
        match smsc.reader.read_frame().await.unwrap() {
            Some(Frame::EnquireLinkResp(resp)) => assert_eq!(resp.sequence_number, 55),
            other => panic!("expected enquire_link_resp, got {other:?}"),
        }
        smsc
    });

    let _sender = gateway(client, Arc::default()).await;
    let _smsc = smsc.await.unwrap();
}

#[tokio::test]
async fn gateway_enquire_link_round_trip() {
    let (client, server) = tokio::io::duplex(64 * 1024);

    let smsc = tokio::spawn(async move {
        let mut smsc = FakeSmsc::accept(server).await;
        let Some(Frame::EnquireLink(req)) = smsc.reader.read_frame().await.unwrap() else {
            panic!("expected enquire_link");
        };
        smsc.send(Frame::EnquireLinkResp(EnquireLinkResponse::new(req.sequence_number)))
            .await;
        smsc
    });

    let sender = gateway(client, Arc::default()).await;
    sender.transport().enquire_link().await.unwrap();
    let _smsc = smsc.await.unwrap();
}

#[tokio::test]
async fn unanswered_submit_times_out() {
    let (client, server) = tokio::io::duplex(64 * 1024);

    let smsc = tokio::spawn(async move {
        let mut smsc = FakeSmsc::accept(server).await;
        let _ignored = smsc.next_submit().await;
        // Hold the link open past the client's timeout.
        tokio::time::sleep(Duration::from_millis(500)).await;
        smsc
    });

    let dispatcher = InboundDispatcher::new(Arc::new(Reassembler::default()), Arc::new(Inbox::default()));
    let session = Session::builder(BindCredentials::transceiver("esme", "secret"))
        .settings(SessionSettings {
            response_timeout: Duration::from_millis(100),
            ..settings()
        })
        .handler(Arc::new(dispatcher))
        .open(client)
        .await
        .unwrap();
    let sender = MessageSender::new(session, Address::unknown("12345").unwrap());

    let err = sender.send_message("447700900000", "ping").await.unwrap_err();
    assert!(matches!(
        err,
        GatewayError::Submit(ref e) if matches!(e.source, SmppError::Timeout)
    ));
    let _smsc = smsc.await.unwrap();
}

#[tokio::test]
async fn undecodable_deliver_sm_is_rejected_and_the_link_survives() {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let inbox = Arc::new(Inbox::default());

    let smsc = tokio::spawn(async move {
        let mut smsc = FakeSmsc::accept(server).await;

        // deliver_sm #77 with the last octet of its TLV value cut off and
        // command_length patched to match.
        let deliver = DeliverSm::builder()
            .sequence_number(77)
            .source(Address::unknown("447700900001").unwrap())
            .destination(Address::unknown("12345").unwrap())
            .short_message(&b"broken"[..])
            .sar(0x0102, 2, 1)
            .build();
        let mut pdu = Frame::DeliverSm(Box::new(deliver)).to_bytes().unwrap().to_vec();
        pdu.pop();
        let length = pdu.len() as u32;
        pdu[..4].copy_from_slice(&length.to_be_bytes());
        smsc.send_raw(&pdu).await;

        let reply = tokio::time::timeout(Duration::from_secs(1), smsc.reader.read_frame())
            .await
            .expect("no answer to the malformed deliver_sm")
            .unwrap();
        match reply {
            Some(Frame::DeliverSmResp(resp)) => {
                assert_eq!(resp.sequence_number, 77);
                assert_eq!(resp.command_status, CommandStatus::InvalidOptionalPartOfPdu);
            }
            other => panic!("expected deliver_sm_resp, got {other:?}"),
        }

        // The next good PDU is still read and acknowledged.
        smsc.send(mo_part(78, 9, 1, 1, "still here")).await;
        smsc.expect_deliver_resp(78).await;
        smsc
    });

    let _sender = gateway(client, inbox.clone()).await;
    let _smsc = smsc.await.unwrap();

    wait_until(|| !inbox.messages.lock().unwrap().is_empty()).await;
    assert_eq!(inbox.messages.lock().unwrap()[0].text, "still here");
}
