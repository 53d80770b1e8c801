//! Minimal S7 client over ISO-on-TCP (RFC 1006).
//!
//! Covers exactly what the watchdog needs from a CPU: session setup (COTP
//! connect + PDU negotiation), the CPU status SZL (ID 0x0424), and the
//! `P_PROGRAM` hot-start job. Every telegram is built and parsed here; there is
//! no dependency on a vendor library.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, warn};

use super::{ControllerProbe, ProbeError, RunState};
use crate::core::config::ControllerConfig;

/// Default connect timeout (matches the gateway's transport timeout).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default read/write timeout once connected.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

const TPKT_VERSION: u8 = 0x03;
const TPKT_HEADER_LEN: usize = 4;
const MAX_FRAME_LEN: usize = 4096;

const COTP_CONNECTION_REQUEST: u8 = 0xE0;
const COTP_CONNECTION_CONFIRM: u8 = 0xD0;
const COTP_DATA: u8 = 0xF0;
const COTP_EOT: u8 = 0x80;

const S7_PROTOCOL_ID: u8 = 0x32;
const ROSCTR_JOB: u8 = 0x01;
const ROSCTR_ACK: u8 = 0x02;
const ROSCTR_ACK_DATA: u8 = 0x03;
const ROSCTR_USERDATA: u8 = 0x07;

const FN_SETUP_COMMUNICATION: u8 = 0xF0;
const FN_PLC_CONTROL: u8 = 0x28;

const LOCAL_TSAP: u16 = 0x0100;
const PG_CONNECTION: u16 = 0x0100;
const REQUESTED_PDU_LEN: u16 = 480;

const SZL_CPU_STATUS: u16 = 0x0424;
const SZL_RETURN_OK: u8 = 0xFF;
/// Offset of the status byte: data header (4) + SZL id/index (4) +
/// LENTHDR/N_DR (4) + byte 3 of the first record.
const SZL_STATUS_OFFSET: usize = 15;

const CPU_STATUS_RUN: u8 = 0x08;
const CPU_STATUS_STOP: u8 = 0x04;

/// Remote TSAP for a PG connection to the CPU at `rack`/`slot`.
#[must_use]
pub const fn remote_tsap(rack: u16, slot: u16) -> u16 {
    PG_CONNECTION | (rack * 0x20 + slot)
}

/// Map the SZL 0x0424 mode byte onto a [`RunState`].
#[must_use]
pub const fn classify_cpu_status(mode: u8) -> RunState {
    match mode {
        CPU_STATUS_RUN => RunState::Run,
        CPU_STATUS_STOP => RunState::Stop,
        _ => RunState::Unknown,
    }
}

// ---------------------------------------------------------------------------
// Telegrams
// ---------------------------------------------------------------------------

fn be_len(len: usize) -> [u8; 2] {
    u16::try_from(len).unwrap_or(u16::MAX).to_be_bytes()
}

fn tpkt(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(TPKT_HEADER_LEN + payload.len());
    frame.extend_from_slice(&[TPKT_VERSION, 0x00]);
    frame.extend_from_slice(&be_len(TPKT_HEADER_LEN + payload.len()));
    frame.extend_from_slice(payload);
    frame
}

fn data_frame(s7: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(3 + s7.len());
    payload.extend_from_slice(&[0x02, COTP_DATA, COTP_EOT]);
    payload.extend_from_slice(s7);
    tpkt(&payload)
}

fn s7_request(rosctr: u8, pdu_ref: u16, params: &[u8], data: &[u8]) -> Vec<u8> {
    let mut s7 = Vec::with_capacity(10 + params.len() + data.len());
    s7.extend_from_slice(&[S7_PROTOCOL_ID, rosctr, 0x00, 0x00]);
    s7.extend_from_slice(&pdu_ref.to_be_bytes());
    s7.extend_from_slice(&be_len(params.len()));
    s7.extend_from_slice(&be_len(data.len()));
    s7.extend_from_slice(params);
    s7.extend_from_slice(data);
    data_frame(&s7)
}

pub(crate) fn connection_request(remote_tsap: u16) -> Vec<u8> {
    let [local_hi, local_lo] = LOCAL_TSAP.to_be_bytes();
    let [remote_hi, remote_lo] = remote_tsap.to_be_bytes();
    tpkt(&[
        0x11,
        COTP_CONNECTION_REQUEST,
        0x00, 0x00, // destination reference
        0x00, 0x01, // source reference
        0x00, // class 0
        0xC0, 0x01, 0x0A, // TPDU size 1024
        0xC1, 0x02, local_hi, local_lo,
        0xC2, 0x02, remote_hi, remote_lo,
    ])
}

pub(crate) fn setup_communication(pdu_ref: u16) -> Vec<u8> {
    let [pdu_hi, pdu_lo] = REQUESTED_PDU_LEN.to_be_bytes();
    s7_request(
        ROSCTR_JOB,
        pdu_ref,
        &[FN_SETUP_COMMUNICATION, 0x00, 0x00, 0x01, 0x00, 0x01, pdu_hi, pdu_lo],
        &[],
    )
}

pub(crate) fn read_szl(pdu_ref: u16, id: u16, index: u16) -> Vec<u8> {
    let [id_hi, id_lo] = id.to_be_bytes();
    let [index_hi, index_lo] = index.to_be_bytes();
    s7_request(
        ROSCTR_USERDATA,
        pdu_ref,
        &[0x00, 0x01, 0x12, 0x04, 0x11, 0x44, 0x01, 0x00],
        &[0xFF, 0x09, 0x00, 0x04, id_hi, id_lo, index_hi, index_lo],
    )
}

pub(crate) fn hot_start(pdu_ref: u16) -> Vec<u8> {
    let mut params = vec![FN_PLC_CONTROL, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFD, 0x00, 0x00, 0x09];
    params.extend_from_slice(b"P_PROGRAM");
    s7_request(ROSCTR_JOB, pdu_ref, &params, &[])
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub(crate) struct S7Reply<'a> {
    pub rosctr: u8,
    pub params: &'a [u8],
    pub data: &'a [u8],
}

fn protocol(context: &'static str, details: impl Into<String>) -> ProbeError {
    ProbeError::Protocol {
        context,
        details: details.into(),
    }
}

/// Split a COTP data TPDU into S7 parameter and data sections.
pub(crate) fn parse_reply<'a>(
    payload: &'a [u8],
    context: &'static str,
) -> Result<S7Reply<'a>, ProbeError> {
    if payload.len() < 3 || payload[1] != COTP_DATA {
        return Err(protocol(context, "expected a COTP data TPDU"));
    }
    let s7 = &payload[3..];
    if s7.len() < 10 || s7[0] != S7_PROTOCOL_ID {
        return Err(protocol(context, "missing S7 protocol header"));
    }
    let rosctr = s7[1];
    let header_len = if matches!(rosctr, ROSCTR_ACK | ROSCTR_ACK_DATA) {
        12
    } else {
        10
    };
    if s7.len() < header_len {
        return Err(protocol(context, "truncated S7 header"));
    }
    if header_len == 12 && (s7[10] != 0 || s7[11] != 0) {
        return Err(ProbeError::Rejected {
            context,
            class: s7[10],
            code: s7[11],
        });
    }
    let params_len = usize::from(u16::from_be_bytes([s7[6], s7[7]]));
    let data_len = usize::from(u16::from_be_bytes([s7[8], s7[9]]));
    let body = &s7[header_len..];
    if body.len() < params_len + data_len {
        return Err(protocol(
            context,
            format!(
                "body of {} bytes shorter than announced {}",
                body.len(),
                params_len + data_len
            ),
        ));
    }
    Ok(S7Reply {
        rosctr,
        params: &body[..params_len],
        data: &body[params_len..params_len + data_len],
    })
}

pub(crate) fn decode_cpu_status(reply: &S7Reply<'_>) -> Result<RunState, ProbeError> {
    const CONTEXT: &str = "CPU status";
    if reply.rosctr != ROSCTR_USERDATA {
        return Err(protocol(
            CONTEXT,
            format!("unexpected ROSCTR {:#04x}", reply.rosctr),
        ));
    }
    if let Some(&[class, code]) = reply.params.get(10..12) {
        if class != 0 || code != 0 {
            return Err(ProbeError::Rejected {
                context: CONTEXT,
                class,
                code,
            });
        }
    }
    match reply.data.first() {
        Some(&SZL_RETURN_OK) => {}
        Some(&other) => {
            return Err(protocol(CONTEXT, format!("SZL return code {other:#04x}")));
        }
        None => return Err(protocol(CONTEXT, "empty SZL data")),
    }
    reply
        .data
        .get(SZL_STATUS_OFFSET)
        .copied()
        .map(classify_cpu_status)
        .ok_or_else(|| protocol(CONTEXT, "SZL record too short"))
}

pub(crate) fn read_frame(stream: &mut impl Read, context: &'static str) -> Result<Vec<u8>, ProbeError> {
    let mut header = [0_u8; TPKT_HEADER_LEN];
    stream
        .read_exact(&mut header)
        .map_err(|source| ProbeError::Io { context, source })?;
    if header[0] != TPKT_VERSION {
        return Err(protocol(context, format!("bad TPKT version {:#04x}", header[0])));
    }
    let len = usize::from(u16::from_be_bytes([header[2], header[3]]));
    if !(TPKT_HEADER_LEN + 3..=MAX_FRAME_LEN).contains(&len) {
        return Err(protocol(context, format!("implausible TPKT length {len}")));
    }
    let mut payload = vec![0_u8; len - TPKT_HEADER_LEN];
    stream
        .read_exact(&mut payload)
        .map_err(|source| ProbeError::Io { context, source })?;
    Ok(payload)
}

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Session {
    stream: TcpStream,
    pdu_len: u16,
}

/// [`ControllerProbe`] speaking S7 to a single CPU.
#[derive(Debug)]
pub struct S7Probe {
    host: String,
    port: u16,
    rack: u16,
    slot: u16,
    connect_timeout: Duration,
    io_timeout: Duration,
    session: Option<Session>,
    pdu_ref: u16,
}

impl S7Probe {
    #[must_use]
    pub fn new(host: impl Into<String>, rack: u16, slot: u16) -> Self {
        Self {
            host: host.into(),
            port: 102,
            rack,
            slot,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
            session: None,
            pdu_ref: 0,
        }
    }

    #[must_use]
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self::new(config.ip.clone(), config.rack, config.slot).with_port(config.port)
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, connect: Duration, io: Duration) -> Self {
        self.connect_timeout = connect;
        self.io_timeout = io;
        self
    }

    /// PDU length negotiated for the live session.
    #[must_use]
    pub fn pdu_len(&self) -> Option<u16> {
        self.session.as_ref().map(|session| session.pdu_len)
    }

    fn next_pdu_ref(&mut self) -> u16 {
        self.pdu_ref = self.pdu_ref.wrapping_add(1).max(1);
        self.pdu_ref
    }

    fn resolve(&self) -> Result<SocketAddr, ProbeError> {
        let addr = format!("{}:{}", self.host, self.port);
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|source| ProbeError::Connect {
                addr: addr.clone(),
                source,
            })?
            .next()
            .ok_or_else(|| ProbeError::Connect {
                addr,
                source: io::Error::new(io::ErrorKind::NotFound, "host resolved to no address"),
            })
    }

    fn open(&mut self) -> Result<Session, ProbeError> {
        let addr = self.resolve()?;
        let mut stream =
            TcpStream::connect_timeout(&addr, self.connect_timeout).map_err(|source| {
                ProbeError::Connect {
                    addr: addr.to_string(),
                    source,
                }
            })?;
        let setup = |source| ProbeError::Io {
            context: "socket setup",
            source,
        };
        stream.set_read_timeout(Some(self.io_timeout)).map_err(setup)?;
        stream.set_write_timeout(Some(self.io_timeout)).map_err(setup)?;
        stream.set_nodelay(true).map_err(setup)?;

        let tsap = remote_tsap(self.rack, self.slot);
        stream
            .write_all(&connection_request(tsap))
            .map_err(|source| ProbeError::Io {
                context: "ISO connect",
                source,
            })?;
        let confirm = read_frame(&mut stream, "ISO connect")?;
        if confirm.get(1).map(|tpdu| tpdu & 0xF0) != Some(COTP_CONNECTION_CONFIRM) {
            return Err(protocol(
                "ISO connect",
                format!("connection refused for TSAP {tsap:#06x}"),
            ));
        }

        let negotiate = setup_communication(self.next_pdu_ref());
        stream
            .write_all(&negotiate)
            .map_err(|source| ProbeError::Io {
                context: "PDU negotiation",
                source,
            })?;
        let reply = read_frame(&mut stream, "PDU negotiation")?;
        let reply = parse_reply(&reply, "PDU negotiation")?;
        let pdu_len = match reply.params.get(6..8) {
            Some(&[hi, lo]) => u16::from_be_bytes([hi, lo]),
            _ => return Err(protocol("PDU negotiation", "missing PDU length")),
        };
        Ok(Session { stream, pdu_len })
    }

    /// Send one telegram and read its reply. Any failure drops the session,
    /// since the stream can no longer be trusted to be in sync.
    fn exchange(&mut self, frame: &[u8], context: &'static str) -> Result<Vec<u8>, ProbeError> {
        let session = self.session.as_mut().ok_or(ProbeError::NotConnected)?;
        let result = session
            .stream
            .write_all(frame)
            .map_err(|source| ProbeError::Io { context, source })
            .and_then(|()| read_frame(&mut session.stream, context));
        if result.is_err() {
            self.session = None;
        }
        result
    }

    fn read_cpu_status(&mut self) -> Result<RunState, ProbeError> {
        let frame = read_szl(self.next_pdu_ref(), SZL_CPU_STATUS, 0);
        let reply = self.exchange(&frame, "CPU status")?;
        decode_cpu_status(&parse_reply(&reply, "CPU status")?)
    }
}

impl ControllerProbe for S7Probe {
    fn connect(&mut self) -> Result<(), ProbeError> {
        if self.session.is_some() {
            return Ok(());
        }
        let session = self.open()?;
        debug!(
            host = %self.host,
            rack = self.rack,
            slot = self.slot,
            pdu_len = session.pdu_len,
            "S7 session established"
        );
        self.session = Some(session);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), ProbeError> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        match session.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(source) => Err(ProbeError::Io {
                context: "disconnect",
                source,
            }),
        }
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn status(&mut self) -> RunState {
        if self.session.is_none() {
            return RunState::Unknown;
        }
        match self.read_cpu_status() {
            Ok(state) => state,
            Err(err) => {
                // A reply that failed to decode leaves the session unusable too.
                warn!(error = %err, "CPU status read failed; dropping session");
                self.session = None;
                RunState::Unknown
            }
        }
    }

    fn request_warm_start(&mut self) -> Result<(), ProbeError> {
        let frame = hot_start(self.next_pdu_ref());
        let reply = self.exchange(&frame, "hot start")?;
        let reply = parse_reply(&reply, "hot start")?;
        if reply.params.first() != Some(&FN_PLC_CONTROL) {
            return Err(protocol("hot start", "reply does not acknowledge PLC control"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::escalation::{EscalationOutcome, EscalationProtocol};
    use crate::notify::AckState;
    use crate::testkit::{InstantPacer, ScriptedGateway};
    use std::collections::VecDeque;
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    fn ack_data(params: &[u8], data: &[u8]) -> Vec<u8> {
        let mut s7 = vec![S7_PROTOCOL_ID, ROSCTR_ACK_DATA, 0x00, 0x00, 0x00, 0x01];
        s7.extend_from_slice(&be_len(params.len()));
        s7.extend_from_slice(&be_len(data.len()));
        s7.extend_from_slice(&[0x00, 0x00]);
        s7.extend_from_slice(params);
        s7.extend_from_slice(data);
        data_frame(&s7)
    }

    fn szl_reply(mode: u8) -> Vec<u8> {
        szl_reply_with(SZL_RETURN_OK, mode)
    }

    fn szl_reply_with(return_code: u8, mode: u8) -> Vec<u8> {
        let params = [0x00, 0x01, 0x12, 0x08, 0x12, 0x84, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00];
        let mut record = vec![0x43, 0x02, 0xFF, mode];
        record.resize(28, 0x00);
        let mut data = vec![return_code, 0x09];
        data.extend_from_slice(&be_len(8 + record.len()));
        data.extend_from_slice(&[0x04, 0x24, 0x00, 0x00, 0x00, 0x1C, 0x00, 0x01]);
        data.extend_from_slice(&record);

        let mut s7 = vec![S7_PROTOCOL_ID, ROSCTR_USERDATA, 0x00, 0x00, 0x00, 0x01];
        s7.extend_from_slice(&be_len(params.len()));
        s7.extend_from_slice(&be_len(data.len()));
        s7.extend_from_slice(&params);
        s7.extend_from_slice(&data);
        data_frame(&s7)
    }

    fn fake_reply(payload: &[u8], szl: &mut VecDeque<Vec<u8>>) -> Vec<u8> {
        if payload[1] == COTP_CONNECTION_REQUEST {
            return tpkt(&[
                0x11, COTP_CONNECTION_CONFIRM, 0x00, 0x01, 0x00, 0x01, 0x00, 0xC0, 0x01, 0x0A,
                0xC1, 0x02, 0x01, 0x00, 0xC2, 0x02, 0x01, 0x02,
            ]);
        }
        let s7 = &payload[3..];
        match (s7[1], s7[10]) {
            (ROSCTR_JOB, FN_SETUP_COMMUNICATION) => ack_data(
                &[FN_SETUP_COMMUNICATION, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0xF0],
                &[],
            ),
            (ROSCTR_JOB, FN_PLC_CONTROL) => ack_data(&[FN_PLC_CONTROL], &[]),
            (ROSCTR_USERDATA, _) => {
                if szl.len() > 1 {
                    szl.pop_front().unwrap_or_default()
                } else {
                    szl.front().cloned().unwrap_or_default()
                }
            }
            other => panic!("fake PLC got unexpected telegram {other:?}"),
        }
    }

    /// Accept one client, answer every telegram, and return what was received.
    fn spawn_fake_plc(mode: u8) -> (u16, JoinHandle<Vec<Vec<u8>>>) {
        spawn_scripted_plc(vec![szl_reply(mode)])
    }

    /// Like [`spawn_fake_plc`], answering status reads from `szl` in order and
    /// repeating the last reply.
    fn spawn_scripted_plc(szl: Vec<Vec<u8>>) -> (u16, JoinHandle<Vec<Vec<u8>>>) {
        let mut szl: VecDeque<Vec<u8>> = szl.into();
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake PLC");
        let port = listener.local_addr().expect("local addr").port();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut seen = Vec::new();
            while let Ok(payload) = read_frame(&mut stream, "fake PLC") {
                let reply = fake_reply(&payload, &mut szl);
                seen.push(payload);
                if stream.write_all(&reply).is_err() {
                    break;
                }
            }
            seen
        });
        (port, handle)
    }

    fn probe_for(port: u16) -> S7Probe {
        S7Probe::new("127.0.0.1", 0, 2)
            .with_port(port)
            .with_timeouts(Duration::from_secs(2), Duration::from_secs(2))
    }

    #[test]
    fn tsap_encodes_rack_and_slot() {
        assert_eq!(remote_tsap(0, 2), 0x0102);
        assert_eq!(remote_tsap(0, 1), 0x0101);
        assert_eq!(remote_tsap(1, 3), 0x0123);
    }

    #[test]
    fn telegram_lengths_match_tpkt_header() {
        for (frame, expected) in [
            (connection_request(remote_tsap(0, 2)), 22),
            (setup_communication(1), 25),
            (read_szl(2, SZL_CPU_STATUS, 0), 33),
            (hot_start(3), 37),
        ] {
            assert_eq!(frame.len(), expected);
            assert_eq!(usize::from(u16::from_be_bytes([frame[2], frame[3]])), expected);
        }
    }

    #[test]
    fn connection_request_carries_remote_tsap() {
        let frame = connection_request(remote_tsap(0, 2));
        assert_eq!(&frame[frame.len() - 4..], &[0xC2, 0x02, 0x01, 0x02]);
    }

    #[test]
    fn cpu_status_byte_is_classified() {
        assert_eq!(classify_cpu_status(0x08), RunState::Run);
        assert_eq!(classify_cpu_status(0x04), RunState::Stop);
        assert_eq!(classify_cpu_status(0x00), RunState::Unknown);
    }

    #[test]
    fn szl_reply_decodes_stop() {
        let frame = szl_reply(CPU_STATUS_STOP);
        let reply = parse_reply(&frame[TPKT_HEADER_LEN..], "test").expect("parse");
        assert_eq!(decode_cpu_status(&reply).expect("decode"), RunState::Stop);
    }

    #[test]
    fn rejected_ack_surfaces_error_class() {
        let s7 = [S7_PROTOCOL_ID, ROSCTR_ACK_DATA, 0, 0, 0, 1, 0, 0, 0, 0, 0x85, 0x00];
        let frame = data_frame(&s7);
        let err = parse_reply(&frame[TPKT_HEADER_LEN..], "test").expect_err("rejected");
        assert!(matches!(
            err,
            ProbeError::Rejected {
                class: 0x85,
                code: 0x00,
                ..
            }
        ));
    }

    #[test]
    fn session_against_fake_plc_reads_status_and_hot_starts() {
        let (port, plc) = spawn_fake_plc(CPU_STATUS_STOP);
        let mut probe = probe_for(port);

        probe.connect().expect("connect");
        assert!(probe.is_connected());
        assert_eq!(probe.pdu_len(), Some(240));
        probe.connect().expect("second connect reuses the session");

        assert_eq!(probe.status(), RunState::Stop);
        probe.request_warm_start().expect("hot start");
        probe.disconnect().expect("disconnect");
        assert!(!probe.is_connected());

        let seen = plc.join().expect("fake PLC thread");
        assert_eq!(seen.len(), 4, "CR, setup, SZL read, hot start");
        assert_eq!(seen[0][1], COTP_CONNECTION_REQUEST);
    }

    #[test]
    fn running_cpu_reports_run() {
        let (port, plc) = spawn_fake_plc(CPU_STATUS_RUN);
        let mut probe = probe_for(port);
        probe.connect().expect("connect");
        assert_eq!(probe.status(), RunState::Run);
        probe.disconnect().expect("disconnect");
        plc.join().expect("fake PLC thread");
    }

    #[test]
    fn undecodable_status_reply_drops_the_session() {
        let (port, plc) = spawn_scripted_plc(vec![szl_reply_with(0x0A, CPU_STATUS_STOP)]);
        let mut probe = probe_for(port);
        probe.connect().expect("connect");

        assert_eq!(probe.status(), RunState::Unknown);
        assert!(!probe.is_connected(), "a failed read must not leave a live session");
        plc.join().expect("fake PLC thread");
    }

    #[test]
    fn bad_status_reply_during_incident_keeps_it_open() {
        let (port, plc) = spawn_scripted_plc(vec![
            szl_reply(CPU_STATUS_STOP),
            szl_reply_with(0x0A, CPU_STATUS_STOP),
        ]);
        let mut probe = probe_for(port);
        probe.connect().expect("connect");
        assert_eq!(probe.status(), RunState::Stop);

        let gateway = ScriptedGateway::new().acks([Ok(AckState::Pending)]);
        let mut pacer = InstantPacer::new().shutdown_after(1);
        let report = EscalationProtocol::new(Duration::from_secs(5), "plc").run(
            &mut probe,
            &gateway,
            &mut pacer,
        );

        assert_eq!(report.outcome, EscalationOutcome::Interrupted);
        assert_eq!(report.polls, 1);
        assert_eq!(gateway.cancels(), 0, "the controller never left STOP");
        assert!(!probe.is_connected());
        plc.join().expect("fake PLC thread");
    }

    #[test]
    fn refused_connection_is_a_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let mut probe = probe_for(port);
        let err = probe.connect().expect_err("nothing listening");
        assert!(matches!(err, ProbeError::Connect { .. }));
        assert!(!probe.is_connected());
    }

    #[test]
    fn idle_probe_reports_unknown_and_disconnects_cleanly() {
        let mut probe = S7Probe::new("127.0.0.1", 0, 2);
        assert_eq!(probe.status(), RunState::Unknown);
        probe.disconnect().expect("idle disconnect");
        assert!(matches!(
            probe.request_warm_start(),
            Err(ProbeError::NotConnected)
        ));
    }
}
