use std::io::{self, Write};
use std::net::SocketAddr;

use log::{debug, info, warn};

use crate::codec::{self, PacketType};
use crate::consts::{MAX_DGRAM, T_RECV_IDLE};
use crate::err::Error;
use crate::policy::Policy;
use crate::reorder::ReorderBuffer;
use crate::transport::DatagramSocket;

// mutable session state, passed explicitly rather than kept process-wide
struct ReceiverSession {
    policy: Policy,
    window: u32,
    expected_seq_num: u32,
    connection_active: bool,
    sender_addr: Option<SocketAddr>,
    reorder: ReorderBuffer,
}

impl ReceiverSession {
    fn new(policy: Policy, window: u32) -> Self {
        ReceiverSession {
            policy,
            window,
            expected_seq_num: 1,
            connection_active: false,
            sender_addr: None,
            reorder: ReorderBuffer::new(),
        }
    }
}

enum Dispatch {
    Continue,
    Terminate,
}

pub fn run<S: DatagramSocket, W: Write>(
    socket: &S,
    window: u32,
    policy: Policy,
    sink: &mut W,
) -> Result<(), Error> {
    socket.set_nonblocking(false)?;
    socket.set_read_timeout(Some(T_RECV_IDLE))?;

    let mut session = ReceiverSession::new(policy, window);
    let mut buf = [0u8; MAX_DGRAM];

    loop {
        match socket.recv_from(&mut buf) {
            Ok((n, from)) => {
                let (header, payload) = match codec::decode(&buf[..n]) {
                    Ok(parsed) => parsed,
                    Err(_) => {
                        debug!("dropped malformed datagram from {from}");
                        continue;
                    }
                };

                match dispatch(socket, &mut session, from, header, payload, sink)? {
                    Dispatch::Continue => {}
                    Dispatch::Terminate => return Ok(()),
                }
            }
            Err(e) if is_timeout(&e) => {
                if !session.connection_active {
                    warn!("timed out waiting for the initial connection");
                    return Err(Error::NoPeer);
                }
                warn!("no packet received for {:?}, continuing to wait", T_RECV_IDLE);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn dispatch<S: DatagramSocket, W: Write>(
    socket: &S,
    session: &mut ReceiverSession,
    from: SocketAddr,
    header: codec::Header,
    payload: &[u8],
    sink: &mut W,
) -> Result<Dispatch, Error> {
    match header.ty {
        PacketType::Start => handle_start(socket, session, from),
        PacketType::End => handle_end(socket, session, from, header.seq_num),
        PacketType::Data => handle_data(socket, session, from, header.seq_num, payload, sink),
        PacketType::Ack => {
            debug!("ignoring malformed inbound ACK on receiver side");
            Ok(Dispatch::Continue)
        }
    }
}

fn handle_start<S: DatagramSocket>(
    socket: &S,
    session: &mut ReceiverSession,
    from: SocketAddr,
) -> Result<Dispatch, Error> {
    debug!("received START packet from {from}");
    session.expected_seq_num = 1;

    let should_ack = match session.policy {
        // GBN binds to the first peer; a START from a different peer while bound is ignored.
        Policy::GoBackN => {
            if !session.connection_active {
                session.connection_active = true;
                session.sender_addr = Some(from);
                info!("connection activated with sender {from}");
                true
            } else {
                debug!("ignored START from {from} while bound to {:?}", session.sender_addr);
                false
            }
        }
        // SR must idempotently re-ACK duplicate STARTs caused by a lost START-ACK.
        Policy::SelectiveRepeat => {
            session.connection_active = true;
            session.sender_addr = Some(from);
            true
        }
    };

    if should_ack {
        socket.send_to(&codec::make_ack(1), from)?;
        debug!("sent ACK for START to {from}");
    }
    Ok(Dispatch::Continue)
}

fn handle_end<S: DatagramSocket>(
    socket: &S,
    session: &mut ReceiverSession,
    from: SocketAddr,
    seq_num: u32,
) -> Result<Dispatch, Error> {
    info!("received END packet with seq_num {seq_num}");
    socket.send_to(&codec::make_ack(seq_num + 1), from)?;
    debug!("sent ACK for END, terminating connection");
    session.connection_active = false;
    Ok(Dispatch::Terminate)
}

fn handle_data<S: DatagramSocket, W: Write>(
    socket: &S,
    session: &mut ReceiverSession,
    from: SocketAddr,
    seq: u32,
    payload: &[u8],
    sink: &mut W,
) -> Result<Dispatch, Error> {
    debug!(
        "received DATA packet {seq}, size {}, expecting {}",
        payload.len(),
        session.expected_seq_num
    );

    match session.policy {
        Policy::GoBackN => handle_data_gbn(session, seq, payload, sink)?,
        Policy::SelectiveRepeat => {
            if !handle_data_sr(session, seq, payload, sink)? {
                // out-of-window: drop without ACK
                return Ok(Dispatch::Continue);
            }
        }
    }

    let ack_seq = match session.policy {
        Policy::GoBackN => session.expected_seq_num,
        Policy::SelectiveRepeat => seq,
    };
    socket.send_to(&codec::make_ack(ack_seq), from)?;
    Ok(Dispatch::Continue)
}

fn handle_data_gbn<W: Write>(
    session: &mut ReceiverSession,
    seq: u32,
    payload: &[u8],
    sink: &mut W,
) -> io::Result<()> {
    if seq == session.expected_seq_num {
        sink.write_all(payload)?;
        sink.flush()?;
        session.expected_seq_num += 1;
        debug!("delivered packet {seq}, expecting {} next", session.expected_seq_num);
    } else {
        debug!("discarded out-of-order packet {seq}, still expecting {}", session.expected_seq_num);
    }
    Ok(())
}

/// Returns `false` when the packet was out-of-window and must be dropped without an ACK.
fn handle_data_sr<W: Write>(
    session: &mut ReceiverSession,
    seq: u32,
    payload: &[u8],
    sink: &mut W,
) -> io::Result<bool> {
    if seq < session.expected_seq_num {
        debug!("duplicate DATA packet {seq} ignored");
    } else if seq == session.expected_seq_num {
        sink.write_all(payload)?;
        sink.flush()?;
        session.expected_seq_num += 1;
        session.expected_seq_num = session.reorder.drain_from(session.expected_seq_num, sink)?;
    } else if seq >= session.expected_seq_num + session.window {
        debug!("dropped packet {seq} outside window");
        return Ok(false);
    } else if !session.reorder.contains(seq) {
        session.reorder.insert(seq, payload.to_vec());
    }
    Ok(true)
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::fake::FakeSocket;
    use std::net::Ipv4Addr;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::new(Ipv4Addr::LOCALHOST.into(), port)
    }

    #[test]
    fn single_packet_no_loss_gbn() {
        let sock = FakeSocket::new(9200);
        let from = addr(9201);

        sock.deliver(codec::encode(PacketType::Start, 0, &[]), from);
        sock.deliver(codec::encode(PacketType::Data, 1, b"0123456789"), from);
        sock.deliver(codec::encode(PacketType::End, 2, &[]), from);

        let mut sink = Vec::new();
        run(&sock, 4, Policy::GoBackN, &mut sink).unwrap();

        assert_eq!(sink, b"0123456789");
        let acks: Vec<u32> = sock
            .sent
            .borrow()
            .iter()
            .map(|(pkt, _)| codec::decode(pkt).unwrap().0.seq_num)
            .collect();
        assert_eq!(acks, vec![1, 2, 3]);
    }

    #[test]
    fn reordered_pair_sr_delivers_in_order() {
        let sock = FakeSocket::new(9300);
        let from = addr(9301);

        sock.deliver(codec::encode(PacketType::Start, 0, &[]), from);
        sock.deliver(codec::encode(PacketType::Data, 2, b"two"), from);
        sock.deliver(codec::encode(PacketType::Data, 1, b"one"), from);
        sock.deliver(codec::encode(PacketType::End, 3, &[]), from);

        let mut sink = Vec::new();
        run(&sock, 4, Policy::SelectiveRepeat, &mut sink).unwrap();

        assert_eq!(sink, b"onetwo");
    }

    #[test]
    fn duplicate_start_is_idempotent_for_sr() {
        let sock = FakeSocket::new(9400);
        let from = addr(9401);

        sock.deliver(codec::encode(PacketType::Start, 0, &[]), from);
        sock.deliver(codec::encode(PacketType::Start, 0, &[]), from);
        sock.deliver(codec::encode(PacketType::Data, 1, b"x"), from);
        sock.deliver(codec::encode(PacketType::End, 2, &[]), from);

        let mut sink = Vec::new();
        run(&sock, 4, Policy::SelectiveRepeat, &mut sink).unwrap();
        assert_eq!(sink, b"x");
    }

    #[test]
    fn sr_out_of_window_data_is_dropped_without_ack() {
        let sock = FakeSocket::new(9500);
        let from = addr(9501);

        sock.deliver(codec::encode(PacketType::Start, 0, &[]), from);
        sock.deliver(codec::encode(PacketType::Data, 10, b"far"), from);
        sock.deliver(codec::encode(PacketType::Data, 1, b"x"), from);
        sock.deliver(codec::encode(PacketType::End, 2, &[]), from);

        let mut sink = Vec::new();
        run(&sock, 4, Policy::SelectiveRepeat, &mut sink).unwrap();

        let acks: Vec<u32> = sock
            .sent
            .borrow()
            .iter()
            .map(|(pkt, _)| codec::decode(pkt).unwrap().0.seq_num)
            .collect();
        // ACK(1) for START, ACK(1) for the in-order DATA, ACK(3) for END; nothing for seq 10.
        assert_eq!(acks, vec![1, 1, 3]);
    }
}
