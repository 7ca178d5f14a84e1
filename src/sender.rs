use std::io::{self, Read};
use std::net::SocketAddr;
use std::time::Instant;

use log::{debug, info, warn};

use crate::codec::{self, PacketType};
use crate::consts::{MAX_DATA_SIZE, MAX_DGRAM, T_END_WAIT, T_START_WAIT};
use crate::err::Error;
use crate::policy::Policy;
use crate::transport::DatagramSocket;
use crate::window::SendWindow;

pub fn run<S: DatagramSocket, R: Read>(
    socket: &S,
    target: SocketAddr,
    window_size: u32,
    policy: Policy,
    source: &mut R,
) -> Result<(), Error> {
    let mut message = Vec::new();
    source.read_to_end(&mut message)?;
    info!("read {} bytes from source", message.len());

    start_phase(socket, target)?;

    let chunks = chunk(&message);
    info!("message split into {} chunks", chunks.len());

    let mut window = SendWindow::new(policy, window_size, chunks.len() as u32);
    data_phase(socket, target, &mut window, &chunks)?;

    end_phase(socket, target, window.end_seq())?;
    Ok(())
}

fn chunk(message: &[u8]) -> Vec<Vec<u8>> {
    message
        .chunks(MAX_DATA_SIZE)
        .map(|c| c.to_vec())
        .collect()
}

/// START phase: blocking with a 500ms timeout, resend on every timeout, until `ACK(1)`.
fn start_phase<S: DatagramSocket>(socket: &S, target: SocketAddr) -> Result<(), Error> {
    let start_packet = codec::encode(PacketType::Start, 0, &[]);

    socket.set_nonblocking(false)?;
    socket.set_read_timeout(Some(T_START_WAIT))?;

    socket.send_to(&start_packet, target)?;
    debug!("sent START packet");

    let mut buf = [0u8; MAX_DGRAM];
    loop {
        match socket.recv_from(&mut buf) {
            Ok((n, _addr)) => {
                if let Ok((header, _payload)) = codec::decode(&buf[..n]) {
                    if header.ty == PacketType::Ack && header.seq_num == 1 {
                        info!("connection established");
                        return Ok(());
                    }
                }
            }
            Err(e) if is_timeout(&e) => {
                debug!("timeout waiting for START ACK, resending");
                socket.send_to(&start_packet, target)?;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// DATA phase: non-blocking, drives the window engine to completion.
fn data_phase<S: DatagramSocket>(
    socket: &S,
    target: SocketAddr,
    window: &mut SendWindow,
    chunks: &[Vec<u8>],
) -> Result<(), Error> {
    socket.set_nonblocking(true)?;

    let mut buf = [0u8; MAX_DGRAM];
    while !window.is_complete() {
        window.admit(socket, target, chunks)?;

        match socket.recv_from(&mut buf) {
            Ok((n, _addr)) => {
                if let Ok((header, _payload)) = codec::decode(&buf[..n]) {
                    if header.ty == PacketType::Ack {
                        window.handle_ack(header.seq_num);
                    }
                }
            }
            Err(e) if is_would_block(&e) => {}
            Err(e) => return Err(e.into()),
        }

        window.check_timer(socket, target)?;
    }
    Ok(())
}

/// END phase: blocking with a 500ms timeout, resend on each timeout, give up after
/// `T_END_WAIT` wall-clock regardless of whether the ACK ever arrives.
fn end_phase<S: DatagramSocket>(socket: &S, target: SocketAddr, end_seq: u32) -> Result<(), Error> {
    let end_packet = codec::encode(PacketType::End, end_seq, &[]);

    socket.set_nonblocking(false)?;
    socket.set_read_timeout(Some(T_START_WAIT))?;

    socket.send_to(&end_packet, target)?;
    debug!("sent END packet with seq_num {end_seq}");

    let deadline = Instant::now() + T_END_WAIT;
    let mut buf = [0u8; MAX_DGRAM];
    while Instant::now() < deadline {
        match socket.recv_from(&mut buf) {
            Ok((n, _addr)) => {
                if let Ok((header, _payload)) = codec::decode(&buf[..n]) {
                    if header.ty == PacketType::Ack && header.seq_num == end_seq + 1 {
                        info!("received ACK for END, connection terminated");
                        return Ok(());
                    }
                }
            }
            Err(e) if is_timeout(&e) => {
                debug!("timeout waiting for END ACK, resending");
                socket.send_to(&end_packet, target)?;
            }
            Err(e) => return Err(e.into()),
        }
    }
    warn!("END-ACK grace period elapsed, closing regardless");
    Ok(())
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

fn is_would_block(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
}
