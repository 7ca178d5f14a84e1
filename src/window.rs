use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Instant;
#[cfg(test)]
use std::time::Duration;

use log::debug;

use crate::codec::{self, PacketType};
use crate::consts::T_RTX;
use crate::policy::Policy;
use crate::transport::DatagramSocket;

// A single retransmission timer shared by the whole window, not one per packet.
#[derive(Debug)]
struct RtxTimer {
    active: bool,
    started_at: Instant,
}

impl RtxTimer {
    fn idle() -> Self {
        RtxTimer {
            active: false,
            started_at: Instant::now(),
        }
    }

    fn start(&mut self) {
        self.active = true;
        self.started_at = Instant::now();
    }

    fn stop(&mut self) {
        self.active = false;
    }

    fn expired(&self) -> bool {
        self.active && self.started_at.elapsed() > T_RTX
    }
}

#[derive(Debug)]
pub struct SendWindow {
    policy: Policy,
    window: u32,
    total: u32,
    base: u32,
    next_seq_num: u32,
    send_buffer: BTreeMap<u32, Vec<u8>>,
    acknowledged: BTreeMap<u32, bool>,
    timer: RtxTimer,
}

impl SendWindow {
    pub fn new(policy: Policy, window: u32, total: u32) -> Self {
        SendWindow {
            policy,
            window,
            total,
            base: 1,
            next_seq_num: 1,
            send_buffer: BTreeMap::new(),
            acknowledged: BTreeMap::new(),
            timer: RtxTimer::idle(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.base > self.total
    }

    // one past the last DATA seq; what the END packet's seq_num must be
    pub fn end_seq(&self) -> u32 {
        self.total + 1
    }

    pub fn admit<S: DatagramSocket>(
        &mut self,
        socket: &S,
        target: SocketAddr,
        chunks: &[Vec<u8>],
    ) -> std::io::Result<()> {
        while self.next_seq_num < self.base + self.window && self.next_seq_num <= self.total {
            let seq = self.next_seq_num;
            let chunk = &chunks[(seq - 1) as usize];
            let packet = codec::encode(PacketType::Data, seq, chunk);

            socket.send_to(&packet, target)?;
            debug!("sent DATA packet {seq}");

            self.send_buffer.insert(seq, packet);
            if self.policy == Policy::SelectiveRepeat {
                self.acknowledged.insert(seq, false);
            }

            if !self.timer.active {
                self.timer.start();
            }

            self.next_seq_num += 1;
        }
        Ok(())
    }

    pub fn handle_ack(&mut self, seq: u32) {
        match self.policy {
            Policy::GoBackN => self.handle_ack_gbn(seq),
            Policy::SelectiveRepeat => self.handle_ack_sr(seq),
        }
    }

    fn handle_ack_gbn(&mut self, seq: u32) {
        if seq <= self.base {
            return;
        }
        debug!("ACK {seq} advances base from {}", self.base);
        self.base = seq;
        if self.base == self.next_seq_num {
            self.timer.stop();
        } else {
            self.timer.start();
        }
    }

    fn handle_ack_sr(&mut self, seq: u32) {
        debug!("individual ACK for packet {seq}");
        self.acknowledged.insert(seq, true);
        while self
            .acknowledged
            .get(&self.base)
            .copied()
            .unwrap_or(false)
        {
            self.base += 1;
        }
    }

    pub fn check_timer<S: DatagramSocket>(
        &mut self,
        socket: &S,
        target: SocketAddr,
    ) -> std::io::Result<()> {
        if !self.timer.expired() {
            return Ok(());
        }

        debug!("retransmission timer expired, resending window [{}, {})", self.base, self.next_seq_num);
        match self.policy {
            Policy::GoBackN => {
                for seq in self.base..self.next_seq_num {
                    if let Some(packet) = self.send_buffer.get(&seq) {
                        socket.send_to(packet, target)?;
                        debug!("resent DATA packet {seq}");
                    }
                }
            }
            Policy::SelectiveRepeat => {
                for seq in self.base..self.next_seq_num {
                    if !self.acknowledged.get(&seq).copied().unwrap_or(false) {
                        if let Some(packet) = self.send_buffer.get(&seq) {
                            socket.send_to(packet, target)?;
                            debug!("resent DATA packet {seq}");
                        }
                    }
                }
            }
        }

        self.timer.start();
        Ok(())
    }

    #[cfg(test)]
    pub fn base(&self) -> u32 {
        self.base
    }

    #[cfg(test)]
    pub fn next_seq_num(&self) -> u32 {
        self.next_seq_num
    }

    #[cfg(test)]
    pub fn force_timer_expired(&mut self) {
        self.timer.started_at = Instant::now() - Duration::from_secs(10);
        self.timer.active = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::fake::FakeSocket;

    fn chunks(n: u32) -> Vec<Vec<u8>> {
        (1..=n).map(|i| vec![i as u8; 4]).collect()
    }

    #[test]
    fn window_bound_never_exceeded() {
        let mut w = SendWindow::new(Policy::GoBackN, 3, 10);
        let sock = FakeSocket::new(9000);
        let target: SocketAddr = "127.0.0.1:9001".parse().unwrap();

        w.admit(&sock, target, &chunks(10)).unwrap();
        assert!(w.next_seq_num() - w.base() <= 3);
        assert_eq!(w.next_seq_num(), 4);
    }

    #[test]
    fn gbn_cumulative_ack_advances_base_and_stops_timer() {
        let mut w = SendWindow::new(Policy::GoBackN, 4, 4);
        let sock = FakeSocket::new(9000);
        let target: SocketAddr = "127.0.0.1:9001".parse().unwrap();

        w.admit(&sock, target, &chunks(4)).unwrap();
        w.handle_ack(5);
        assert!(w.is_complete());
    }

    #[test]
    fn gbn_stale_ack_is_ignored() {
        let mut w = SendWindow::new(Policy::GoBackN, 4, 4);
        let sock = FakeSocket::new(9000);
        let target: SocketAddr = "127.0.0.1:9001".parse().unwrap();

        w.admit(&sock, target, &chunks(4)).unwrap();
        w.handle_ack(3);
        w.handle_ack(1);
        assert_eq!(w.base(), 3);
    }

    #[test]
    fn sr_out_of_order_acks_only_advance_base_on_contiguous_prefix() {
        let mut w = SendWindow::new(Policy::SelectiveRepeat, 4, 4);
        let sock = FakeSocket::new(9000);
        let target: SocketAddr = "127.0.0.1:9001".parse().unwrap();

        w.admit(&sock, target, &chunks(4)).unwrap();
        w.handle_ack(2);
        assert_eq!(w.base(), 1, "base cannot skip the still-unacked seq 1");
        w.handle_ack(1);
        assert_eq!(w.base(), 3, "base should jump past the now-contiguous 1,2");
        w.handle_ack(4);
        assert_eq!(w.base(), 3, "seq 3 is still missing");
        w.handle_ack(3);
        assert!(w.is_complete());
    }

    #[test]
    fn sr_retransmits_only_unacknowledged_packets() {
        let mut w = SendWindow::new(Policy::SelectiveRepeat, 4, 4);
        let sock = FakeSocket::new(9000);
        let target: SocketAddr = "127.0.0.1:9001".parse().unwrap();

        w.admit(&sock, target, &chunks(4)).unwrap();
        w.handle_ack(1);
        w.handle_ack(3);
        w.handle_ack(4);
        sock.sent.borrow_mut().clear();

        w.force_timer_expired();
        w.check_timer(&sock, target).unwrap();

        let resent: Vec<u32> = sock
            .sent
            .borrow()
            .iter()
            .map(|(pkt, _)| codec::decode(pkt).unwrap().0.seq_num)
            .collect();
        assert_eq!(resent, vec![2]);
    }
}
