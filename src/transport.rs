use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

// lets the window and receiver state machines run against an in-memory fake in tests,
// while the binaries drive them with std::net::UdpSocket
pub trait DatagramSocket {
    fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize>;

    // WouldBlock on a non-blocking socket with nothing pending is expected, not a failure
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;

    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()>;

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;
}

impl DatagramSocket for UdpSocket {
    fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, buf, target)
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf)
    }

    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        UdpSocket::set_nonblocking(self, nonblocking)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        UdpSocket::set_read_timeout(self, timeout)
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::net::Ipv4Addr;

    #[derive(Debug)]
    pub struct FakeSocket {
        pub local_addr: SocketAddr,
        pub inbox: RefCell<VecDeque<(Vec<u8>, SocketAddr)>>,
        pub sent: RefCell<Vec<(Vec<u8>, SocketAddr)>>,
    }

    impl FakeSocket {
        pub fn new(port: u16) -> Self {
            FakeSocket {
                local_addr: SocketAddr::new(Ipv4Addr::LOCALHOST.into(), port),
                inbox: RefCell::new(VecDeque::new()),
                sent: RefCell::new(Vec::new()),
            }
        }

        pub fn deliver(&self, datagram: Vec<u8>, from: SocketAddr) {
            self.inbox.borrow_mut().push_back((datagram, from));
        }
    }

    impl DatagramSocket for FakeSocket {
        fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
            self.sent.borrow_mut().push((buf.to_vec(), target));
            Ok(buf.len())
        }

        fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
            match self.inbox.borrow_mut().pop_front() {
                Some((datagram, from)) => {
                    let n = datagram.len().min(buf.len());
                    buf[..n].copy_from_slice(&datagram[..n]);
                    Ok((n, from))
                }
                None => Err(io::Error::from(io::ErrorKind::WouldBlock)),
            }
        }

        fn set_nonblocking(&self, _nonblocking: bool) -> io::Result<()> {
            Ok(())
        }

        fn set_read_timeout(&self, _timeout: Option<Duration>) -> io::Result<()> {
            Ok(())
        }
    }
}
