//! A reliable byte-stream transport layered over UDP, with interchangeable Go-Back-N
//! and Selective Repeat recovery policies.
//!
//! The wire protocol, sliding-window engine and receiver state machine live here;
//! argument parsing and the choice of byte source/sink belong to the `rtp-sender` and
//! `rtp-receiver` binaries.

pub mod codec;
pub mod consts;
pub mod err;
pub mod logging;
pub mod policy;
pub mod receiver;
pub mod reorder;
pub mod sender;
pub mod transport;
pub mod window;

pub use err::Error;
pub use policy::Policy;
