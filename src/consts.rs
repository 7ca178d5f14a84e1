use std::time::Duration;

pub const HEADER_SIZE: usize = 16;
pub const MAX_DGRAM: usize = 1472;
pub const MAX_DATA_SIZE: usize = MAX_DGRAM - HEADER_SIZE;

pub const T_RTX: Duration = Duration::from_millis(500);
pub const T_START_WAIT: Duration = Duration::from_millis(500);
pub const T_END_WAIT: Duration = Duration::from_millis(500);

// receiver sits blocking on this between packets once a connection is bound
pub const T_RECV_IDLE: Duration = Duration::from_secs(30);
