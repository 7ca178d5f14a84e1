use std::collections::BTreeMap;
use std::io::{self, Write};

use log::debug;

// Holds payloads for expected < seq < expected + window; expected itself goes straight
// to the sink rather than through here.
#[derive(Debug, Default)]
pub struct ReorderBuffer {
    pending: BTreeMap<u32, Vec<u8>>,
}

impl ReorderBuffer {
    pub fn new() -> Self {
        ReorderBuffer {
            pending: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn contains(&self, seq: u32) -> bool {
        self.pending.contains_key(&seq)
    }

    pub fn insert(&mut self, seq: u32, payload: Vec<u8>) {
        self.pending.entry(seq).or_insert(payload);
    }

    pub fn drain_from(&mut self, mut expected_seq_num: u32, sink: &mut dyn Write) -> io::Result<u32> {
        while let Some(payload) = self.pending.remove(&expected_seq_num) {
            sink.write_all(&payload)?;
            sink.flush()?;
            debug!("drained buffered packet {expected_seq_num} from reorder buffer");
            expected_seq_num += 1;
        }
        Ok(expected_seq_num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reordered_pair_drains_in_order() {
        let mut buf = ReorderBuffer::new();
        let mut sink = Vec::new();

        // seq 2 arrives before seq 1: buffered, nothing drains yet.
        buf.insert(2, b"two".to_vec());
        let expected = buf.drain_from(1, &mut sink).unwrap();
        assert_eq!(expected, 1);
        assert!(sink.is_empty());

        // seq 1 then arrives and is delivered directly by the caller; draining from 2
        // should now flush the buffered seq 2.
        let expected = buf.drain_from(2, &mut sink).unwrap();
        assert_eq!(expected, 3);
        assert_eq!(sink, b"two");
        assert!(buf.is_empty());
    }

    #[test]
    fn duplicate_insert_keeps_first_copy() {
        let mut buf = ReorderBuffer::new();
        buf.insert(5, b"first".to_vec());
        buf.insert(5, b"second".to_vec());
        assert_eq!(buf.len(), 1);
    }
}
