use crate::consts::HEADER_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Start = 0,
    End = 1,
    Data = 2,
    Ack = 3,
}

impl PacketType {
    fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(PacketType::Start),
            1 => Some(PacketType::End),
            2 => Some(PacketType::Data),
            3 => Some(PacketType::Ack),
            _ => None,
        }
    }
}

// type, seq_num, length, checksum: four big-endian u32 fields, 16 bytes total
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub ty: PacketType,
    pub seq_num: u32,
    pub length: u32,
    pub checksum: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    TooShort,
    UnknownType,
    LengthMismatch,
    ChecksumMismatch,
}

fn crc32(bytes: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

pub fn encode(ty: PacketType, seq: u32, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&(ty as u32).to_be_bytes());
    buf.extend_from_slice(&seq.to_be_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(&0u32.to_be_bytes()); // checksum placeholder
    buf.extend_from_slice(payload);

    let checksum = crc32(&buf);
    buf[12..16].copy_from_slice(&checksum.to_be_bytes());
    buf
}

pub fn make_ack(seq: u32) -> Vec<u8> {
    encode(PacketType::Ack, seq, &[])
}

pub fn decode(bytes: &[u8]) -> Result<(Header, &[u8]), DecodeError> {
    if bytes.len() < HEADER_SIZE {
        return Err(DecodeError::TooShort);
    }

    let ty_raw = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
    let seq_num = u32::from_be_bytes(bytes[4..8].try_into().unwrap());
    let length = u32::from_be_bytes(bytes[8..12].try_into().unwrap());
    let checksum = u32::from_be_bytes(bytes[12..16].try_into().unwrap());

    let ty = PacketType::from_u32(ty_raw).ok_or(DecodeError::UnknownType)?;

    let end = HEADER_SIZE
        .checked_add(length as usize)
        .ok_or(DecodeError::LengthMismatch)?;
    if bytes.len() < end {
        return Err(DecodeError::LengthMismatch);
    }
    let payload = &bytes[HEADER_SIZE..end];

    let mut zeroed = bytes[..end].to_vec();
    zeroed[12..16].copy_from_slice(&0u32.to_be_bytes());
    if crc32(&zeroed) != checksum {
        return Err(DecodeError::ChecksumMismatch);
    }

    Ok((
        Header {
            ty,
            seq_num,
            length,
            checksum,
        },
        payload,
    ))
}
