//! SNMPv1 message encoding and decoding
//!
//! Only the subset of BER that SNMPv1 Get/Set traffic needs: definite
//! lengths, INTEGER, OCTET STRING, NULL, OBJECT IDENTIFIER, SEQUENCE and the
//! three unsigned application types.

use relaybank_core::{Oid, RelayError, Result};

pub const SNMP_VERSION_1: i64 = 0;

const TAG_INTEGER: u8 = 0x02;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_NULL: u8 = 0x05;
const TAG_OID: u8 = 0x06;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_COUNTER32: u8 = 0x41;
const TAG_GAUGE32: u8 = 0x42;
const TAG_TIMETICKS: u8 = 0x43;

/// SNMPv1 PDU types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduType {
    GetRequest,
    GetNextRequest,
    GetResponse,
    SetRequest,
}

impl PduType {
    pub fn tag(self) -> u8 {
        match self {
            PduType::GetRequest => 0xA0,
            PduType::GetNextRequest => 0xA1,
            PduType::GetResponse => 0xA2,
            PduType::SetRequest => 0xA3,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0xA0 => Ok(PduType::GetRequest),
            0xA1 => Ok(PduType::GetNextRequest),
            0xA2 => Ok(PduType::GetResponse),
            0xA3 => Ok(PduType::SetRequest),
            other => Err(RelayError::Parse(format!(
                "Unsupported PDU type 0x{:02X}",
                other
            ))),
        }
    }
}

/// Human-readable name for an SNMPv1 error-status
pub fn error_status_name(status: i64) -> &'static str {
    match status {
        0 => "noError",
        1 => "tooBig",
        2 => "noSuchName",
        3 => "badValue",
        4 => "readOnly",
        5 => "genErr",
        _ => "unknown",
    }
}

/// Variable binding value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i64),
    OctetString(Vec<u8>),
    Null,
    ObjectId(Oid),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    /// Anything else, kept raw
    Other { tag: u8, data: Vec<u8> },
}

impl Value {
    /// Numeric value for INTEGER and the unsigned application types
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Value::Integer(v) => push_tlv(out, TAG_INTEGER, &encode_integer(*v)),
            Value::OctetString(bytes) => push_tlv(out, TAG_OCTET_STRING, bytes),
            Value::Null => push_tlv(out, TAG_NULL, &[]),
            Value::ObjectId(oid) => push_tlv(out, TAG_OID, &encode_oid(oid)),
            Value::Counter32(v) => push_tlv(out, TAG_COUNTER32, &encode_integer(i64::from(*v))),
            Value::Gauge32(v) => push_tlv(out, TAG_GAUGE32, &encode_integer(i64::from(*v))),
            Value::TimeTicks(v) => push_tlv(out, TAG_TIMETICKS, &encode_integer(i64::from(*v))),
            Value::Other { tag, data } => push_tlv(out, *tag, data),
        }
    }

    fn decode(tag: u8, content: &[u8]) -> Result<Self> {
        Ok(match tag {
            TAG_INTEGER => Value::Integer(decode_integer(content)?),
            TAG_OCTET_STRING => Value::OctetString(content.to_vec()),
            TAG_NULL => Value::Null,
            TAG_OID => Value::ObjectId(decode_oid(content)?),
            TAG_COUNTER32 => Value::Counter32(decode_unsigned(content)?),
            TAG_GAUGE32 => Value::Gauge32(decode_unsigned(content)?),
            TAG_TIMETICKS => Value::TimeTicks(decode_unsigned(content)?),
            other => Value::Other {
                tag: other,
                data: content.to_vec(),
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarBind {
    pub oid: Oid,
    pub value: Value,
}

impl VarBind {
    /// Binding with a NULL value, as sent in a GetRequest
    pub fn null(oid: Oid) -> Self {
        Self {
            oid,
            value: Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    pub pdu_type: PduType,
    pub request_id: i32,
    pub error_status: i64,
    pub error_index: i64,
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    pub fn request(pdu_type: PduType, request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }
}

/// A complete SNMPv1 message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub version: i64,
    pub community: Vec<u8>,
    pub pdu: Pdu,
}

impl Message {
    pub fn encode(&self) -> Vec<u8> {
        let mut varbinds = Vec::new();
        for binding in &self.pdu.varbinds {
            let mut inner = Vec::new();
            push_tlv(&mut inner, TAG_OID, &encode_oid(&binding.oid));
            binding.value.encode_into(&mut inner);
            push_tlv(&mut varbinds, TAG_SEQUENCE, &inner);
        }

        let mut pdu = Vec::new();
        push_tlv(&mut pdu, TAG_INTEGER, &encode_integer(i64::from(self.pdu.request_id)));
        push_tlv(&mut pdu, TAG_INTEGER, &encode_integer(self.pdu.error_status));
        push_tlv(&mut pdu, TAG_INTEGER, &encode_integer(self.pdu.error_index));
        push_tlv(&mut pdu, TAG_SEQUENCE, &varbinds);

        let mut body = Vec::new();
        push_tlv(&mut body, TAG_INTEGER, &encode_integer(self.version));
        push_tlv(&mut body, TAG_OCTET_STRING, &self.community);
        push_tlv(&mut body, self.pdu.pdu_type.tag(), &pdu);

        let mut out = Vec::with_capacity(body.len() + 4);
        push_tlv(&mut out, TAG_SEQUENCE, &body);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut outer = BerReader::new(buf);
        let body = outer.expect(TAG_SEQUENCE, "message")?;
        if !outer.is_empty() {
            return Err(RelayError::Parse(format!(
                "{} trailing bytes after SNMP message",
                outer.remaining()
            )));
        }

        let mut reader = BerReader::new(body);
        let version = reader.read_integer()?;
        let community = reader.expect(TAG_OCTET_STRING, "community")?.to_vec();
        let (tag, pdu_body) = reader.read_tlv()?;
        let pdu_type = PduType::from_tag(tag)?;

        let mut pdu = BerReader::new(pdu_body);
        let request_id = i32::try_from(pdu.read_integer()?)
            .map_err(|_| RelayError::Parse("request-id out of range".to_string()))?;
        let error_status = pdu.read_integer()?;
        let error_index = pdu.read_integer()?;

        let mut list = BerReader::new(pdu.expect(TAG_SEQUENCE, "varbind list")?);
        let mut varbinds = Vec::new();
        while !list.is_empty() {
            let mut binding = BerReader::new(list.expect(TAG_SEQUENCE, "varbind")?);
            let oid = decode_oid(binding.expect(TAG_OID, "OBJECT IDENTIFIER")?)?;
            let (tag, content) = binding.read_tlv()?;
            varbinds.push(VarBind {
                oid,
                value: Value::decode(tag, content)?,
            });
        }

        Ok(Self {
            version,
            community,
            pdu: Pdu {
                pdu_type,
                request_id,
                error_status,
                error_index,
                varbinds,
            },
        })
    }
}

fn push_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    out.push(0x80 | (bytes.len() - skip) as u8);
    out.extend_from_slice(&bytes[skip..]);
}

fn push_tlv(out: &mut Vec<u8>, tag: u8, content: &[u8]) {
    out.push(tag);
    push_length(out, content.len());
    out.extend_from_slice(content);
}

/// Minimal two's complement big-endian encoding
pub fn encode_integer(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let (head, next) = (bytes[start], bytes[start + 1]);
        let redundant =
            (head == 0x00 && next & 0x80 == 0) || (head == 0xFF && next & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

fn decode_integer(content: &[u8]) -> Result<i64> {
    if content.is_empty() || content.len() > 8 {
        return Err(RelayError::Parse(format!(
            "Invalid INTEGER length {}",
            content.len()
        )));
    }
    let mut value: i64 = if content[0] & 0x80 != 0 { -1 } else { 0 };
    for byte in content {
        value = (value << 8) | i64::from(*byte);
    }
    Ok(value)
}

fn decode_unsigned(content: &[u8]) -> Result<u32> {
    if content.is_empty() || content.len() > 5 {
        return Err(RelayError::Parse(format!(
            "Invalid unsigned length {}",
            content.len()
        )));
    }
    let value = content
        .iter()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte));
    u32::try_from(value).map_err(|_| RelayError::Parse(format!("Unsigned value {} too large", value)))
}

fn push_base128(out: &mut Vec<u8>, mut value: u64) {
    let mut tmp = [0u8; 10];
    let mut i = tmp.len();
    loop {
        i -= 1;
        tmp[i] = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            break;
        }
    }
    let last = tmp.len() - 1;
    for byte in &mut tmp[i..last] {
        *byte |= 0x80;
    }
    out.extend_from_slice(&tmp[i..]);
}

pub fn encode_oid(oid: &Oid) -> Vec<u8> {
    let arcs = oid.arcs();
    let mut out = Vec::with_capacity(arcs.len() + 4);
    push_base128(&mut out, u64::from(arcs[0]) * 40 + u64::from(arcs[1]));
    for arc in &arcs[2..] {
        push_base128(&mut out, u64::from(*arc));
    }
    out
}

fn decode_oid(content: &[u8]) -> Result<Oid> {
    let mut values = Vec::new();
    let mut current: u64 = 0;
    for (i, byte) in content.iter().enumerate() {
        current = (current << 7) | u64::from(byte & 0x7F);
        if current > u64::from(u32::MAX) * 40 + 80 {
            return Err(RelayError::Parse("OID arc overflow".to_string()));
        }
        if byte & 0x80 == 0 {
            values.push(current);
            current = 0;
        } else if i == content.len() - 1 {
            return Err(RelayError::Parse("Truncated OID arc".to_string()));
        }
    }

    let Some((&first, rest)) = values.split_first() else {
        return Err(RelayError::Parse("Empty OBJECT IDENTIFIER".to_string()));
    };
    let (a, b) = if first < 80 {
        (first / 40, first % 40)
    } else {
        (2, first - 80)
    };

    let mut arcs = Vec::with_capacity(values.len() + 1);
    for value in std::iter::once(a).chain(std::iter::once(b)).chain(rest.iter().copied()) {
        arcs.push(
            u32::try_from(value).map_err(|_| RelayError::Parse("OID arc overflow".to_string()))?,
        );
    }
    Oid::new(arcs)
}

struct BerReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BerReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| RelayError::Parse("Truncated BER element".to_string()))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_tlv(&mut self) -> Result<(u8, &'a [u8])> {
        let tag = self.take(1)?[0];
        let first = self.take(1)?[0];
        let len = if first & 0x80 == 0 {
            usize::from(first)
        } else {
            let n = usize::from(first & 0x7F);
            if n == 0 || n > 4 {
                return Err(RelayError::Parse(format!(
                    "Unsupported BER length form 0x{:02X}",
                    first
                )));
            }
            self.take(n)?
                .iter()
                .fold(0usize, |acc, byte| (acc << 8) | usize::from(*byte))
        };
        Ok((tag, self.take(len)?))
    }

    fn expect(&mut self, tag: u8, what: &str) -> Result<&'a [u8]> {
        let (found, content) = self.read_tlv()?;
        if found != tag {
            return Err(RelayError::Parse(format!(
                "Expected {} (tag 0x{:02X}), found tag 0x{:02X}",
                what, tag, found
            )));
        }
        Ok(content)
    }

    fn read_integer(&mut self) -> Result<i64> {
        decode_integer(self.expect(TAG_INTEGER, "INTEGER")?)
    }
}
