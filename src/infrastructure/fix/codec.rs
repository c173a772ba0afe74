//! Minimal FIX 4.4 tag=value codec: enough of the wire format for the two
//! initiator sessions this engine runs, nothing more.

use std::fmt::Display;

use rust_decimal::Decimal;
use thiserror::Error;

pub const SOH: u8 = 0x01;
pub const BEGIN_STRING: &str = "FIX.4.4";

/// Standard and vendor tags used across the adapter.
pub mod tags {
    pub const BEGIN_STRING: u32 = 8;
    pub const BODY_LENGTH: u32 = 9;
    pub const CHECK_SUM: u32 = 10;
    pub const MSG_TYPE: u32 = 35;
    pub const MSG_SEQ_NUM: u32 = 34;
    pub const SENDER_COMP_ID: u32 = 49;
    pub const TARGET_COMP_ID: u32 = 56;
    pub const SENDING_TIME: u32 = 52;

    pub const ACCOUNT: u32 = 1;
    pub const CL_ORD_ID: u32 = 11;
    pub const CUM_QTY: u32 = 14;
    pub const LAST_QTY: u32 = 32;
    pub const ORDER_ID: u32 = 37;
    pub const ORDER_QTY: u32 = 38;
    pub const ORD_STATUS: u32 = 39;
    pub const ORD_TYPE: u32 = 40;
    pub const ORIG_CL_ORD_ID: u32 = 41;
    pub const PRICE: u32 = 44;
    pub const SIDE: u32 = 54;
    pub const SYMBOL: u32 = 55;
    pub const TEXT: u32 = 58;
    pub const TIME_IN_FORCE: u32 = 59;
    pub const TRANSACT_TIME: u32 = 60;
    pub const ENCRYPT_METHOD: u32 = 98;
    pub const EX_DESTINATION: u32 = 100;
    pub const ORD_REJ_REASON: u32 = 103;
    pub const HEART_BT_INT: u32 = 108;
    pub const TEST_REQ_ID: u32 = 112;
    pub const RESET_SEQ_NUM_FLAG: u32 = 141;
    pub const NO_RELATED_SYM: u32 = 146;
    pub const LEAVES_QTY: u32 = 151;
    pub const SECURITY_TYPE: u32 = 167;
    pub const SECURITY_EXCHANGE: u32 = 207;
    pub const MD_REQ_ID: u32 = 262;
    pub const SUBSCRIPTION_REQUEST_TYPE: u32 = 263;
    pub const MARKET_DEPTH: u32 = 264;
    pub const NO_MD_ENTRY_TYPES: u32 = 267;
    pub const NO_MD_ENTRIES: u32 = 268;
    pub const MD_ENTRY_TYPE: u32 = 269;
    pub const MD_ENTRY_PX: u32 = 270;
    pub const MD_ENTRY_SIZE: u32 = 271;
    pub const MD_UPDATE_ACTION: u32 = 279;
    pub const SECURITY_REQ_ID: u32 = 320;
    pub const SECURITY_REQUEST_RESULT: u32 = 560;
    pub const SECURITY_LIST_REQUEST_TYPE: u32 = 559;
    pub const USERNAME: u32 = 553;
    pub const PASSWORD: u32 = 554;
    pub const LAST_FRAGMENT: u32 = 893;
}

pub mod msg_type {
    pub const HEARTBEAT: &str = "0";
    pub const TEST_REQUEST: &str = "1";
    pub const RESEND_REQUEST: &str = "2";
    pub const REJECT: &str = "3";
    pub const SEQUENCE_RESET: &str = "4";
    pub const LOGOUT: &str = "5";
    pub const EXECUTION_REPORT: &str = "8";
    pub const ORDER_CANCEL_REJECT: &str = "9";
    pub const LOGON: &str = "A";
    pub const NEW_ORDER_SINGLE: &str = "D";
    pub const ORDER_CANCEL_REQUEST: &str = "F";
    pub const MARKET_DATA_REQUEST: &str = "V";
    pub const MARKET_DATA_SNAPSHOT: &str = "W";
    pub const MARKET_DATA_INCREMENTAL: &str = "X";
    pub const SECURITY_LIST_REQUEST: &str = "x";
    pub const SECURITY_LIST: &str = "y";
}

#[derive(Debug, Error)]
pub enum FixError {
    #[error("required field {0} not found")]
    FieldNotFound(u32),
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("checksum mismatch: message carries {carried}, computed {computed}")]
    Checksum { carried: u32, computed: u32 },
}

/// Field access shared by whole messages and repeating-group rows.
pub trait FieldMap {
    fn fields(&self) -> &[(u32, String)];

    fn get(&self, tag: u32) -> Option<&str> {
        self.fields()
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, v)| v.as_str())
    }

    fn req(&self, tag: u32) -> Result<&str, FixError> {
        self.get(tag).ok_or(FixError::FieldNotFound(tag))
    }

    fn req_decimal(&self, tag: u32) -> Result<Decimal, FixError> {
        let raw = self.req(tag)?;
        raw.parse()
            .map_err(|_| FixError::Malformed(format!("field {tag} is not a decimal: {raw}")))
    }

    fn req_int(&self, tag: u32) -> Result<i64, FixError> {
        let raw = self.req(tag)?;
        raw.parse()
            .map_err(|_| FixError::Malformed(format!("field {tag} is not an integer: {raw}")))
    }

    fn req_char(&self, tag: u32) -> Result<char, FixError> {
        let raw = self.req(tag)?;
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(FixError::Malformed(format!(
                "field {tag} is not a single character: {raw}"
            ))),
        }
    }
}

/// One application or admin message. Header bookkeeping fields (8, 9, 10)
/// never appear here; they are produced on encode and stripped on decode.
#[derive(Clone, Debug)]
pub struct FixMessage {
    msg_type: String,
    fields: Vec<(u32, String)>,
}

impl FieldMap for FixMessage {
    fn fields(&self) -> &[(u32, String)] {
        &self.fields
    }
}

impl FixMessage {
    pub fn new(msg_type: &str) -> Self {
        Self {
            msg_type: msg_type.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn msg_type(&self) -> &str {
        &self.msg_type
    }

    /// Append a field; fields keep insertion order on the wire.
    pub fn set(&mut self, tag: u32, value: impl Display) -> &mut Self {
        self.fields.push((tag, value.to_string()));
        self
    }

    /// Rows of the repeating group counted by `count_tag`. A row starts at
    /// `delim_tag`; any tag outside `member_tags` ends the group. The count
    /// field is trusted only as a cross-check.
    pub fn groups(
        &self,
        count_tag: u32,
        delim_tag: u32,
        member_tags: &[u32],
    ) -> Result<Vec<FixGroup>, FixError> {
        let declared = self.req_int(count_tag)? as usize;
        let start = self
            .fields
            .iter()
            .position(|(t, _)| *t == count_tag)
            .ok_or(FixError::FieldNotFound(count_tag))?;
        let mut rows: Vec<FixGroup> = Vec::new();
        for (tag, value) in &self.fields[start + 1..] {
            if *tag == delim_tag {
                rows.push(FixGroup { fields: Vec::new() });
            } else if rows.is_empty() || !member_tags.contains(tag) {
                break;
            }
            match rows.last_mut() {
                Some(row) => row.fields.push((*tag, value.clone())),
                None => {
                    return Err(FixError::Malformed(format!(
                        "group {count_tag} does not start with delimiter {delim_tag}"
                    )))
                }
            }
        }
        if rows.len() != declared {
            return Err(FixError::Malformed(format!(
                "group {count_tag} declares {declared} rows, found {}",
                rows.len()
            )));
        }
        Ok(rows)
    }

    /// Serialize with session-level header fields filled in.
    pub fn encode(
        &self,
        seq_num: u64,
        sender_comp_id: &str,
        target_comp_id: &str,
        sending_time: &str,
    ) -> Vec<u8> {
        let mut body = Vec::with_capacity(128);
        push_field(&mut body, tags::MSG_TYPE, &self.msg_type);
        push_field(&mut body, tags::MSG_SEQ_NUM, &seq_num.to_string());
        push_field(&mut body, tags::SENDER_COMP_ID, sender_comp_id);
        push_field(&mut body, tags::TARGET_COMP_ID, target_comp_id);
        push_field(&mut body, tags::SENDING_TIME, sending_time);
        for (tag, value) in &self.fields {
            push_field(&mut body, *tag, value);
        }
        let mut wire = Vec::with_capacity(body.len() + 32);
        push_field(&mut wire, tags::BEGIN_STRING, BEGIN_STRING);
        push_field(&mut wire, tags::BODY_LENGTH, &body.len().to_string());
        wire.extend_from_slice(&body);
        let checksum: u32 = wire.iter().map(|b| *b as u32).sum::<u32>() % 256;
        push_field(&mut wire, tags::CHECK_SUM, &format!("{checksum:03}"));
        wire
    }

    /// Parse one complete framed message, verifying the checksum.
    pub fn decode(frame: &[u8]) -> Result<Self, FixError> {
        let mut msg_type: Option<String> = None;
        let mut fields: Vec<(u32, String)> = Vec::new();
        let mut carried_checksum: Option<u32> = None;
        let mut checksum_start = frame.len();
        for raw in frame.split(|b| *b == SOH) {
            if raw.is_empty() {
                continue;
            }
            let text = std::str::from_utf8(raw)
                .map_err(|_| FixError::Malformed("non-utf8 field".to_string()))?;
            let (tag, value) = text
                .split_once('=')
                .ok_or_else(|| FixError::Malformed(format!("field without '=': {text}")))?;
            let tag: u32 = tag
                .parse()
                .map_err(|_| FixError::Malformed(format!("bad tag: {text}")))?;
            match tag {
                tags::BEGIN_STRING | tags::BODY_LENGTH => {}
                tags::CHECK_SUM => {
                    carried_checksum = Some(value.parse().map_err(|_| {
                        FixError::Malformed(format!("bad checksum field: {value}"))
                    })?);
                    // Everything before "10=" participates in the sum.
                    checksum_start = frame.len() - raw.len() - 1;
                }
                tags::MSG_TYPE => msg_type = Some(value.to_string()),
                _ => fields.push((tag, value.to_string())),
            }
        }
        let carried =
            carried_checksum.ok_or(FixError::FieldNotFound(tags::CHECK_SUM))?;
        let computed: u32 = frame[..checksum_start]
            .iter()
            .map(|b| *b as u32)
            .sum::<u32>()
            % 256;
        if carried != computed {
            return Err(FixError::Checksum { carried, computed });
        }
        let msg_type = msg_type.ok_or(FixError::FieldNotFound(tags::MSG_TYPE))?;
        Ok(Self { msg_type, fields })
    }
}

fn push_field(out: &mut Vec<u8>, tag: u32, value: &str) {
    out.extend_from_slice(tag.to_string().as_bytes());
    out.push(b'=');
    out.extend_from_slice(value.as_bytes());
    out.push(SOH);
}

/// One row of a repeating group.
#[derive(Clone, Debug)]
pub struct FixGroup {
    fields: Vec<(u32, String)>,
}

impl FieldMap for FixGroup {
    fn fields(&self) -> &[(u32, String)] {
        &self.fields
    }
}

/// Split one complete message off the front of `buf`, if present. Returns
/// the frame including the checksum trailer. Garbage before the next
/// `8=FIX` marker is dropped.
pub fn extract_frame(buf: &mut Vec<u8>) -> Option<Vec<u8>> {
    const MARKER: &[u8] = b"8=FIX";
    let start = buf
        .windows(MARKER.len())
        .position(|window| window == MARKER)?;
    if start > 0 {
        buf.drain(..start);
    }
    // 8=FIX.4.4|9=NNN|...body...|10=NNN|
    let length_field_start = buf.iter().position(|b| *b == SOH)? + 1;
    let rest = &buf[length_field_start..];
    if !rest.starts_with(b"9=") {
        return None;
    }
    let length_end = rest.iter().position(|b| *b == SOH)?;
    let body_len: usize = std::str::from_utf8(&rest[2..length_end])
        .ok()?
        .parse()
        .ok()?;
    // trailer: "10=" + 3 digits + SOH
    let total = length_field_start + length_end + 1 + body_len + 7;
    if buf.len() < total {
        return None;
    }
    let frame: Vec<u8> = buf.drain(..total).collect();
    Some(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn encode_sample() -> Vec<u8> {
        let mut message = FixMessage::new(msg_type::NEW_ORDER_SINGLE);
        message
            .set(tags::CL_ORD_ID, "1")
            .set(tags::SIDE, '1')
            .set(tags::ORDER_QTY, dec!(0.01))
            .set(tags::PRICE, dec!(110.00))
            .set(tags::SYMBOL, "BTC/USDT");
        message.encode(5, "CLIENT", "XTRD", "20240102-10:11:12.000")
    }

    #[test]
    fn encode_then_decode_preserves_fields() {
        let wire = encode_sample();
        let decoded = FixMessage::decode(&wire).unwrap();
        assert_eq!(decoded.msg_type(), msg_type::NEW_ORDER_SINGLE);
        assert_eq!(decoded.req(tags::CL_ORD_ID).unwrap(), "1");
        assert_eq!(decoded.req_decimal(tags::PRICE).unwrap(), dec!(110.00));
        assert_eq!(decoded.req_int(tags::MSG_SEQ_NUM).unwrap(), 5);
        assert_eq!(decoded.req_char(tags::SIDE).unwrap(), '1');
    }

    #[test]
    fn body_length_and_checksum_are_wire_correct() {
        let wire = encode_sample();
        let text = String::from_utf8(wire.clone()).unwrap();
        // Body runs from after "9=NNN<SOH>" to before "10=".
        let after_length = text.find("\u{1}9=").unwrap();
        let body_start = text[after_length + 1..].find('\u{1}').unwrap() + after_length + 2;
        let trailer = text.rfind("10=").unwrap();
        let declared: usize = text
            .split('\u{1}')
            .find(|f| f.starts_with("9="))
            .unwrap()[2..]
            .parse()
            .unwrap();
        assert_eq!(declared, trailer - body_start);
        let computed: u32 = wire[..trailer].iter().map(|b| *b as u32).sum::<u32>() % 256;
        assert!(text[trailer..].starts_with(&format!("10={computed:03}")));
    }

    #[test]
    fn corrupted_frame_fails_the_checksum() {
        let mut wire = encode_sample();
        let position = wire.iter().position(|b| *b == b'B').unwrap();
        wire[position] = b'E';
        match FixMessage::decode(&wire) {
            Err(FixError::Checksum { .. }) => {}
            other => panic!("expected checksum error, got {other:?}"),
        }
    }

    #[test]
    fn missing_required_field_is_reported_by_tag() {
        let wire = encode_sample();
        let decoded = FixMessage::decode(&wire).unwrap();
        match decoded.req(tags::ACCOUNT) {
            Err(FixError::FieldNotFound(tag)) => assert_eq!(tag, tags::ACCOUNT),
            other => panic!("expected missing field, got {other:?}"),
        }
    }

    #[test]
    fn repeating_groups_split_into_rows() {
        let mut message = FixMessage::new(msg_type::MARKET_DATA_INCREMENTAL);
        message
            .set(tags::SYMBOL, "BTC/USDT")
            .set(tags::NO_MD_ENTRIES, 2)
            .set(tags::MD_ENTRY_TYPE, '0')
            .set(tags::MD_UPDATE_ACTION, '0')
            .set(tags::MD_ENTRY_PX, "100")
            .set(tags::MD_ENTRY_SIZE, "1")
            .set(tags::MD_ENTRY_TYPE, '1')
            .set(tags::MD_UPDATE_ACTION, '2')
            .set(tags::MD_ENTRY_PX, "101");
        let wire = message.encode(2, "A", "B", "20240102-10:11:12.000");
        let decoded = FixMessage::decode(&wire).unwrap();
        let rows = decoded
            .groups(
                tags::NO_MD_ENTRIES,
                tags::MD_ENTRY_TYPE,
                &[
                    tags::MD_UPDATE_ACTION,
                    tags::MD_ENTRY_PX,
                    tags::MD_ENTRY_SIZE,
                ],
            )
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].req(tags::MD_ENTRY_PX).unwrap(), "100");
        assert_eq!(rows[1].req_char(tags::MD_UPDATE_ACTION).unwrap(), '2');
        assert!(rows[1].get(tags::MD_ENTRY_SIZE).is_none());
    }

    #[test]
    fn group_row_count_mismatch_is_malformed() {
        let mut message = FixMessage::new(msg_type::MARKET_DATA_INCREMENTAL);
        message
            .set(tags::NO_MD_ENTRIES, 3)
            .set(tags::MD_ENTRY_TYPE, '0')
            .set(tags::MD_ENTRY_PX, "100");
        let wire = message.encode(2, "A", "B", "20240102-10:11:12.000");
        let decoded = FixMessage::decode(&wire).unwrap();
        let result = decoded.groups(tags::NO_MD_ENTRIES, tags::MD_ENTRY_TYPE, &[tags::MD_ENTRY_PX]);
        assert!(matches!(result, Err(FixError::Malformed(_))));
    }

    #[test]
    fn extract_frame_handles_partial_and_concatenated_input() {
        let first = encode_sample();
        let second = encode_sample();
        let mut buf = Vec::new();
        buf.extend_from_slice(&first[..10]);
        assert!(extract_frame(&mut buf).is_none());
        buf.extend_from_slice(&first[10..]);
        buf.extend_from_slice(&second);
        assert_eq!(extract_frame(&mut buf).as_deref(), Some(&first[..]));
        assert_eq!(extract_frame(&mut buf).as_deref(), Some(&second[..]));
        assert!(extract_frame(&mut buf).is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn extract_frame_drops_leading_garbage() {
        let frame = encode_sample();
        let mut buf = b"noise".to_vec();
        buf.extend_from_slice(&frame);
        assert_eq!(extract_frame(&mut buf).as_deref(), Some(&frame[..]));
    }
}
