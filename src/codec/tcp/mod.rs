//! Modbus TCP

use super::*;

pub mod client;
pub use crate::frame::tcp::*;

/// Size of the MBAP header.
pub const MBAP_HEADER_LEN: usize = 7;

/// Maximum size of a PDU.
pub const MAX_PDU_LEN: usize = 253;

// [MODBUS MESSAGING ON TCP/IP IMPLEMENTATION GUIDE V1.0b](http://modbus.org/docs/Modbus_Messaging_Implementation_Guide_V1_0b.pdf), page 18
// "a MODBUS request needs a maximum of 256 bytes + the MBAP header size"
pub const MAX_FRAME_LEN: usize = MBAP_HEADER_LEN + MAX_PDU_LEN;

const PROTOCOL_ID: u16 = 0;

/// An extracted TCP PDU frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame<'a> {
    pub transaction_id: TransactionId,
    pub unit_id: UnitId,
    pub pdu: &'a [u8],
}

impl DecodedFrame<'_> {
    #[must_use]
    pub const fn header(&self) -> Header {
        Header {
            transaction_id: self.transaction_id,
            unit_id: self.unit_id,
        }
    }
}

/// Decode the MBAP header of the first TCP frame of a buffer.
///
/// The frame is delimited by the length field only, its PDU is not
/// inspected. Returns `Ok(None)` as long as the frame is incomplete.
pub fn decode_header(buf: &[u8]) -> Result<Option<(Header, FrameLocation)>> {
    if buf.len() < MBAP_HEADER_LEN {
        return Ok(None);
    }
    let transaction_id = BigEndian::read_u16(&buf[0..2]);
    let protocol_id = BigEndian::read_u16(&buf[2..4]);
    let length = BigEndian::read_u16(&buf[4..6]) as usize;
    let unit_id = buf[6];
    if protocol_id != PROTOCOL_ID {
        log::warn!("Protocol not Modbus({PROTOCOL_ID}), received {protocol_id} instead");
        return Err(ModbusError::BadData);
    }
    // The length field covers the unit id and the PDU
    if !(2..=MAX_PDU_LEN + 1).contains(&length) {
        log::warn!("Invalid length field: {length}");
        return Err(ModbusError::BadData);
    }
    let size = MBAP_HEADER_LEN - 1 + length;
    if buf.len() < size {
        // Incomplete frame
        return Ok(None);
    }
    let hdr = Header {
        transaction_id,
        unit_id,
    };
    Ok(Some((hdr, FrameLocation { start: 0, size })))
}

/// Check the PDU length against the one implied by its function code.
pub fn check_pdu_len(pdu: &[u8]) -> Result<()> {
    let Some(expected) = response_pdu_len(pdu) else {
        // Leave undefined function codes to the PDU decoder
        return Ok(());
    };
    if expected == pdu.len() {
        return Ok(());
    }
    log::warn!(
        "Length mismatch: length field: {}, PDU len + 1: {}",
        pdu.len() + 1,
        expected + 1
    );
    Err(if pdu[0] & 0x80 != 0 {
        ModbusError::BadExceptionFormat
    } else {
        ModbusError::BadData
    })
}

/// Decode the first TCP frame of a buffer.
///
/// Returns `Ok(None)` as long as the frame is incomplete.
pub fn decode(buf: &[u8]) -> Result<Option<(DecodedFrame<'_>, FrameLocation)>> {
    let Some((hdr, location)) = decode_header(buf)? else {
        return Ok(None);
    };
    let pdu = &buf[MBAP_HEADER_LEN..location.end()];
    check_pdu_len(pdu)?;
    Ok(Some((
        DecodedFrame {
            transaction_id: hdr.transaction_id,
            unit_id: hdr.unit_id,
            pdu,
        },
        location,
    )))
}

/// The PDU length implied by the function code (and byte count) of a response.
#[must_use]
pub fn response_pdu_len(pdu: &[u8]) -> Option<usize> {
    let fn_code = *pdu.first()?;
    let len = match fn_code {
        0x01..=0x04 => 2 + *pdu.get(1)? as usize,
        0x05 | 0x06 | 0x0F | 0x10 => 5,
        0x81..=0xFF => 2,
        _ => return None,
    };
    Some(len)
}
