// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP client (master) specific functions.
use super::*;

/// Encode an TCP request.
///
/// The frame is appended to `buf`, the number of written bytes is returned.
pub fn encode_request(adu: RequestAdu, buf: &mut Vec<u8>) -> Result<usize> {
    let RequestAdu { hdr, pdu } = adu;
    let start = buf.len();
    buf.extend_from_slice(&hdr.transaction_id.to_be_bytes());
    buf.extend_from_slice(&PROTOCOL_ID.to_be_bytes());
    // Length is patched once the PDU is written
    buf.extend_from_slice(&[0, 0]);
    buf.push(hdr.unit_id);
    let len = match pdu.encode(buf) {
        Ok(len) => len,
        Err(err) => {
            buf.truncate(start);
            return Err(err);
        }
    };
    BigEndian::write_u16(&mut buf[start + 4..start + 6], 1 + len as u16);
    Ok(len + MBAP_HEADER_LEN)
}

/// Decode an TCP response.
pub fn decode_response(buf: &[u8]) -> Result<Option<(ResponseAdu<'_>, FrameLocation)>> {
    let Some((frame, location)) = decode(buf)? else {
        return Ok(None);
    };
    let hdr = frame.header();
    ResponsePdu::try_from(frame.pdu)
        .map(|pdu| Some((ResponseAdu { hdr, pdu }, location)))
        .inspect_err(|&err| {
            log::error!("Failed to decode response PDU: {err}");
        })
}
