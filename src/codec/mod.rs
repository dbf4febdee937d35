// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{error::ModbusError, frame::*, util::*};
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

pub mod tcp;

type Result<T> = core::result::Result<T, ModbusError>;

impl TryFrom<u8> for Exception {
    type Error = ModbusError;

    fn try_from(code: u8) -> Result<Self> {
        use crate::frame::Exception::*;
        let ex = match code {
            0x01 => IllegalFunction,
            0x02 => IllegalDataAddress,
            0x03 => IllegalDataValue,
            0x04 => ServerDeviceFailure,
            0x05 => Acknowledge,
            0x06 => ServerDeviceBusy,
            0x07 => NegativeAcknowledge,
            0x08 => MemoryParityError,
            0x0A => GatewayPathUnavailable,
            0x0B => GatewayTargetDevice,
            _ => {
                return Err(ModbusError::UnknownException(code));
            }
        };
        Ok(ex)
    }
}

impl From<ExceptionResponse> for [u8; 2] {
    fn from(ex: ExceptionResponse) -> [u8; 2] {
        let fn_code: u8 = ex.function.into();
        debug_assert!(fn_code < 0x80);
        [fn_code | 0x80, ex.exception.code()]
    }
}

impl TryFrom<&[u8]> for ExceptionResponse {
    type Error = ModbusError;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        let Some(&fn_err_code) = bytes.first() else {
            return Err(ModbusError::BadData);
        };
        if fn_err_code < 0x80 {
            return Err(ModbusError::BadData);
        }
        if bytes.len() != 2 {
            return Err(ModbusError::BadExceptionFormat);
        }
        let function = (fn_err_code & 0x7F).into();
        let exception = Exception::try_from(bytes[1])?;
        Ok(ExceptionResponse {
            function,
            exception,
        })
    }
}

impl<'r> TryFrom<&'r [u8]> for Response<'r> {
    type Error = ModbusError;

    fn try_from(bytes: &'r [u8]) -> Result<Self> {
        use crate::frame::Response::*;
        use FunctionCode as f;

        let Some(&fn_code) = bytes.first() else {
            return Err(ModbusError::BadData);
        };
        let fn_code = FunctionCode::new(fn_code);
        let Some(min_len) = min_response_pdu_len(fn_code) else {
            return Err(ModbusError::BadData);
        };
        if bytes.len() < min_len {
            return Err(ModbusError::BadData);
        }
        let rsp = match fn_code {
            f::ReadCoils | f::ReadDiscreteInputs => {
                let byte_count = bytes[1] as usize;
                if byte_count + 2 != bytes.len() {
                    return Err(ModbusError::BadData);
                }
                let data = &bytes[2..];
                // The exact requested quantity is unknown here,
                // therefore we just assume that the whole byte is meant.
                let coils = Coils {
                    quantity: byte_count * 8,
                    data,
                };
                if fn_code == f::ReadCoils {
                    ReadCoils(coils)
                } else {
                    ReadDiscreteInputs(coils)
                }
            }
            f::ReadInputRegisters | f::ReadHoldingRegisters => {
                let byte_count = bytes[1] as usize;
                if byte_count + 2 != bytes.len() || byte_count % 2 != 0 {
                    return Err(ModbusError::BadData);
                }
                let data = Data {
                    quantity: byte_count / 2,
                    data: &bytes[2..],
                };
                if fn_code == f::ReadInputRegisters {
                    ReadInputRegisters(data)
                } else {
                    ReadHoldingRegisters(data)
                }
            }
            f::WriteSingleCoil
            | f::WriteSingleRegister
            | f::WriteMultipleCoils
            | f::WriteMultipleRegisters => {
                if bytes.len() != 5 {
                    return Err(ModbusError::BadData);
                }
                let addr = BigEndian::read_u16(&bytes[1..3]);
                let payload = BigEndian::read_u16(&bytes[3..5]);
                match fn_code {
                    f::WriteSingleCoil => WriteSingleCoil(addr, u16_coil_to_bool(payload)?),
                    f::WriteSingleRegister => WriteSingleRegister(addr, payload),
                    f::WriteMultipleCoils => WriteMultipleCoils(addr, payload),
                    _ => WriteMultipleRegisters(addr, payload),
                }
            }
            f::Custom(_) => return Err(ModbusError::BadData),
        };
        Ok(rsp)
    }
}

impl<'r> TryFrom<&'r [u8]> for ResponsePdu<'r> {
    type Error = ModbusError;

    fn try_from(bytes: &'r [u8]) -> Result<Self> {
        match bytes.first() {
            Some(fn_code) if fn_code & 0x80 != 0 => {
                ExceptionResponse::try_from(bytes).map(|ex| ResponsePdu(Err(ex)))
            }
            Some(_) => Response::try_from(bytes).map(|rsp| ResponsePdu(Ok(rsp))),
            None => Err(ModbusError::BadData),
        }
    }
}

impl RequestPdu<'_> {
    /// Append the serialized PDU to `buf`.
    ///
    /// Returns the number of bytes written. Requests that exceed the
    /// per-request quantity limit are rejected with
    /// [`ModbusError::TooManyRequested`].
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<usize> {
        use crate::frame::Request::*;

        let req = self.0;
        if req.quantity() > req.max_quantity() as usize {
            return Err(ModbusError::TooManyRequested);
        }
        let start = buf.len();
        buf.reserve(req.pdu_len());
        buf.push(FunctionCode::from(req).value());
        match req {
            ReadCoils(address, quantity)
            | ReadDiscreteInputs(address, quantity)
            | ReadInputRegisters(address, quantity)
            | ReadHoldingRegisters(address, quantity) => {
                write_u16(buf, address);
                write_u16(buf, quantity);
            }
            WriteSingleCoil(address, state) => {
                write_u16(buf, address);
                write_u16(buf, bool_to_u16_coil(state));
            }
            WriteSingleRegister(address, word) => {
                write_u16(buf, address);
                write_u16(buf, word);
            }
            WriteMultipleCoils(address, coils) => {
                write_u16(buf, address);
                write_u16(buf, coils.len() as u16);
                buf.push(coils.packed_len() as u8);
                buf.extend_from_slice(&coils.data[..coils.packed_len()]);
            }
            WriteMultipleRegisters(address, words) => {
                write_u16(buf, address);
                write_u16(buf, words.len() as u16);
                buf.push((words.len() * 2) as u8);
                buf.extend_from_slice(&words.data[..words.len() * 2]);
            }
        }
        Ok(buf.len() - start)
    }
}

fn write_u16(buf: &mut Vec<u8>, value: u16) {
    // Writing into a Vec cannot fail
    let _ = buf.write_u16::<BigEndian>(value);
}

/// Check that a decoded response actually answers `req`.
///
/// On success the returned response is trimmed to the requested quantity.
pub fn verify_response<'r>(req: &Request<'_>, rsp: Response<'r>) -> Result<Response<'r>> {
    use crate::frame::{Request as Req, Response as Rsp};

    let rsp = match (*req, rsp) {
        (Req::ReadCoils(_, cnt), Rsp::ReadCoils(coils))
        | (Req::ReadDiscreteInputs(_, cnt), Rsp::ReadDiscreteInputs(coils)) => {
            if coils.payload().len() != packed_coils_len(cnt.into()) {
                return Err(ModbusError::BadData);
            }
            let coils = coils.truncate(cnt.into());
            if matches!(req, Req::ReadCoils(..)) {
                Rsp::ReadCoils(coils)
            } else {
                Rsp::ReadDiscreteInputs(coils)
            }
        }
        (Req::ReadHoldingRegisters(_, cnt), Rsp::ReadHoldingRegisters(words))
        | (Req::ReadInputRegisters(_, cnt), Rsp::ReadInputRegisters(words)) => {
            if words.len() != usize::from(cnt) {
                return Err(ModbusError::BadData);
            }
            rsp
        }
        (Req::WriteSingleCoil(addr, state), Rsp::WriteSingleCoil(rsp_addr, rsp_state))
            if addr == rsp_addr && state == rsp_state =>
        {
            rsp
        }
        (Req::WriteSingleRegister(addr, word), Rsp::WriteSingleRegister(rsp_addr, rsp_word))
            if addr == rsp_addr && word == rsp_word =>
        {
            rsp
        }
        (Req::WriteMultipleCoils(addr, coils), Rsp::WriteMultipleCoils(rsp_addr, cnt))
            if addr == rsp_addr && coils.len() == usize::from(cnt) =>
        {
            rsp
        }
        (Req::WriteMultipleRegisters(addr, words), Rsp::WriteMultipleRegisters(rsp_addr, cnt))
            if addr == rsp_addr && words.len() == usize::from(cnt) =>
        {
            rsp
        }
        _ => return Err(ModbusError::BadData),
    };
    Ok(rsp)
}

/// Minimal PDU length of a normal response, `None` for function
/// codes this client never issues.
const fn min_response_pdu_len(fn_code: FunctionCode) -> Option<usize> {
    use FunctionCode::*;
    match fn_code {
        ReadCoils | ReadDiscreteInputs | ReadInputRegisters | ReadHoldingRegisters => Some(2),
        WriteSingleCoil | WriteMultipleCoils | WriteSingleRegister | WriteMultipleRegisters => {
            Some(5)
        }
        Custom(_) => None,
    }
}
