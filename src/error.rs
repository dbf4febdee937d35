// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{borrow::Cow, fmt, io};

use crate::frame::Exception;

/// Base of the numeric error code space.
///
/// Server exceptions occupy `ERROR_CODE_BASE + 1 ..= ERROR_CODE_BASE + 11`,
/// locally detected failures follow right after.
pub const ERROR_CODE_BASE: i32 = 112_345_678;

const BAD_CRC: i32 = ERROR_CODE_BASE + 12;
const BAD_DATA: i32 = ERROR_CODE_BASE + 13;
const BAD_EXCEPTION_FORMAT: i32 = ERROR_CODE_BASE + 14;
const UNKNOWN_EXCEPTION: i32 = ERROR_CODE_BASE + 15;
const TOO_MANY_REQUESTED: i32 = ERROR_CODE_BASE + 16;
const BAD_SLAVE_ID: i32 = ERROR_CODE_BASE + 17;

/// Messages keyed by numeric error code.
static MESSAGES: &[(i32, &str)] = &[
    (ERROR_CODE_BASE + 0x01, "Illegal function"),
    (ERROR_CODE_BASE + 0x02, "Illegal data address"),
    (ERROR_CODE_BASE + 0x03, "Illegal data value"),
    (ERROR_CODE_BASE + 0x04, "Slave device or server failure"),
    (ERROR_CODE_BASE + 0x05, "Acknowledge"),
    (ERROR_CODE_BASE + 0x06, "Slave device or server is busy"),
    (ERROR_CODE_BASE + 0x07, "Negative acknowledge"),
    (ERROR_CODE_BASE + 0x08, "Memory parity error"),
    (ERROR_CODE_BASE + 0x0A, "Gateway path unavailable"),
    (ERROR_CODE_BASE + 0x0B, "Target device failed to respond"),
    (BAD_CRC, "Invalid CRC"),
    (BAD_DATA, "Invalid data"),
    (BAD_EXCEPTION_FORMAT, "Invalid exception code"),
    (UNKNOWN_EXCEPTION, "Unknown exception code"),
    (TOO_MANY_REQUESTED, "Too many data"),
    (BAD_SLAVE_ID, "Response not from requested slave"),
];

/// Modbus level error.
///
/// Either an exception reported by the server or a malformed
/// response detected locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModbusError {
    /// The server rejected the request.
    Exception(Exception),
    /// Invalid CRC
    BadCrc,
    /// The response is inconsistent (length, byte count, echo, protocol id).
    BadData,
    /// An exception response without exactly one exception code byte.
    BadExceptionFormat,
    /// An exception response carrying an undefined exception code.
    UnknownException(u8),
    /// The requested quantity exceeds the per-request limit.
    TooManyRequested,
    /// The response was sent by another unit.
    BadSlaveId,
    /// A code outside of the known error space.
    Unknown(i32),
}

impl ModbusError {
    /// Map a numeric error code back to its variant.
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        match code {
            BAD_CRC => Self::BadCrc,
            BAD_DATA => Self::BadData,
            BAD_EXCEPTION_FORMAT => Self::BadExceptionFormat,
            UNKNOWN_EXCEPTION => Self::UnknownException(0),
            TOO_MANY_REQUESTED => Self::TooManyRequested,
            BAD_SLAVE_ID => Self::BadSlaveId,
            code => u8::try_from(code - ERROR_CODE_BASE)
                .ok()
                .and_then(|ex| Exception::try_from(ex).ok())
                .map_or(Self::Unknown(code), Self::Exception),
        }
    }

    /// The stable numeric code of this error.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::Exception(ex) => ERROR_CODE_BASE + *ex as i32,
            Self::BadCrc => BAD_CRC,
            Self::BadData => BAD_DATA,
            Self::BadExceptionFormat => BAD_EXCEPTION_FORMAT,
            Self::UnknownException(_) => UNKNOWN_EXCEPTION,
            Self::TooManyRequested => TOO_MANY_REQUESTED,
            Self::BadSlaveId => BAD_SLAVE_ID,
            Self::Unknown(code) => *code,
        }
    }

    /// Human readable message for [`Self::code`].
    #[must_use]
    pub fn message(&self) -> Cow<'static, str> {
        // The raw code byte is unknown after a round trip through `from_code`
        if let Self::UnknownException(code @ 1..) = self {
            return Cow::Owned(format!("unrecognized exception code {code}"));
        }
        let code = self.code();
        MESSAGES
            .iter()
            .find(|(c, _)| *c == code)
            .map_or_else(
                || Cow::Owned(format!("unrecognized exception code {code}")),
                |(_, msg)| Cow::Borrowed(*msg),
            )
    }

    /// `true` if the server answered with an exception.
    #[must_use]
    pub const fn is_exception(&self) -> bool {
        matches!(self, Self::Exception(_))
    }
}

impl fmt::Display for ModbusError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ModbusError {}

impl From<Exception> for ModbusError {
    fn from(ex: Exception) -> Self {
        Self::Exception(ex)
    }
}

/// Category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The server responded with an exception.
    Protocol,
    /// The response could not be decoded or did not match the request.
    Framing,
    /// I/O failure or timeout; the connection is no longer usable.
    Transport,
    /// Rejected locally before any I/O.
    InvalidArgument,
}

/// Client error
#[derive(Debug)]
pub enum Error {
    /// Server exception or framing error
    Modbus(ModbusError),
    /// I/O error of the transport
    Io(io::Error),
    /// No correlated response within the configured timeout
    Timeout,
    /// The connection was closed or broken by an earlier transport error
    NotConnected,
    /// Invalid argument
    InvalidArgument {
        parameter: &'static str,
        reason: Cow<'static, str>,
    },
}

impl Error {
    pub(crate) fn invalid_argument(
        parameter: &'static str,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidArgument {
            parameter,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Modbus(ModbusError::Exception(_)) => ErrorKind::Protocol,
            Self::Modbus(_) => ErrorKind::Framing,
            Self::Io(_) | Self::Timeout | Self::NotConnected => ErrorKind::Transport,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
        }
    }

    /// The server exception, if any.
    #[must_use]
    pub const fn exception(&self) -> Option<Exception> {
        match self {
            Self::Modbus(ModbusError::Exception(ex)) => Some(*ex),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Error::*;

        match self {
            Modbus(err) => write!(f, "Modbus error: {err}"),
            Io(err) => write!(f, "I/O error: {err}"),
            Timeout => write!(f, "Timeout while waiting for response"),
            NotConnected => write!(f, "Not connected"),
            InvalidArgument { parameter, reason } => {
                write!(f, "Invalid argument '{parameter}': {reason}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Modbus(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ModbusError> for Error {
    fn from(err: ModbusError) -> Self {
        Self::Modbus(err)
    }
}

impl From<Exception> for Error {
    fn from(ex: Exception) -> Self {
        Self::Modbus(ex.into())
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Self::Timeout,
            _ => Self::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exception_codes_follow_base() {
        assert_eq!(
            ModbusError::Exception(Exception::IllegalFunction).code(),
            112_345_679
        );
        assert_eq!(
            ModbusError::Exception(Exception::GatewayTargetDevice).code(),
            ERROR_CODE_BASE + 11
        );
    }

    #[test]
    fn local_codes_follow_exception_range() {
        assert_eq!(ModbusError::BadCrc.code(), ERROR_CODE_BASE + 12);
        assert_eq!(ModbusError::BadData.code(), ERROR_CODE_BASE + 13);
        assert_eq!(ModbusError::BadExceptionFormat.code(), ERROR_CODE_BASE + 14);
        assert_eq!(ModbusError::UnknownException(9).code(), ERROR_CODE_BASE + 15);
        assert_eq!(ModbusError::TooManyRequested.code(), ERROR_CODE_BASE + 16);
        assert_eq!(ModbusError::BadSlaveId.code(), ERROR_CODE_BASE + 17);
    }

    #[test]
    fn from_code() {
        assert_eq!(
            ModbusError::from_code(ERROR_CODE_BASE + 2),
            ModbusError::Exception(Exception::IllegalDataAddress)
        );
        assert_eq!(
            ModbusError::from_code(ERROR_CODE_BASE + 16),
            ModbusError::TooManyRequested
        );
        assert_eq!(
            ModbusError::from_code(ERROR_CODE_BASE + 9),
            ModbusError::Unknown(ERROR_CODE_BASE + 9)
        );
        assert_eq!(ModbusError::from_code(110), ModbusError::Unknown(110));
        assert_eq!(ModbusError::from_code(-1), ModbusError::Unknown(-1));
    }

    #[test]
    fn from_code_and_back() {
        for err in [
            ModbusError::BadCrc,
            ModbusError::BadData,
            ModbusError::BadExceptionFormat,
            ModbusError::TooManyRequested,
            ModbusError::BadSlaveId,
            ModbusError::Exception(Exception::NegativeAcknowledge),
            ModbusError::Unknown(42),
        ] {
            assert_eq!(ModbusError::from_code(err.code()), err);
        }
    }

    #[test]
    fn messages() {
        assert_eq!(
            ModbusError::Exception(Exception::IllegalDataAddress).message(),
            "Illegal data address"
        );
        assert_eq!(
            ModbusError::BadSlaveId.message(),
            "Response not from requested slave"
        );
        assert_eq!(ModbusError::TooManyRequested.to_string(), "Too many data");
        assert_eq!(
            ModbusError::UnknownException(0x0C).message(),
            "unrecognized exception code 12"
        );
        assert_eq!(
            ModbusError::from_code(ERROR_CODE_BASE + 15).message(),
            "Unknown exception code"
        );
        assert_eq!(
            ModbusError::Unknown(7).message(),
            "unrecognized exception code 7"
        );
    }

    #[test]
    fn error_kinds() {
        assert_eq!(
            Error::from(Exception::ServerDeviceBusy).kind(),
            ErrorKind::Protocol
        );
        assert_eq!(Error::from(ModbusError::BadData).kind(), ErrorKind::Framing);
        assert_eq!(Error::Timeout.kind(), ErrorKind::Transport);
        assert_eq!(Error::NotConnected.kind(), ErrorKind::Transport);
        assert_eq!(
            Error::invalid_argument("count", "must be greater than 0").kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn io_timeouts_become_timeout() {
        let err = Error::from(io::Error::from(io::ErrorKind::WouldBlock));
        assert!(matches!(err, Error::Timeout));
        let err = Error::from(io::Error::from(io::ErrorKind::TimedOut));
        assert!(matches!(err, Error::Timeout));
        let err = Error::from(io::Error::from(io::ErrorKind::ConnectionReset));
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn error_display() {
        assert_eq!(
            Error::from(Exception::IllegalFunction).to_string(),
            "Modbus error: Illegal function"
        );
        assert_eq!(
            Error::invalid_argument("count", "must be greater than 0").to_string(),
            "Invalid argument 'count': must be greater than 0"
        );
    }
}
