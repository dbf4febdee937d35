//! Synchronous Modbus TCP client.
//!
//! A [`Client`] owns one [`Transport`] and performs exactly one
//! request/response cycle per call. There is no pipelining, no automatic
//! retry and no reconnect. Calls take `&mut self`, so sharing a client
//! between threads requires external synchronization; use one client per
//! thread for concurrent access.
//!
//! ```no_run
//! use modbus_tcp_client::{Client, ClientConfig};
//!
//! let mut client = Client::connect("192.168.1.10:502", ClientConfig::default())?;
//! let coils = client.read_coils(0, 8)?;
//! client.write_register(100, 0xABCD)?;
//! # Ok::<(), modbus_tcp_client::Error>(())
//! ```

use std::{
    io,
    net::ToSocketAddrs,
    time::{Duration, Instant},
};

use crate::{
    codec::{
        tcp::{MAX_FRAME_LEN, MBAP_HEADER_LEN, check_pdu_len, client::encode_request, decode_header},
        verify_response,
    },
    error::{Error, ModbusError},
    frame::*,
    transaction::{Correlation, TransactionTracker},
    transport::{TcpTransport, Transport},
};

/// Default response timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Default unit id.
pub const DEFAULT_UNIT_ID: UnitId = 1;

type Result<T> = std::result::Result<T, Error>;

/// Client configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// Addressed unit behind the server (gateway).
    pub unit_id: UnitId,
    /// Time to wait for a correlated response.
    pub timeout: Duration,
}

impl ClientConfig {
    #[must_use]
    pub const fn new(unit_id: UnitId) -> Self {
        Self {
            unit_id,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_unit_id(mut self, unit_id: UnitId) -> Self {
        self.unit_id = unit_id;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_UNIT_ID)
    }
}

/// Modbus TCP client.
#[derive(Debug)]
pub struct Client<T = TcpTransport> {
    transport: Option<T>,
    config: ClientConfig,
    tracker: TransactionTracker,
    tx_buf: Vec<u8>,
    rx_buf: Vec<u8>,
}

impl Client<TcpTransport> {
    /// Connect to a Modbus TCP server.
    ///
    /// The configured timeout also bounds the connection attempt.
    pub fn connect(addr: impl ToSocketAddrs, config: ClientConfig) -> Result<Self> {
        let transport = TcpTransport::connect(addr, config.timeout)?;
        Ok(Self::new(transport, config))
    }
}

impl<T: Transport> Client<T> {
    /// Create a client on top of an already connected transport.
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self {
            transport: Some(transport),
            config,
            tracker: TransactionTracker::new(),
            tx_buf: Vec::with_capacity(MAX_FRAME_LEN),
            rx_buf: Vec::with_capacity(MAX_FRAME_LEN),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Change the response timeout of subsequent calls.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.config.timeout = timeout;
    }

    /// Address another unit with subsequent calls.
    pub fn set_unit_id(&mut self, unit_id: UnitId) {
        self.config.unit_id = unit_id;
    }

    /// `false` after [`Self::close`] or a transport error.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// The underlying transport, unless the connection is closed.
    #[must_use]
    pub const fn transport(&self) -> Option<&T> {
        self.transport.as_ref()
    }

    /// Close the connection.
    ///
    /// Every subsequent call fails with [`Error::NotConnected`].
    pub fn close(&mut self) -> Result<()> {
        self.tracker.finish();
        self.rx_buf.clear();
        match self.transport.take() {
            Some(mut transport) => transport.close().map_err(Error::from),
            None => Ok(()),
        }
    }

    /// Read `quantity` coils starting at `address` (function code `0x01`).
    pub fn read_coils(&mut self, address: Address, quantity: Quantity) -> Result<Vec<Coil>> {
        check_range(address, quantity)?;
        self.read_bits(Request::ReadCoils(address, quantity))
    }

    /// Read `quantity` discrete inputs starting at `address` (function code `0x02`).
    pub fn read_discrete_inputs(
        &mut self,
        address: Address,
        quantity: Quantity,
    ) -> Result<Vec<Coil>> {
        check_range(address, quantity)?;
        self.read_bits(Request::ReadDiscreteInputs(address, quantity))
    }

    /// Read `quantity` holding registers starting at `address` (function code `0x03`).
    pub fn read_holding_registers(
        &mut self,
        address: Address,
        quantity: Quantity,
    ) -> Result<Vec<Word>> {
        check_range(address, quantity)?;
        self.read_words(Request::ReadHoldingRegisters(address, quantity))
    }

    /// Read `quantity` input registers starting at `address` (function code `0x04`).
    pub fn read_input_registers(
        &mut self,
        address: Address,
        quantity: Quantity,
    ) -> Result<Vec<Word>> {
        check_range(address, quantity)?;
        self.read_words(Request::ReadInputRegisters(address, quantity))
    }

    /// Write a single coil (function code `0x05`).
    pub fn write_coil(&mut self, address: Address, state: Coil) -> Result<()> {
        self.call(Request::WriteSingleCoil(address, state), |_| Ok(()))
    }

    /// Write a single holding register (function code `0x06`).
    pub fn write_register(&mut self, address: Address, word: Word) -> Result<()> {
        self.call(Request::WriteSingleRegister(address, word), |_| Ok(()))
    }

    /// Write consecutive coils starting at `address` (function code `0x0F`).
    pub fn write_coils(&mut self, address: Address, states: &[Coil]) -> Result<()> {
        let quantity = write_quantity(states.len(), MAX_WRITE_COILS)?;
        check_range(address, quantity)?;
        let mut packed = Vec::new();
        let coils = Coils::from_bools(states, &mut packed);
        self.call(Request::WriteMultipleCoils(address, coils), |_| Ok(()))
    }

    /// Write consecutive holding registers starting at `address` (function code `0x10`).
    pub fn write_registers(&mut self, address: Address, words: &[Word]) -> Result<()> {
        let quantity = write_quantity(words.len(), MAX_WRITE_REGISTERS)?;
        check_range(address, quantity)?;
        let mut packed = Vec::new();
        let data = Data::from_words(words, &mut packed);
        self.call(Request::WriteMultipleRegisters(address, data), |_| Ok(()))
    }

    fn read_bits(&mut self, request: Request<'_>) -> Result<Vec<Coil>> {
        self.call(request, collect_bits)
    }

    fn read_words(&mut self, request: Request<'_>) -> Result<Vec<Word>> {
        self.call(request, collect_words)
    }

    /// Perform one request/response cycle.
    ///
    /// `map` receives the verified response. Server exceptions and framing
    /// errors are returned as [`Error::Modbus`].
    fn call<R>(
        &mut self,
        request: Request<'_>,
        map: impl FnOnce(Response<'_>) -> std::result::Result<R, ModbusError>,
    ) -> Result<R> {
        if self.transport.is_none() {
            return Err(Error::NotConnected);
        }
        let hdr = self.tracker.begin(self.config.unit_id);
        self.tx_buf.clear();
        let adu = RequestAdu {
            hdr,
            pdu: RequestPdu(request),
        };
        if let Err(err) = encode_request(adu, &mut self.tx_buf) {
            self.tracker.finish();
            return Err(err.into());
        }
        log::debug!(
            "Sending request {} to unit {}: {:02X?}",
            hdr.transaction_id,
            hdr.unit_id,
            self.tx_buf
        );
        if let Err(err) = self.send() {
            return Err(self.disconnect(err));
        }
        let result = self.receive(&request, map);
        self.tracker.finish();
        result
    }

    fn send(&mut self) -> io::Result<()> {
        let Some(transport) = self.transport.as_mut() else {
            return Err(io::ErrorKind::NotConnected.into());
        };
        transport.write_all(&self.tx_buf)
    }

    /// Wait for the response of the outstanding request and decode it.
    fn receive<R>(
        &mut self,
        request: &Request<'_>,
        map: impl FnOnce(Response<'_>) -> std::result::Result<R, ModbusError>,
    ) -> Result<R> {
        let location = self.wait_for_response()?;
        let pdu = &self.rx_buf[MBAP_HEADER_LEN..location.end()];
        let result = decode_matched(request, pdu)
            .and_then(map)
            .map_err(Error::from);
        self.rx_buf.drain(..location.end());
        result
    }

    /// Read until the buffer starts with the frame of the outstanding
    /// request, dropping stale frames on the way.
    fn wait_for_response(&mut self) -> Result<FrameLocation> {
        let deadline = Instant::now() + self.config.timeout;
        let mut chunk = [0; 256];
        loop {
            match decode_header(&self.rx_buf) {
                Ok(Some((hdr, location))) => {
                    log::debug!(
                        "Received response {} from unit {}: {:02X?}",
                        hdr.transaction_id,
                        hdr.unit_id,
                        &self.rx_buf[..location.end()]
                    );
                    match self.tracker.correlate(hdr) {
                        Ok(Correlation::Matched) => {
                            let pdu = &self.rx_buf[MBAP_HEADER_LEN..location.end()];
                            if let Err(err) = check_pdu_len(pdu) {
                                self.rx_buf.drain(..location.end());
                                return Err(err.into());
                            }
                            return Ok(location);
                        }
                        Ok(Correlation::Discard) => {
                            log::warn!(
                                "Discarding stale response with transaction id {}",
                                hdr.transaction_id
                            );
                            self.rx_buf.drain(..location.end());
                            continue;
                        }
                        Err(err) => {
                            self.rx_buf.drain(..location.end());
                            return Err(err.into());
                        }
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    log::warn!("Dropping {} undecodable byte(s)", self.rx_buf.len());
                    self.rx_buf.clear();
                    return Err(err.into());
                }
            }
            let timeout = deadline.saturating_duration_since(Instant::now());
            if timeout.is_zero() {
                log::warn!("No response within {:?}", self.config.timeout);
                return Err(self.disconnect(io::ErrorKind::TimedOut.into()));
            }
            let Some(transport) = self.transport.as_mut() else {
                return Err(Error::NotConnected);
            };
            match transport.read(&mut chunk, timeout) {
                Ok(0) => {
                    return Err(self.disconnect(io::ErrorKind::UnexpectedEof.into()));
                }
                Ok(n) => self.rx_buf.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(self.disconnect(err)),
            }
        }
    }

    /// Tear down the transport after an I/O failure.
    fn disconnect(&mut self, err: io::Error) -> Error {
        log::warn!("Closing connection: {err}");
        self.tracker.finish();
        self.rx_buf.clear();
        if let Some(mut transport) = self.transport.take() {
            if let Err(err) = transport.close() {
                log::debug!("Failed to close transport: {err}");
            }
        }
        err.into()
    }
}

/// Decode and verify the PDU of a correlated response.
fn decode_matched<'r>(
    request: &Request<'_>,
    pdu: &'r [u8],
) -> std::result::Result<Response<'r>, ModbusError> {
    match ResponsePdu::try_from(pdu) {
        Ok(ResponsePdu(Ok(rsp))) => {
            if FunctionCode::from(rsp) != FunctionCode::from(*request) {
                log::error!(
                    "Unexpected function code {} in response to {}",
                    FunctionCode::from(rsp),
                    FunctionCode::from(*request)
                );
                return Err(ModbusError::BadData);
            }
            verify_response(request, rsp)
        }
        Ok(ResponsePdu(Err(ExceptionResponse {
            function,
            exception,
        }))) => {
            if function != FunctionCode::from(*request) {
                log::error!(
                    "Exception for function {function} in response to {}",
                    FunctionCode::from(*request)
                );
                return Err(ModbusError::BadExceptionFormat);
            }
            log::debug!("Exception response for function {function}: {exception}");
            Err(exception.into())
        }
        Err(err) => {
            log::error!("Failed to decode response PDU: {err}");
            Err(err)
        }
    }
}

fn collect_bits(rsp: Response<'_>) -> std::result::Result<Vec<Coil>, ModbusError> {
    match rsp {
        Response::ReadCoils(coils) | Response::ReadDiscreteInputs(coils) => {
            Ok(coils.into_iter().collect())
        }
        _ => Err(ModbusError::BadData),
    }
}

fn collect_words(rsp: Response<'_>) -> std::result::Result<Vec<Word>, ModbusError> {
    match rsp {
        Response::ReadHoldingRegisters(words) | Response::ReadInputRegisters(words) => {
            Ok(words.into_iter().collect())
        }
        _ => Err(ModbusError::BadData),
    }
}

/// Quantity must be positive and the addressed range must not exceed
/// the 16 bit address space.
fn check_range(address: Address, quantity: Quantity) -> Result<()> {
    if quantity == 0 {
        return Err(Error::invalid_argument(
            "quantity",
            "must be greater than 0",
        ));
    }
    if u32::from(address) + u32::from(quantity) - 1 > u32::from(u16::MAX) {
        return Err(Error::invalid_argument(
            "address",
            format!("range {address} + {quantity} exceeds the address space"),
        ));
    }
    Ok(())
}

fn write_quantity(len: usize, max: Quantity) -> Result<Quantity> {
    if len == 0 {
        return Err(Error::invalid_argument("values", "must not be empty"));
    }
    if len > usize::from(max) {
        return Err(ModbusError::TooManyRequested.into());
    }
    // Bounded by `max`
    Ok(len as Quantity)
}
