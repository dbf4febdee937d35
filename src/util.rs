//! Common helpers

use crate::{error::ModbusError, frame::Coil};

/// Turn a bool into a u16 coil value
#[must_use]
pub const fn bool_to_u16_coil(state: bool) -> u16 {
    if state { 0xFF00 } else { 0x0000 }
}

/// Turn a u16 coil value into a boolean value.
pub const fn u16_coil_to_bool(coil: u16) -> Result<bool, ModbusError> {
    match coil {
        0xFF00 => Ok(true),
        0x0000 => Ok(false),
        _ => Err(ModbusError::BadData),
    }
}

/// Calculate the number of bytes required for a given number of coils.
#[must_use]
pub const fn packed_coils_len(bitcount: usize) -> usize {
    bitcount.div_ceil(8)
}

///  Pack coils into bytes, LSB first.
#[must_use]
pub fn pack_coils(coils: &[Coil]) -> Vec<u8> {
    let mut bytes = vec![0; packed_coils_len(coils.len())];
    coils.iter().enumerate().for_each(|(i, b)| {
        let v = if *b { 0b1 } else { 0b0 };
        bytes[i / 8] |= v << (i % 8);
    });
    bytes
}
