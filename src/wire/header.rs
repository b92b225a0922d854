use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::wire::constants::{COMMAND_LEN, HEADER_LEN, MAX_MESSAGE_SIZE};
use crate::wire::error::WireError;

/// The 20 header bytes that follow the magic.
///
/// ```text
/// +--------------+---------------+-------------+
/// | command (12) | length (4 LE) | checksum(4) |
/// +--------------+---------------+-------------+
/// ```
///
/// https://developer.bitcoin.org/reference/p2p_networking.html#message-headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketHeader {
    pub command: String,
    pub payload_len: u32,
    pub checksum: [u8; 4],
}

impl PacketHeader {
    /// Parses the header fields from the stream.
    ///
    /// The command is everything up to the first NUL (or all 12 bytes), read
    /// as ASCII.
    /// A length above [`MAX_MESSAGE_SIZE`] is rejected here, before anyone
    /// allocates a payload buffer. The checksum is only carried, not verified.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self, WireError> {
        let mut raw = [0u8; HEADER_LEN];
        reader.read_exact(&mut raw)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &[u8; HEADER_LEN]) -> Result<Self, WireError> {
        let command_field = &raw[..COMMAND_LEN];
        let end = command_field
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(COMMAND_LEN);
        // Non-ASCII bytes become U+FFFD; such a command is simply unknown.
        let command = command_field[..end]
            .iter()
            .map(|&b| {
                if b.is_ascii() {
                    char::from(b)
                } else {
                    char::REPLACEMENT_CHARACTER
                }
            })
            .collect();

        let mut rest = &raw[COMMAND_LEN..];
        let payload_len = rest.read_u32::<LittleEndian>()?;
        if payload_len > MAX_MESSAGE_SIZE {
            return Err(WireError::MessageTooLarge { size: payload_len });
        }

        let mut checksum = [0u8; 4];
        rest.read_exact(&mut checksum)?;

        Ok(Self {
            command,
            payload_len,
            checksum,
        })
    }

    /// Writes the 20 header bytes. Fails if the command does not fit.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<(), WireError> {
        writer.write_all(&command_field(&self.command)?)?;
        writer.write_u32::<LittleEndian>(self.payload_len)?;
        writer.write_all(&self.checksum)?;
        Ok(())
    }
}

/// NUL-pads `command` into the 12-byte command field.
pub fn command_field(command: &str) -> Result<[u8; COMMAND_LEN], WireError> {
    if !command.is_ascii() {
        return Err(WireError::InvalidCommand);
    }
    if command.len() > COMMAND_LEN {
        return Err(WireError::CommandTooLong(command.to_owned()));
    }
    let mut field = [0u8; COMMAND_LEN];
    field[..command.len()].copy_from_slice(command.as_bytes());
    Ok(field)
}
