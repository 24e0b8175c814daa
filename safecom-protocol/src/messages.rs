//! Known frame identifiers and message payloads
//!
//! The first payload byte of every frame is its identifier. Identifiers are
//! split by direction:
//! - Master → Slave: commands, read requests, status checks
//! - Slave → Master: returned data, returned status
//!
//! Commands and requests carry a one-byte code after the identifier, followed
//! by code-specific arguments.

use crate::error::Error;

// Identifiers: Master → Slave
pub const ID_CMD_MODE: u8 = 0x10;
pub const ID_REQ_DATA: u8 = 0x11;
pub const ID_CHK_STAT: u8 = 0x12;

// Identifiers: Slave → Master
pub const ID_RET_DATA: u8 = 0x20;
pub const ID_RET_STAT: u8 = 0x21;

/// Known frame identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameId {
    /// Configure or write
    CmdMode,
    /// Read request
    ReqData,
    /// Status check
    ChkStat,
    /// Response carrying data
    RetData,
    /// Response carrying a status
    RetStat,
}

impl FrameId {
    /// Parse an identifier byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            ID_CMD_MODE => Some(FrameId::CmdMode),
            ID_REQ_DATA => Some(FrameId::ReqData),
            ID_CHK_STAT => Some(FrameId::ChkStat),
            ID_RET_DATA => Some(FrameId::RetData),
            ID_RET_STAT => Some(FrameId::RetStat),
            _ => None,
        }
    }

    /// Convert to the identifier byte
    pub fn to_byte(self) -> u8 {
        match self {
            FrameId::CmdMode => ID_CMD_MODE,
            FrameId::ReqData => ID_REQ_DATA,
            FrameId::ChkStat => ID_CHK_STAT,
            FrameId::RetData => ID_RET_DATA,
            FrameId::RetStat => ID_RET_STAT,
        }
    }

    /// Sent by the master
    pub fn is_request(&self) -> bool {
        matches!(self, FrameId::CmdMode | FrameId::ReqData | FrameId::ChkStat)
    }

    /// Sent by the slave
    pub fn is_response(&self) -> bool {
        !self.is_request()
    }
}

macro_rules! byte_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $( $(#[$vmeta:meta])* $variant:ident = $value:literal ),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Parse from its wire byte
            pub fn from_byte(byte: u8) -> Option<Self> {
                match byte {
                    $( $value => Some($name::$variant), )+
                    _ => None,
                }
            }

            /// Convert to its wire byte
            pub fn to_byte(self) -> u8 {
                match self {
                    $( $name::$variant => $value, )+
                }
            }
        }
    };
}

byte_enum! {
    /// Command codes carried by [`FrameId::CmdMode`]
    CmdCode {
        /// Set GPIO direction (4-bit mask)
        GpioSetDir = 0x01,
        /// Drive GPIO levels (4-bit mask)
        GpioWrite = 0x02,
        /// Configure SPI speed and mode
        SpiConfig = 0x03,
        /// Configure I2C address and speed
        I2cConfig = 0x04,
    }
}

byte_enum! {
    /// Request codes carried by [`FrameId::ReqData`]
    ReqCode {
        /// Read the 4 GPIO levels
        ReadGpio = 0x01,
        /// Read a 12-bit ADC value
        ReadAnalog = 0x02,
        /// Read a block from an SPI device
        ReadSpiBlock = 0x03,
        /// Read a block from an I2C device
        ReadI2cBlock = 0x04,
    }
}

byte_enum! {
    /// Status codes carried by [`FrameId::RetStat`]
    Status {
        AckOk = 0x00,
        ErrParam = 0x01,
        ErrBusy = 0x02,
        ErrHw = 0x03,
    }
}

/// A decoded frame payload, borrowing its arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Message<'a> {
    Command { code: CmdCode, args: &'a [u8] },
    Request { code: ReqCode, args: &'a [u8] },
    CheckStatus,
    ReturnData { data: &'a [u8] },
    ReturnStatus { status: Status },
}

impl<'a> Message<'a> {
    /// Identifier this message is sent under
    pub fn id(&self) -> FrameId {
        match self {
            Message::Command { .. } => FrameId::CmdMode,
            Message::Request { .. } => FrameId::ReqData,
            Message::CheckStatus => FrameId::ChkStat,
            Message::ReturnData { .. } => FrameId::RetData,
            Message::ReturnStatus { .. } => FrameId::RetStat,
        }
    }

    /// Parse an unstuffed payload `[id][code?][args..]`
    ///
    /// Unknown identifiers, codes or statuses are [`Error::InvalidArgument`];
    /// a missing code or status byte is [`Error::Empty`].
    pub fn parse(payload: &'a [u8]) -> Result<Self, Error> {
        let (&id, rest) = payload.split_first().ok_or(Error::Empty)?;
        let id = FrameId::from_byte(id).ok_or(Error::InvalidArgument)?;

        match id {
            FrameId::CmdMode => {
                let (&code, args) = rest.split_first().ok_or(Error::Empty)?;
                let code = CmdCode::from_byte(code).ok_or(Error::InvalidArgument)?;
                Ok(Message::Command { code, args })
            }
            FrameId::ReqData => {
                let (&code, args) = rest.split_first().ok_or(Error::Empty)?;
                let code = ReqCode::from_byte(code).ok_or(Error::InvalidArgument)?;
                Ok(Message::Request { code, args })
            }
            FrameId::ChkStat => Ok(Message::CheckStatus),
            FrameId::RetData => Ok(Message::ReturnData { data: rest }),
            FrameId::RetStat => {
                let &status = rest.first().ok_or(Error::Empty)?;
                let status = Status::from_byte(status).ok_or(Error::InvalidArgument)?;
                Ok(Message::ReturnStatus { status })
            }
        }
    }

    /// Write the payload into `out`, returning the bytes written
    ///
    /// The result is ready for [`crate::stuffing::encode`].
    pub fn write(&self, out: &mut [u8]) -> Result<usize, Error> {
        let none: &[u8] = &[];
        let (code, tail) = match *self {
            Message::Command { code, args } => (Some(code.to_byte()), args),
            Message::Request { code, args } => (Some(code.to_byte()), args),
            Message::CheckStatus => (None, none),
            Message::ReturnData { data } => (None, data),
            Message::ReturnStatus { status } => (Some(status.to_byte()), none),
        };

        let len = 1 + usize::from(code.is_some()) + tail.len();
        let out = out.get_mut(..len).ok_or(Error::Full)?;

        out[0] = self.id().to_byte();
        let body = match code {
            Some(code) => {
                out[1] = code;
                &mut out[2..]
            }
            None => &mut out[1..],
        };
        body.copy_from_slice(tail);
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stuffing::{decode, encode_to_vec, max_encoded_len};

    #[test]
    fn test_frame_id_roundtrip() {
        for byte in [0x10, 0x11, 0x12, 0x20, 0x21] {
            let id = FrameId::from_byte(byte).unwrap();
            assert_eq!(id.to_byte(), byte);
        }
        assert_eq!(FrameId::from_byte(0x13), None);
        assert_eq!(FrameId::from_byte(0xFF), None);
    }

    #[test]
    fn test_frame_id_direction() {
        assert!(FrameId::CmdMode.is_request());
        assert!(FrameId::ChkStat.is_request());
        assert!(FrameId::RetData.is_response());
        assert!(!FrameId::RetStat.is_request());
    }

    #[test]
    fn test_codes() {
        assert_eq!(CmdCode::from_byte(0x03), Some(CmdCode::SpiConfig));
        assert_eq!(ReqCode::from_byte(0x02), Some(ReqCode::ReadAnalog));
        assert_eq!(Status::from_byte(0x00), Some(Status::AckOk));
        assert_eq!(Status::ErrHw.to_byte(), 0x03);
        assert_eq!(CmdCode::from_byte(0x05), None);
    }

    #[test]
    fn test_parse_command() {
        let msg = Message::parse(&[0x10, 0x02, 0b1010]).unwrap();
        assert_eq!(
            msg,
            Message::Command {
                code: CmdCode::GpioWrite,
                args: &[0b1010],
            }
        );
    }

    #[test]
    fn test_parse_return_status() {
        let msg = Message::parse(&[0x21, 0x02]).unwrap();
        assert_eq!(msg, Message::ReturnStatus { status: Status::ErrBusy });
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Message::parse(&[]), Err(Error::Empty));
        assert_eq!(Message::parse(&[0x10]), Err(Error::Empty));
        assert_eq!(Message::parse(&[0x21]), Err(Error::Empty));
        assert_eq!(Message::parse(&[0x33, 0x01]), Err(Error::InvalidArgument));
        assert_eq!(Message::parse(&[0x11, 0x09]), Err(Error::InvalidArgument));
        assert_eq!(Message::parse(&[0x21, 0x07]), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_write() {
        let mut buf = [0u8; 8];
        let msg = Message::Request {
            code: ReqCode::ReadI2cBlock,
            args: &[0x50, 0x10],
        };
        let n = msg.write(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[0x11, 0x04, 0x50, 0x10]);

        let n = Message::CheckStatus.write(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[0x12]);

        let n = Message::ReturnData { data: &[1, 2, 3] }.write(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[0x20, 1, 2, 3]);
    }

    #[test]
    fn test_write_too_small() {
        let mut buf = [0u8; 2];
        let msg = Message::Command {
            code: CmdCode::I2cConfig,
            args: &[0x50],
        };
        assert_eq!(msg.write(&mut buf), Err(Error::Full));
    }

    #[test]
    fn test_message_over_the_wire() {
        let msg = Message::ReturnData {
            data: &[0xFF, 0x00, 0xFE],
        };
        let mut payload = [0u8; 8];
        let n = msg.write(&mut payload).unwrap();

        let frame = encode_to_vec::<{ max_encoded_len(8) }>(&payload[..n]).unwrap();
        let mut out = [0u8; 8];
        let len = decode(&frame, &mut out).unwrap();
        assert_eq!(Message::parse(&out[..len]).unwrap(), msg);
    }
}
