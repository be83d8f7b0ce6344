use super::curve::CurveSession;
use crate::error::ZmqError;
use crate::message::{Frame, FrameFlags};
use crate::protocol::zmtp::command::{command_body, split_command, CMD_MESSAGE};
use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::Mutex;

/// Transforms frames after the handshake. The reader and writer of a
/// connection share one cipher.
pub trait DataCipher: Send + Sync + 'static {
  /// Turns an outgoing frame into its wire form.
  fn seal_frame(&self, frame: Frame) -> Result<Frame, ZmqError>;

  /// Turns a received wire frame back into the frame the peer sent.
  fn open_frame(&self, frame: Frame) -> Result<Frame, ZmqError>;
}

/// Cipher for NULL and PLAIN: frames travel unchanged.
#[derive(Debug, Default)]
pub(crate) struct PassThroughDataCipher;

impl DataCipher for PassThroughDataCipher {
  fn seal_frame(&self, frame: Frame) -> Result<Frame, ZmqError> {
    Ok(frame)
  }

  fn open_frame(&self, frame: Frame) -> Result<Frame, ZmqError> {
    Ok(frame)
  }
}

// Flag octet inside a CURVE MESSAGE plaintext.
const CURVE_FLAG_MORE: u8 = 0x01;
const CURVE_FLAG_COMMAND: u8 = 0x02;

/// Cipher for CURVE: every frame travels as a MESSAGE command whose payload
/// is the sealed flags octet plus the original body.
pub(crate) struct CurveDataCipher {
  session: Mutex<Box<dyn CurveSession>>,
}

impl CurveDataCipher {
  pub(crate) fn new(session: Box<dyn CurveSession>) -> Self {
    Self {
      session: Mutex::new(session),
    }
  }
}

impl DataCipher for CurveDataCipher {
  fn seal_frame(&self, frame: Frame) -> Result<Frame, ZmqError> {
    let mut plaintext = BytesMut::with_capacity(1 + frame.body.len());
    let mut flags = 0u8;
    if frame.is_more() {
      flags |= CURVE_FLAG_MORE;
    }
    if frame.is_command() {
      flags |= CURVE_FLAG_COMMAND;
    }
    plaintext.put_u8(flags);
    plaintext.put_slice(&frame.body);

    let sealed = self.session.lock().seal(&plaintext)?;
    Ok(Frame::command(command_body(CMD_MESSAGE, &sealed)))
  }

  fn open_frame(&self, frame: Frame) -> Result<Frame, ZmqError> {
    if !frame.is_command() {
      return Err(ZmqError::ProtocolViolation("Unencrypted data frame on CURVE connection".into()));
    }
    let (name, data) = split_command(&frame.body)?;
    if name != CMD_MESSAGE {
      return Err(ZmqError::ProtocolViolation(format!(
        "Unexpected {} command on CURVE connection",
        String::from_utf8_lossy(name)
      )));
    }
    let plaintext = self.session.lock().open(data)?;
    let (&flag_octet, body) = plaintext
      .split_first()
      .ok_or_else(|| ZmqError::ProtocolViolation("Empty CURVE MESSAGE".into()))?;

    let mut flags = FrameFlags::empty();
    if flag_octet & CURVE_FLAG_MORE != 0 {
      flags |= FrameFlags::MORE;
    }
    if flag_octet & CURVE_FLAG_COMMAND != 0 {
      flags |= FrameFlags::COMMAND;
    }
    Ok(Frame::new(flags, Bytes::copy_from_slice(body)))
  }
}
