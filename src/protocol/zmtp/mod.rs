// src/protocol/zmtp/mod.rs

pub mod assembler;
pub mod codec;
pub mod command;
pub mod greeting;

pub use assembler::MessageAssembler;
pub use codec::ZmtpCodec;
pub use command::ZmtpCommand;
pub use greeting::{ZmtpGreeting, GREETING_LENGTH, MECHANISM_LENGTH};
