// src/runtime/command.rs

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::error::ZmqResult;
use crate::message::Msg;
use crate::security::CurveOracle;
use crate::socket::events::MonitorReceiver;
use crate::socket::options::OptionValue;

/// Where the control task sends the outcome of a user request.
pub(crate) type Reply<T> = oneshot::Sender<ZmqResult<T>>;

/// Requests from `Socket` handles to the socket's control task.
pub(crate) enum Command {
  /// Resolves to the bound endpoint (ephemeral ports filled in).
  Listen { endpoint: String, reply: Reply<String> },
  Dial { endpoint: String, reply: Reply<()> },
  Send { msg: Msg, nonblocking: bool, reply: Reply<()> },
  Recv { nonblocking: bool, reply: Reply<Msg> },
  SetOption { name: String, value: OptionValue, reply: Reply<()> },
  GetOption { name: String, reply: Reply<OptionValue> },
  SetCurveOracle { oracle: Arc<dyn CurveOracle>, reply: Reply<()> },
  Monitor { capacity: usize, reply: Reply<MonitorReceiver> },
  Close { reply: Reply<()> },
}

impl Command {
  pub fn variant_name(&self) -> &'static str {
    match self {
      Command::Listen { .. } => "Listen",
      Command::Dial { .. } => "Dial",
      Command::Send { .. } => "Send",
      Command::Recv { .. } => "Recv",
      Command::SetOption { .. } => "SetOption",
      Command::GetOption { .. } => "GetOption",
      Command::SetCurveOracle { .. } => "SetCurveOracle",
      Command::Monitor { .. } => "Monitor",
      Command::Close { .. } => "Close",
    }
  }
}
