//! Security mechanisms negotiated in the ZMTP greeting.

mod cipher;
pub mod curve;
pub mod mechanism;
pub mod null;
pub mod plain;

pub use cipher::DataCipher;
pub use curve::{CurveKey, CurveKeys, CurveMechanism, CurveOracle, CurveSession, CURVE_KEY_LENGTH};
pub use mechanism::{Mechanism, MechanismStatus};
pub use null::NullMechanism;
pub use plain::{PlainCredentials, PlainMechanism};

use crate::error::ZmqError;
use crate::message::Metadata;
use std::fmt;
use std::sync::Arc;

/// Which mechanism a socket runs, with the settings it needs.
#[derive(Clone)]
pub(crate) enum SecurityConfig {
  Null,
  Plain {
    as_server: bool,
    credentials: PlainCredentials,
  },
  Curve {
    as_server: bool,
    keys: CurveKeys,
    oracle: Option<Arc<dyn CurveOracle>>,
  },
}

impl fmt::Debug for SecurityConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SecurityConfig::Null => write!(f, "Null"),
      SecurityConfig::Plain { as_server, credentials } => f
        .debug_struct("Plain")
        .field("as_server", as_server)
        .field("credentials", credentials)
        .finish(),
      SecurityConfig::Curve { as_server, keys, oracle } => f
        .debug_struct("Curve")
        .field("as_server", as_server)
        .field("keys", keys)
        .field("oracle", &oracle.is_some())
        .finish(),
    }
  }
}

impl SecurityConfig {
  pub(crate) fn mechanism_name(&self) -> &'static str {
    match self {
      SecurityConfig::Null => NullMechanism::NAME,
      SecurityConfig::Plain { .. } => PlainMechanism::NAME,
      SecurityConfig::Curve { .. } => CurveMechanism::NAME,
    }
  }

  pub(crate) fn as_server(&self) -> bool {
    match self {
      SecurityConfig::Null => false,
      SecurityConfig::Plain { as_server, .. } | SecurityConfig::Curve { as_server, .. } => *as_server,
    }
  }

  /// Builds a fresh mechanism for one connection.
  pub(crate) fn build(&self, local: Metadata) -> Result<Box<dyn Mechanism>, ZmqError> {
    let mechanism: Box<dyn Mechanism> = match self {
      SecurityConfig::Null => Box::new(NullMechanism::new(local)),
      SecurityConfig::Plain { as_server: true, credentials } => {
        let expected = if credentials.username.is_empty() && credentials.password.is_empty() {
          None
        } else {
          Some(credentials.clone())
        };
        Box::new(PlainMechanism::server(expected, local))
      }
      SecurityConfig::Plain {
        as_server: false,
        credentials,
      } => Box::new(PlainMechanism::client(credentials.clone(), local)),
      SecurityConfig::Curve { as_server, keys, oracle } => {
        let oracle = oracle
          .as_ref()
          .ok_or_else(|| ZmqError::SecurityError("CURVE configured without an oracle".into()))?;
        Box::new(CurveMechanism::new(oracle, keys, *as_server, local)?)
      }
    };
    Ok(mechanism)
  }
}
