// src/transport/endpoint.rs

use std::fmt;
#[cfg(all(unix, feature = "ipc"))]
use std::path::PathBuf;

use crate::error::ZmqError;

/// A parsed and validated endpoint address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Endpoint {
  /// `host` is a name or literal address without brackets; `*` becomes `0.0.0.0`.
  Tcp { host: String, port: u16 },
  #[cfg(all(unix, feature = "ipc"))]
  Ipc(PathBuf),
  #[cfg(feature = "inproc")]
  Inproc(String),
}

impl Endpoint {
  pub fn scheme(&self) -> &'static str {
    match self {
      Endpoint::Tcp { .. } => "tcp",
      #[cfg(all(unix, feature = "ipc"))]
      Endpoint::Ipc(_) => "ipc",
      #[cfg(feature = "inproc")]
      Endpoint::Inproc(_) => "inproc",
    }
  }
}

impl fmt::Display for Endpoint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Endpoint::Tcp { host, port } if host.contains(':') => write!(f, "tcp://[{}]:{}", host, port),
      Endpoint::Tcp { host, port } => write!(f, "tcp://{}:{}", host, port),
      #[cfg(all(unix, feature = "ipc"))]
      Endpoint::Ipc(path) => write!(f, "ipc://{}", path.display()),
      #[cfg(feature = "inproc")]
      Endpoint::Inproc(name) => write!(f, "inproc://{}", name),
    }
  }
}

/// Parses an endpoint string into a structured `Endpoint`.
pub(crate) fn parse_endpoint(endpoint_str: &str) -> Result<Endpoint, ZmqError> {
  let invalid_endpoint_err = || ZmqError::InvalidEndpoint(endpoint_str.to_string());

  let (scheme, address_part) = endpoint_str.split_once("://").ok_or_else(invalid_endpoint_err)?;
  if address_part.is_empty() || address_part.contains('\0') {
    return Err(invalid_endpoint_err());
  }

  match scheme {
    "tcp" => {
      let (host, port) = address_part.rsplit_once(':').ok_or_else(invalid_endpoint_err)?;
      let port = port.parse::<u16>().map_err(|_| {
        tracing::debug!("Failed to parse TCP port in {}", endpoint_str);
        invalid_endpoint_err()
      })?;
      let host = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')).unwrap_or(host);
      let host = match host {
        "" => return Err(invalid_endpoint_err()),
        "*" => "0.0.0.0",
        h => h,
      };
      Ok(Endpoint::Tcp {
        host: host.to_string(),
        port,
      })
    }

    #[cfg(all(unix, feature = "ipc"))]
    "ipc" => Ok(Endpoint::Ipc(PathBuf::from(address_part))),

    #[cfg(feature = "inproc")]
    "inproc" => Ok(Endpoint::Inproc(address_part.to_string())),

    // Unknown schemes and ones disabled by features.
    _ => Err(ZmqError::UnsupportedTransport(endpoint_str.to_string())),
  }
}
