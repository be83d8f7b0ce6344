// src/socket/options.rs

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::error::ZmqError;
use crate::message::Blob;
use crate::security::{CurveKey, CurveKeys, CurveOracle, PlainCredentials, SecurityConfig, CURVE_KEY_LENGTH};
use crate::socket::patterns::MAX_TOPIC_LENGTH;
use crate::socket::types::SocketType;

// Option names. Matching is case-insensitive.
pub const IDENTITY: &str = "IDENTITY";
pub const SUBSCRIBE: &str = "SUBSCRIBE";
pub const UNSUBSCRIBE: &str = "UNSUBSCRIBE";
pub const SNDHWM: &str = "SNDHWM";
pub const RCVHWM: &str = "RCVHWM";
pub const HEARTBEAT_IVL: &str = "HEARTBEAT_IVL";
pub const HEARTBEAT_TIMEOUT: &str = "HEARTBEAT_TIMEOUT";
pub const HEARTBEAT_TTL: &str = "HEARTBEAT_TTL";
pub const PLAIN_USERNAME: &str = "PLAIN_USERNAME";
pub const PLAIN_PASSWORD: &str = "PLAIN_PASSWORD";
pub const PLAIN_SERVER: &str = "PLAIN_SERVER";
pub const CURVE_PUBLICKEY: &str = "CURVE_PUBLICKEY";
pub const CURVE_SECRETKEY: &str = "CURVE_SECRETKEY";
pub const CURVE_SERVERKEY: &str = "CURVE_SERVERKEY";
pub const CURVE_SERVER: &str = "CURVE_SERVER";
pub const ROUTER_MANDATORY: &str = "ROUTER_MANDATORY";
pub const IMMEDIATE: &str = "IMMEDIATE";
pub const MAXMSGSIZE: &str = "MAXMSGSIZE";
pub const SNDTIMEO: &str = "SNDTIMEO";
pub const RCVTIMEO: &str = "RCVTIMEO";
pub const RECONNECT_IVL: &str = "RECONNECT_IVL";
pub const RECONNECT_IVL_MAX: &str = "RECONNECT_IVL_MAX";
pub const HANDSHAKE_IVL: &str = "HANDSHAKE_IVL";
pub const LAST_ENDPOINT: &str = "LAST_ENDPOINT";
pub const TYPE: &str = "TYPE";

pub(crate) const DEFAULT_HWM: usize = 1000;
pub(crate) const DEFAULT_RECONNECT_IVL: Duration = Duration::from_millis(100);
pub(crate) const DEFAULT_RECONNECT_IVL_MAX: Duration = Duration::from_secs(30);
pub(crate) const DEFAULT_HANDSHAKE_IVL: Duration = Duration::from_secs(30);
const MAX_IDENTITY_LENGTH: usize = 255;
/// PING TTL travels as a u16 count of deciseconds.
const MAX_HEARTBEAT_TTL: Duration = Duration::from_millis(u16::MAX as u64 * 100);

/// A value passed to or returned from `set_option` / `get_option`.
#[derive(Clone, PartialEq, Eq)]
pub enum OptionValue {
  Bool(bool),
  Int(i64),
  Bytes(Bytes),
  Str(String),
  Duration(Duration),
}

impl fmt::Debug for OptionValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      OptionValue::Bool(b) => write!(f, "Bool({})", b),
      OptionValue::Int(i) => write!(f, "Int({})", i),
      OptionValue::Bytes(b) => write!(f, "Bytes({:?})", Blob::from_bytes(b.clone())),
      OptionValue::Str(s) => write!(f, "Str({:?})", s),
      OptionValue::Duration(d) => write!(f, "Duration({:?})", d),
    }
  }
}

impl OptionValue {
  pub fn as_bool(&self) -> Option<bool> {
    match self {
      OptionValue::Bool(b) => Some(*b),
      OptionValue::Int(i) => Some(*i != 0),
      _ => None,
    }
  }

  pub fn as_int(&self) -> Option<i64> {
    match self {
      OptionValue::Int(i) => Some(*i),
      OptionValue::Bool(b) => Some(*b as i64),
      OptionValue::Duration(d) => i64::try_from(d.as_millis()).ok(),
      _ => None,
    }
  }

  pub fn as_bytes(&self) -> Option<Bytes> {
    match self {
      OptionValue::Bytes(b) => Some(b.clone()),
      OptionValue::Str(s) => Some(Bytes::copy_from_slice(s.as_bytes())),
      _ => None,
    }
  }

  /// Durations are accepted directly or as integer milliseconds.
  pub fn as_duration(&self) -> Option<Duration> {
    match self {
      OptionValue::Duration(d) => Some(*d),
      OptionValue::Int(ms) if *ms >= 0 => Some(Duration::from_millis(*ms as u64)),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      OptionValue::Str(s) => Some(s),
      OptionValue::Bytes(b) => std::str::from_utf8(b).ok(),
      _ => None,
    }
  }
}

impl From<bool> for OptionValue {
  fn from(v: bool) -> Self {
    OptionValue::Bool(v)
  }
}

impl From<i64> for OptionValue {
  fn from(v: i64) -> Self {
    OptionValue::Int(v)
  }
}

impl From<i32> for OptionValue {
  fn from(v: i32) -> Self {
    OptionValue::Int(v as i64)
  }
}

impl From<usize> for OptionValue {
  fn from(v: usize) -> Self {
    OptionValue::Int(v as i64)
  }
}

impl From<Duration> for OptionValue {
  fn from(v: Duration) -> Self {
    OptionValue::Duration(v)
  }
}

impl From<Bytes> for OptionValue {
  fn from(v: Bytes) -> Self {
    OptionValue::Bytes(v)
  }
}

impl From<Vec<u8>> for OptionValue {
  fn from(v: Vec<u8>) -> Self {
    OptionValue::Bytes(Bytes::from(v))
  }
}

impl From<&[u8]> for OptionValue {
  fn from(v: &[u8]) -> Self {
    OptionValue::Bytes(Bytes::copy_from_slice(v))
  }
}

impl<const N: usize> From<&[u8; N]> for OptionValue {
  fn from(v: &[u8; N]) -> Self {
    OptionValue::Bytes(Bytes::copy_from_slice(v))
  }
}

impl From<&str> for OptionValue {
  fn from(v: &str) -> Self {
    OptionValue::Str(v.to_string())
  }
}

impl From<String> for OptionValue {
  fn from(v: String) -> Self {
    OptionValue::Str(v)
  }
}

/// What the control task must do after a successful `set`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OptionAction {
  Stored,
  Subscribe(Bytes),
  Unsubscribe(Bytes),
}

/// Holds parsed and validated socket options.
#[derive(Debug, Clone)]
pub(crate) struct SocketOptions {
  pub socket_type: SocketType,
  pub identity: Blob,
  // 0 = unlimited
  pub sndhwm: usize,
  pub rcvhwm: usize,
  // Zero disables.
  pub heartbeat_ivl: Duration,
  pub heartbeat_timeout: Duration,
  pub heartbeat_ttl: Duration,
  pub plain_username: Bytes,
  pub plain_password: Bytes,
  pub plain_server: bool,
  pub curve_public_key: Option<CurveKey>,
  pub curve_secret_key: Option<CurveKey>,
  pub curve_server_key: Option<CurveKey>,
  pub curve_server: bool,
  pub router_mandatory: bool,
  pub immediate: bool,
  // None = unlimited
  pub max_msg_size: Option<u64>,
  // None = block forever, Some(ZERO) = non-blocking
  pub sndtimeo: Option<Duration>,
  pub rcvtimeo: Option<Duration>,
  pub reconnect_ivl: Duration,
  pub reconnect_ivl_max: Duration,
  // None = no limit
  pub handshake_ivl: Option<Duration>,
  pub last_endpoint: String,
}

impl SocketOptions {
  pub fn new(socket_type: SocketType) -> Self {
    Self {
      socket_type,
      identity: Blob::new(),
      sndhwm: DEFAULT_HWM,
      rcvhwm: DEFAULT_HWM,
      heartbeat_ivl: Duration::ZERO,
      heartbeat_timeout: Duration::ZERO,
      heartbeat_ttl: Duration::ZERO,
      plain_username: Bytes::new(),
      plain_password: Bytes::new(),
      plain_server: false,
      curve_public_key: None,
      curve_secret_key: None,
      curve_server_key: None,
      curve_server: false,
      router_mandatory: false,
      immediate: false,
      max_msg_size: None,
      sndtimeo: None,
      rcvtimeo: None,
      reconnect_ivl: DEFAULT_RECONNECT_IVL,
      reconnect_ivl_max: DEFAULT_RECONNECT_IVL_MAX,
      handshake_ivl: Some(DEFAULT_HANDSHAKE_IVL),
      last_endpoint: String::new(),
    }
  }

  /// Validates and stores one option.
  pub fn set(&mut self, name: &str, value: OptionValue) -> Result<OptionAction, ZmqError> {
    let key = name.to_ascii_uppercase();
    match key.as_str() {
      IDENTITY => {
        let bytes = parse_bytes(name, &value)?;
        if bytes.len() > MAX_IDENTITY_LENGTH {
          return Err(ZmqError::invalid_option(name, "identity longer than 255 bytes"));
        }
        self.identity = Blob::from_bytes(bytes);
      }
      SUBSCRIBE | UNSUBSCRIBE => {
        if !matches!(self.socket_type, SocketType::Sub | SocketType::XSub) {
          return Err(ZmqError::invalid_option(
            name,
            format!("not applicable to {} sockets", self.socket_type),
          ));
        }
        let topic = parse_bytes(name, &value)?;
        if topic.len() > MAX_TOPIC_LENGTH {
          return Err(ZmqError::invalid_option(name, "topic too long"));
        }
        return Ok(if key == SUBSCRIBE {
          OptionAction::Subscribe(topic)
        } else {
          OptionAction::Unsubscribe(topic)
        });
      }
      SNDHWM => self.sndhwm = parse_count(name, &value)?,
      RCVHWM => self.rcvhwm = parse_count(name, &value)?,
      HEARTBEAT_IVL => self.heartbeat_ivl = parse_duration(name, &value)?,
      HEARTBEAT_TIMEOUT => self.heartbeat_timeout = parse_duration(name, &value)?,
      HEARTBEAT_TTL => {
        let ttl = parse_duration(name, &value)?;
        if ttl > MAX_HEARTBEAT_TTL {
          return Err(ZmqError::invalid_option(name, "TTL exceeds 6553.5 seconds"));
        }
        self.heartbeat_ttl = ttl;
      }
      PLAIN_USERNAME => self.plain_username = parse_bytes(name, &value)?,
      PLAIN_PASSWORD => self.plain_password = parse_bytes(name, &value)?,
      PLAIN_SERVER => self.plain_server = parse_bool(name, &value)?,
      CURVE_PUBLICKEY => self.curve_public_key = Some(parse_key(name, &value)?),
      CURVE_SECRETKEY => self.curve_secret_key = Some(parse_key(name, &value)?),
      CURVE_SERVERKEY => self.curve_server_key = Some(parse_key(name, &value)?),
      CURVE_SERVER => self.curve_server = parse_bool(name, &value)?,
      ROUTER_MANDATORY => self.router_mandatory = parse_bool(name, &value)?,
      IMMEDIATE => self.immediate = parse_bool(name, &value)?,
      MAXMSGSIZE => {
        self.max_msg_size = match parse_int(name, &value)? {
          -1 => None,
          n if n >= 0 => Some(n as u64),
          _ => return Err(ZmqError::invalid_option(name, "expected -1 or a non-negative size")),
        }
      }
      SNDTIMEO => self.sndtimeo = parse_timeout(name, &value)?,
      RCVTIMEO => self.rcvtimeo = parse_timeout(name, &value)?,
      RECONNECT_IVL => self.reconnect_ivl = parse_duration(name, &value)?,
      RECONNECT_IVL_MAX => self.reconnect_ivl_max = parse_duration(name, &value)?,
      HANDSHAKE_IVL => {
        let ivl = parse_duration(name, &value)?;
        self.handshake_ivl = (!ivl.is_zero()).then_some(ivl);
      }
      LAST_ENDPOINT | TYPE => return Err(ZmqError::invalid_option(name, "option is read-only")),
      _ => return Err(ZmqError::UnknownOption(name.to_string())),
    }
    Ok(OptionAction::Stored)
  }

  pub fn get(&self, name: &str) -> Result<OptionValue, ZmqError> {
    let key = name.to_ascii_uppercase();
    let value = match key.as_str() {
      IDENTITY => OptionValue::Bytes(self.identity.to_bytes()),
      SUBSCRIBE | UNSUBSCRIBE => return Err(ZmqError::invalid_option(name, "option is write-only")),
      SNDHWM => OptionValue::Int(self.sndhwm as i64),
      RCVHWM => OptionValue::Int(self.rcvhwm as i64),
      HEARTBEAT_IVL => OptionValue::Duration(self.heartbeat_ivl),
      HEARTBEAT_TIMEOUT => OptionValue::Duration(self.heartbeat_timeout),
      HEARTBEAT_TTL => OptionValue::Duration(self.heartbeat_ttl),
      PLAIN_USERNAME => OptionValue::Bytes(self.plain_username.clone()),
      PLAIN_PASSWORD => OptionValue::Bytes(self.plain_password.clone()),
      PLAIN_SERVER => OptionValue::Bool(self.plain_server),
      CURVE_PUBLICKEY => key_value(&self.curve_public_key),
      CURVE_SECRETKEY => key_value(&self.curve_secret_key),
      CURVE_SERVERKEY => key_value(&self.curve_server_key),
      CURVE_SERVER => OptionValue::Bool(self.curve_server),
      ROUTER_MANDATORY => OptionValue::Bool(self.router_mandatory),
      IMMEDIATE => OptionValue::Bool(self.immediate),
      MAXMSGSIZE => OptionValue::Int(self.max_msg_size.map(|n| n as i64).unwrap_or(-1)),
      SNDTIMEO => timeout_value(self.sndtimeo),
      RCVTIMEO => timeout_value(self.rcvtimeo),
      RECONNECT_IVL => OptionValue::Duration(self.reconnect_ivl),
      RECONNECT_IVL_MAX => OptionValue::Duration(self.reconnect_ivl_max),
      HANDSHAKE_IVL => OptionValue::Duration(self.handshake_ivl.unwrap_or(Duration::ZERO)),
      LAST_ENDPOINT => OptionValue::Str(self.last_endpoint.clone()),
      TYPE => OptionValue::Str(self.socket_type.as_str().to_string()),
      _ => return Err(ZmqError::UnknownOption(name.to_string())),
    };
    Ok(value)
  }

  /// Picks the mechanism: CURVE when any CURVE role is configured, then
  /// PLAIN, otherwise NULL.
  pub fn security_config(&self, oracle: Option<Arc<dyn CurveOracle>>) -> SecurityConfig {
    if self.curve_server || self.curve_server_key.is_some() {
      SecurityConfig::Curve {
        as_server: self.curve_server,
        keys: CurveKeys {
          public_key: self.curve_public_key.unwrap_or_default(),
          secret_key: self.curve_secret_key.unwrap_or_default(),
          server_key: self.curve_server_key,
        },
        oracle,
      }
    } else if self.plain_server || !self.plain_username.is_empty() || !self.plain_password.is_empty() {
      SecurityConfig::Plain {
        as_server: self.plain_server,
        credentials: PlainCredentials {
          username: self.plain_username.clone(),
          password: self.plain_password.clone(),
        },
      }
    } else {
      SecurityConfig::Null
    }
  }

  /// Snapshot handed to each new connection.
  pub fn engine_config(&self, oracle: Option<Arc<dyn CurveOracle>>) -> EngineConfig {
    let heartbeat_ivl = (!self.heartbeat_ivl.is_zero()).then_some(self.heartbeat_ivl);
    let heartbeat_timeout = heartbeat_ivl.map(|ivl| {
      if self.heartbeat_timeout.is_zero() {
        ivl
      } else {
        self.heartbeat_timeout
      }
    });
    EngineConfig {
      socket_type: self.socket_type,
      identity: self.identity.clone(),
      security: self.security_config(oracle),
      max_msg_size: self.max_msg_size,
      heartbeat_ivl,
      heartbeat_timeout,
      heartbeat_ttl: self.heartbeat_ttl,
      handshake_ivl: self.handshake_ivl,
      sndhwm: self.sndhwm,
      rcvhwm: self.rcvhwm,
      reconnect_ivl: self.reconnect_ivl,
      reconnect_ivl_max: self.reconnect_ivl_max,
      immediate: self.immediate,
    }
  }
}

/// Per-connection settings, frozen when the connection starts.
#[derive(Debug, Clone)]
pub(crate) struct EngineConfig {
  pub socket_type: SocketType,
  pub identity: Blob,
  pub security: SecurityConfig,
  pub max_msg_size: Option<u64>,
  pub heartbeat_ivl: Option<Duration>,
  pub heartbeat_timeout: Option<Duration>,
  pub heartbeat_ttl: Duration,
  pub handshake_ivl: Option<Duration>,
  pub sndhwm: usize,
  pub rcvhwm: usize,
  pub reconnect_ivl: Duration,
  pub reconnect_ivl_max: Duration,
  pub immediate: bool,
}

impl EngineConfig {
  /// TTL announced in outgoing PINGs, in deciseconds.
  pub fn ping_ttl_deciseconds(&self) -> u16 {
    (self.heartbeat_ttl.as_millis() / 100).min(u16::MAX as u128) as u16
  }
}

// --- Helper functions for parsing option values ---

fn type_error(name: &str, expected: &str, value: &OptionValue) -> ZmqError {
  ZmqError::invalid_option(name, format!("expected {}, got {:?}", expected, value))
}

fn parse_bool(name: &str, value: &OptionValue) -> Result<bool, ZmqError> {
  value.as_bool().ok_or_else(|| type_error(name, "a boolean", value))
}

fn parse_int(name: &str, value: &OptionValue) -> Result<i64, ZmqError> {
  value.as_int().ok_or_else(|| type_error(name, "an integer", value))
}

fn parse_count(name: &str, value: &OptionValue) -> Result<usize, ZmqError> {
  let n = parse_int(name, value)?;
  usize::try_from(n).map_err(|_| ZmqError::invalid_option(name, "expected a non-negative integer"))
}

fn parse_bytes(name: &str, value: &OptionValue) -> Result<Bytes, ZmqError> {
  value.as_bytes().ok_or_else(|| type_error(name, "bytes", value))
}

fn parse_duration(name: &str, value: &OptionValue) -> Result<Duration, ZmqError> {
  value
    .as_duration()
    .ok_or_else(|| type_error(name, "a non-negative duration", value))
}

/// -1 = infinite, 0 = non-blocking, >0 = milliseconds.
fn parse_timeout(name: &str, value: &OptionValue) -> Result<Option<Duration>, ZmqError> {
  match value {
    OptionValue::Duration(d) => Ok(Some(*d)),
    _ => match parse_int(name, value)? {
      -1 => Ok(None),
      ms if ms >= 0 => Ok(Some(Duration::from_millis(ms as u64))),
      _ => Err(ZmqError::invalid_option(name, "expected -1 or a non-negative timeout")),
    },
  }
}

fn parse_key(name: &str, value: &OptionValue) -> Result<CurveKey, ZmqError> {
  let bytes = parse_bytes(name, value)?;
  bytes
    .as_ref()
    .try_into()
    .map_err(|_| ZmqError::invalid_option(name, format!("key must be {} bytes", CURVE_KEY_LENGTH)))
}

fn key_value(key: &Option<CurveKey>) -> OptionValue {
  OptionValue::Bytes(key.map(|k| Bytes::copy_from_slice(&k)).unwrap_or_default())
}

fn timeout_value(timeout: Option<Duration>) -> OptionValue {
  OptionValue::Int(timeout.map(|d| d.as_millis() as i64).unwrap_or(-1))
}
