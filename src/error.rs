use std::error::Error as StdError;
use std::fmt::{Display, Formatter};
use std::io;
use std::process::ExitStatus;
use std::result::Result as StdResult;
use std::str::Utf8Error;
use std::string::FromUtf8Error;

/// Shorthand alias for `Result<T, Error>` using the `proctor_media` error type.
pub type Result<T> = StdResult<T, Error>;

/// Broad category of a failure, used by callers to pick the message shown
/// to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// The external executable (`ffmpeg`, `ffplay`) could not be found.
  ToolNotFound,
  /// The external process ran but exited unsuccessfully. `None` when it was
  /// terminated by a signal.
  ExitStatus(Option<i32>),
  /// The camera could not be opened or stopped producing frames.
  Device,
  /// A caller-supplied value was rejected before anything was spawned.
  InvalidInput,
  Io,
  Other,
}

/// The error type shared by every module of the crate.
#[derive(Debug)]
pub struct Error {
  pub kind: ErrorKind,
  pub message: String,
  pub source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl Display for Error {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.message)
  }
}

impl StdError for Error {
  fn source(&self) -> Option<&(dyn StdError + 'static)> {
    self
      .source
      .as_deref()
      .map(|e| e as &(dyn StdError + 'static))
  }
}

impl Error {
  /// Wrap any standard Error into a library Error.
  pub fn from_std<E>(e: E) -> Self
  where
    E: StdError + Send + Sync + 'static,
  {
    Error {
      kind: ErrorKind::Other,
      message: e.to_string(),
      source: Some(Box::new(e)),
    }
  }

  /// Wrap any Display into a library Error.
  pub fn from_display<E>(e: E) -> Self
  where
    E: Display,
  {
    Error::msg(e.to_string())
  }

  /// Create an error message from a string.
  pub fn msg<S: AsRef<str>>(message: S) -> Self {
    Error {
      kind: ErrorKind::Other,
      message: message.as_ref().to_string(),
      source: None,
    }
  }

  pub fn with_kind(mut self, kind: ErrorKind) -> Self {
    self.kind = kind;
    self
  }

  /// The executable `program` could not be launched because it does not
  /// exist.
  pub fn tool_not_found<S: AsRef<str>>(program: S, source: io::Error) -> Self {
    Error {
      kind: ErrorKind::ToolNotFound,
      message: format!("{} not found", program.as_ref()),
      source: Some(Box::new(source)),
    }
  }

  /// Build an error from an unsuccessful exit status, appending whatever
  /// diagnostic lines the process emitted.
  pub fn exit_status<S: AsRef<str>>(program: S, status: ExitStatus, details: &[String]) -> Self {
    let mut message = match status.code() {
      Some(code) => format!("{} exited with status {}", program.as_ref(), code),
      None => format!("{} was terminated by a signal", program.as_ref()),
    };
    if !details.is_empty() {
      message.push_str(": ");
      message.push_str(&details.join("; "));
    }
    Error {
      kind: ErrorKind::ExitStatus(status.code()),
      message,
      source: None,
    }
  }

  pub fn device<S: AsRef<str>>(message: S) -> Self {
    Error::msg(message).with_kind(ErrorKind::Device)
  }

  pub fn invalid_input<S: AsRef<str>>(message: S) -> Self {
    Error::msg(message).with_kind(ErrorKind::InvalidInput)
  }

  /// Map a spawn failure for `program`, turning `NotFound` into
  /// [`ErrorKind::ToolNotFound`].
  pub fn spawn<S: AsRef<str>>(program: S, e: io::Error) -> Self {
    match e.kind() {
      io::ErrorKind::NotFound => Error::tool_not_found(program, e),
      _ => Error::from(e),
    }
  }

  pub fn is_tool_not_found(&self) -> bool {
    self.kind == ErrorKind::ToolNotFound
  }
}

impl From<io::Error> for Error {
  fn from(e: io::Error) -> Self {
    Error::from_std(e).with_kind(ErrorKind::Io)
  }
}

impl From<Utf8Error> for Error {
  fn from(e: Utf8Error) -> Self {
    Error::from_std(e)
  }
}

impl From<FromUtf8Error> for Error {
  fn from(e: FromUtf8Error) -> Self {
    Error::from_std(e)
  }
}

impl From<anyhow::Error> for Error {
  fn from(e: anyhow::Error) -> Self {
    Error::msg(format!("{e:#}"))
  }
}

impl From<&str> for Error {
  fn from(e: &str) -> Self {
    Error::from_display(e)
  }
}

impl From<String> for Error {
  fn from(e: String) -> Self {
    Error::from_display(e)
  }
}
