use std::io::{BufRead, BufReader, Error as IoError, ErrorKind, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::endpoint::ModeEndpoint;

/// One JSON line sent by a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum Request {
    SetMode { mode: String },
    GetMode,
}

/// One JSON line sent back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Response {
    Result(String),
    Error(String),
}

pub fn handle_line(endpoint: &ModeEndpoint, line: &str) -> Response {
    match serde_json::from_str::<Request>(line) {
        Ok(Request::SetMode { mode }) => Response::Result(endpoint.set_mode(&mode)),
        Ok(Request::GetMode) => Response::Result(endpoint.get_mode()),
        Err(e) => Response::Error(format!("malformed request: {e}")),
    }
}

/// Unix socket accepting mode requests. The socket file is removed on drop.
pub struct ControlServer {
    listener: UnixListener,
    path: PathBuf,
}

impl ControlServer {
    /// Binds `path`, refusing when another daemon still accepts connections on it.
    pub fn bind(path: &Path) -> Result<Self, IoError> {
        if path.exists() {
            if UnixStream::connect(path).is_ok() {
                return Err(IoError::new(
                    ErrorKind::AddrInUse,
                    format!("a daemon is already listening on {}", path.display()),
                ));
            }
            warn!(path = %path.display(), "removing stale control socket");
            std::fs::remove_file(path)?;
        }
        let listener = UnixListener::bind(path)?;
        info!(path = %path.display(), "control socket listening");
        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accepts clients forever, one thread each.
    pub fn serve(&self, endpoint: &ModeEndpoint) {
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let endpoint = endpoint.clone();
                    let spawned = std::thread::Builder::new()
                        .name("control-client".to_string())
                        .spawn(move || {
                            if let Err(e) = handle_client(stream, &endpoint) {
                                debug!(error = %e, "control client dropped");
                            }
                        });
                    if let Err(e) = spawned {
                        warn!(error = %e, "cannot spawn control client thread");
                    }
                }
                Err(e) => warn!(error = %e, "error accepting control client"),
            }
        }
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn handle_client(stream: UnixStream, endpoint: &ModeEndpoint) -> Result<(), IoError> {
    let mut writer = stream.try_clone()?;
    for line in BufReader::new(stream).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(endpoint, &line);
        let mut encoded = serde_json::to_string(&response).map_err(IoError::other)?;
        encoded.push('\n');
        writer.write_all(encoded.as_bytes())?;
    }
    Ok(())
}

/// Sends one request to the daemon at `path` and waits for its answer.
pub fn send_request(path: &Path, request: &Request) -> Result<Response, IoError> {
    let mut stream = UnixStream::connect(path)?;
    let mut encoded = serde_json::to_string(request).map_err(IoError::other)?;
    encoded.push('\n');
    stream.write_all(encoded.as_bytes())?;

    let mut line = String::new();
    BufReader::new(stream).read_line(&mut line)?;
    serde_json::from_str(&line).map_err(IoError::other)
}
