use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::element::element_model::{NodeId, RawScreen};
use crate::error::EnvError;
use crate::tree::{ElementTree, Node};

use super::environment::{EnvAction, Environment, Snapshot};

/// Request sent to the driver over stdin (one JSON line).
#[derive(Debug, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum DriverRequest<'a> {
    Reset {
        go_home: bool,
    },
    GetState {
        wait_to_stabilize: bool,
    },
    Execute {
        #[serde(skip_serializing_if = "Option::is_none")]
        target: Option<NodeId>,
        action: &'a EnvAction,
    },
    ScreenSize,
    Close,
}

/// Response read from the driver's stdout (one JSON line).
#[derive(Debug, Deserialize)]
pub struct DriverResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub ready: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ScreenSizes {
    device: (u32, u32),
    #[serde(default)]
    logical: Option<(u32, u32)>,
}

#[derive(Debug, Deserialize)]
struct StatePayload {
    tree: RawScreen,
}

/// A device bridge backed by a long-lived driver process.
///
/// Commands are sent as NDJSON over stdin; the driver answers each with
/// exactly one line on stdout. The first line it prints must be
/// `{"ok": true, "ready": true}`.
pub struct DriverSession {
    command: String,
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    device_size: (u32, u32),
    logical_size: (u32, u32),
    closed: bool,
}

impl DriverSession {
    pub fn launch(command: &str, args: &[String]) -> Result<Self, EnvError> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| EnvError::SubprocessSpawn {
                command: command.to_string(),
                source: e,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EnvError::SessionIO(format!("failed to capture stdin of {}", command)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EnvError::SessionIO(format!("failed to capture stdout of {}", command)))?;

        let mut session = DriverSession {
            command: command.to_string(),
            child,
            stdin,
            reader: BufReader::new(stdout),
            device_size: (0, 0),
            logical_size: (0, 0),
            closed: false,
        };

        let ready = session.read_response("ready signal")?;
        if !ready.ok || ready.ready != Some(true) {
            return Err(EnvError::SessionProtocol {
                command: "launch".into(),
                error: format!("{} did not send a ready signal", command),
            });
        }

        let sizes: ScreenSizes = session.send_data(&DriverRequest::ScreenSize, "screen_size")?;
        session.device_size = sizes.device;
        session.logical_size = sizes.logical.unwrap_or(sizes.device);
        debug!(command, device = ?session.device_size, logical = ?session.logical_size, "driver ready");
        Ok(session)
    }

    fn read_response(&mut self, context: &str) -> Result<DriverResponse, EnvError> {
        let mut line = String::new();
        self.reader.read_line(&mut line).map_err(|e| {
            EnvError::SessionIO(format!("failed to read {} from {}: {}", context, self.command, e))
        })?;

        if line.trim().is_empty() {
            if let Ok(Some(status)) = self.child.try_wait() {
                if !status.success() {
                    return Err(EnvError::SubprocessFailed {
                        command: self.command.clone(),
                        status,
                    });
                }
            }
            return Err(EnvError::SessionIO(format!(
                "empty response from {} (process may have died)",
                self.command
            )));
        }

        serde_json::from_str(line.trim()).map_err(|e| EnvError::JsonParse {
            context: format!("{} {}", self.command, context),
            source: e,
        })
    }

    fn send(&mut self, request: &DriverRequest, name: &str) -> Result<DriverResponse, EnvError> {
        let json = serde_json::to_string(request).map_err(|e| EnvError::JsonSerialize {
            context: "DriverRequest".into(),
            source: e,
        })?;

        writeln!(self.stdin, "{}", json)
            .and_then(|_| self.stdin.flush())
            .map_err(|e| EnvError::SessionIO(format!("failed to write to {}: {}", self.command, e)))?;

        let response = self.read_response(name)?;
        if !response.ok {
            return Err(EnvError::SessionProtocol {
                command: name.into(),
                error: response.error.unwrap_or_else(|| "unknown error".into()),
            });
        }
        Ok(response)
    }

    fn send_data<T: for<'de> Deserialize<'de>>(
        &mut self,
        request: &DriverRequest,
        name: &str,
    ) -> Result<T, EnvError> {
        let data = self
            .send(request, name)?
            .data
            .ok_or_else(|| EnvError::SessionProtocol {
                command: name.into(),
                error: "no data in response".into(),
            })?;
        serde_json::from_value(data).map_err(|e| EnvError::JsonParse {
            context: format!("{} response", name),
            source: e,
        })
    }

    fn snapshot(&mut self, request: &DriverRequest, name: &str) -> Result<Snapshot, EnvError> {
        let payload: StatePayload = self.send_data(request, name)?;
        let tree = ElementTree::from_raw(&payload.tree, Some(self.device_size));
        Ok(Snapshot { pixels: None, tree })
    }
}

impl Environment for DriverSession {
    fn reset(&mut self, go_home: bool) -> Result<Snapshot, EnvError> {
        self.snapshot(&DriverRequest::Reset { go_home }, "reset")
    }

    fn get_state(&mut self, wait_to_stabilize: bool) -> Result<Snapshot, EnvError> {
        self.snapshot(&DriverRequest::GetState { wait_to_stabilize }, "get_state")
    }

    fn execute_action(&mut self, target: Option<&Node>, action: &EnvAction) -> Result<(), EnvError> {
        let request = DriverRequest::Execute {
            target: target.map(|n| n.id),
            action,
        };
        self.send(&request, "execute")?;
        Ok(())
    }

    fn device_screen_size(&self) -> (u32, u32) {
        self.device_size
    }

    fn logical_screen_size(&self) -> (u32, u32) {
        self.logical_size
    }

    fn close(&mut self) -> Result<(), EnvError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        // the driver may already be gone
        if let Err(e) = self.send(&DriverRequest::Close, "close") {
            warn!(error = %e, "driver close failed");
        }
        let _ = self.child.wait();
        Ok(())
    }
}

impl Drop for DriverSession {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
