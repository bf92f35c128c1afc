use std::{
    io::{BufRead, BufReader, ErrorKind, Write},
    path::{Path, PathBuf},
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
    time::Instant,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{EditorBridge, EditorDocument, EditorError, LayerKind};

/// Editor bridge that drives an external helper process.
///
/// Each session spawns the helper once and exchanges one JSON object per line
/// over its stdin/stdout. The helper owns the connection to the desktop
/// application; this side only sequences commands.
#[derive(Debug, Clone)]
pub struct ScriptEditor {
    command: PathBuf,
    args: Vec<String>,
}

impl ScriptEditor {
    pub fn new(command: PathBuf, args: Vec<String>) -> Self {
        Self { command, args }
    }

    fn spawn(&self) -> Result<ScriptDocument, EditorError> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|err| {
                warn!(
                    target = "infra::editor::script",
                    op = "editor::spawn",
                    result = "error",
                    command = %self.command.display(),
                    error = %err,
                    "Failed to spawn editor bridge"
                );
                if err.kind() == ErrorKind::NotFound {
                    EditorError::Unavailable(format!(
                        "bridge command `{}` not found",
                        self.command.display()
                    ))
                } else {
                    EditorError::Unavailable(err.to_string())
                }
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(EditorError::Protocol(
                "bridge stdio was not captured".to_string(),
            ));
        };

        Ok(ScriptDocument {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
            finished: false,
        })
    }
}

impl EditorBridge for ScriptEditor {
    fn open(&self, path: &Path) -> Result<Box<dyn EditorDocument>, EditorError> {
        let started_at = Instant::now();
        let mut document = self.spawn()?;

        document
            .call(&BridgeRequest::Open { path })
            .map_err(|err| match err {
                EditorError::Layer(message) => EditorError::Open {
                    path: path.to_path_buf(),
                    message,
                },
                other => other,
            })?;

        info!(
            target = "infra::editor::script",
            op = "editor::open",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            path = %path.display(),
            "Document opened through editor bridge"
        );
        Ok(Box::new(document))
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum BridgeRequest<'a> {
    Open { path: &'a Path },
    LayerKind { name: &'a str },
    SetText { name: &'a str, text: &'a str },
    ExportJpeg { path: &'a Path, quality: u8 },
    Close,
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    ok: bool,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

struct ScriptDocument {
    child: Child,
    // Dropped before waiting on the helper so it sees EOF.
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    finished: bool,
}

impl ScriptDocument {
    /// Send one request and wait for its reply.
    ///
    /// A reply with `ok: false` becomes [`EditorError::Layer`] carrying the
    /// bridge's message; callers re-tag it for session-level commands.
    fn call(&mut self, request: &BridgeRequest<'_>) -> Result<BridgeResponse, EditorError> {
        let mut line = serde_json::to_string(request)
            .map_err(|err| EditorError::Protocol(format!("failed to encode request: {err}")))?;
        line.push('\n');
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| EditorError::Protocol("bridge stdin already closed".to_string()))?;
        stdin.write_all(line.as_bytes())?;
        stdin.flush()?;

        let mut reply = String::new();
        if self.stdout.read_line(&mut reply)? == 0 {
            return Err(EditorError::Protocol(
                "bridge exited before replying".to_string(),
            ));
        }

        let response: BridgeResponse = serde_json::from_str(reply.trim_end()).map_err(|err| {
            EditorError::Protocol(format!("malformed reply `{}`: {err}", reply.trim_end()))
        })?;
        if response.ok {
            Ok(response)
        } else {
            let message = response
                .error
                .unwrap_or_else(|| "bridge reported an unspecified error".to_string());
            debug!(
                target = "infra::editor::script",
                op = "editor::call",
                result = "rejected",
                error = %message,
                "Editor bridge rejected request"
            );
            Err(EditorError::Layer(message))
        }
    }

    fn terminate(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl EditorDocument for ScriptDocument {
    fn layer_kind(&mut self, name: &str) -> Result<LayerKind, EditorError> {
        let response = self.call(&BridgeRequest::LayerKind { name })?;
        let kind = response.kind.ok_or_else(|| {
            EditorError::Protocol(format!("reply for layer `{name}` carried no kind"))
        })?;
        Ok(LayerKind::from_bridge(&kind))
    }

    fn set_text(&mut self, name: &str, text: &str) -> Result<(), EditorError> {
        self.call(&BridgeRequest::SetText { name, text })?;
        Ok(())
    }

    fn export_jpeg(&mut self, output: &Path, quality: u8) -> Result<(), EditorError> {
        self.call(&BridgeRequest::ExportJpeg {
            path: output,
            quality,
        })
        .map_err(|err| match err {
            EditorError::Layer(message) => EditorError::Export(message),
            other => other,
        })?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), EditorError> {
        let result = self.call(&BridgeRequest::Close);
        match result {
            Ok(_) => {
                self.finished = true;
                drop(self.stdin.take());
                let status = self.child.wait()?;
                if !status.success() {
                    warn!(
                        target = "infra::editor::script",
                        op = "editor::close",
                        result = "exit_status",
                        exit_code = status.code().map(i64::from).unwrap_or(-1),
                        "Editor bridge exited unsuccessfully after close"
                    );
                }
                Ok(())
            }
            Err(err) => {
                self.terminate();
                Err(match err {
                    EditorError::Layer(message) => EditorError::Close(message),
                    other => other,
                })
            }
        }
    }
}

impl Drop for ScriptDocument {
    fn drop(&mut self) {
        self.terminate();
    }
}
