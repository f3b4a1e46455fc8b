//! The native extension host: out-of-process modules that provide
//! additional template functions over an RPC connection.
//!
//! A module typed `extension` ships an executable. The
//! engine spawns it, performs a magic-cookie handshake on stdout, then
//! connects to the address the handshake advertised (TCP or Unix domain
//! socket) and speaks newline-delimited JSON requests/responses for the
//! rest of the process's life. The connection is established lazily, the
//! first time a template actually calls one of the extension's functions
//! — most renders never touch most extensions.

pub mod process;
pub mod protocol;

use crate::core::StencilError;
use crate::value::Value;
use anyhow::{Context, Result};
use protocol::{Request, Response};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, UnixStream};
use tokio::process::Child;
use tokio::sync::Mutex;

trait Transport: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send {}
impl<T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send> Transport for T {}

/// A declared but not-yet-connected extension module.
pub struct ExtensionSpec {
    pub module: String,
    pub command: PathBuf,
    pub args: Vec<String>,
}

enum ConnectionState {
    NotConnected,
    Connected {
        child: Child,
        transport: Box<dyn Transport>,
    },
}

/// A handle to one extension module. Connection happens lazily inside
/// [`Self::call`]; cheap to construct for every resolved extension module
/// up front.
pub struct ExtensionHost {
    spec: ExtensionSpec,
    state: Mutex<ConnectionState>,
    next_id: AtomicU64,
}

impl ExtensionHost {
    pub fn new(spec: ExtensionSpec) -> Self {
        Self {
            spec,
            state: Mutex::new(ConnectionState::NotConnected),
            next_id: AtomicU64::new(1),
        }
    }

    /// Send one RPC request and await its response, connecting on first
    /// use and surfacing a subprocess crash as
    /// [`StencilError::ExtensionCrashed`].
    pub async fn call(&self, request: Request) -> Result<serde_json::Value> {
        let mut guard = self.state.lock().await;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        // Borrow-split: connect first (may replace the state), then talk
        // to the now-established transport within the same lock hold so
        // responses can't interleave across concurrent callers.
        if matches!(*guard, ConnectionState::NotConnected) {
            let spawned = process::spawn(&self.spec.module, &self.spec.command.to_string_lossy(), &self.spec.args)
                .await?;
            let transport: Box<dyn Transport> = match spawned.handshake.network {
                protocol::NetworkType::Tcp => {
                    Box::new(TcpStream::connect(&spawned.handshake.address).await.map_err(|e| {
                        StencilError::ExtensionTransportError {
                            module: self.spec.module.clone(),
                            reason: format!("tcp connect to {} failed: {e}", spawned.handshake.address),
                        }
                    })?)
                }
                protocol::NetworkType::Unix => {
                    Box::new(UnixStream::connect(&spawned.handshake.address).await.map_err(|e| {
                        StencilError::ExtensionTransportError {
                            module: self.spec.module.clone(),
                            reason: format!("unix connect to {} failed: {e}", spawned.handshake.address),
                        }
                    })?)
                }
            };
            *guard = ConnectionState::Connected {
                child: spawned.child,
                transport,
            };
        }

        let ConnectionState::Connected { child, transport } = &mut *guard else {
            unreachable!("connected above");
        };

        if let Ok(Some(status)) = child.try_wait() {
            return Err(StencilError::ExtensionCrashed {
                module: self.spec.module.clone(),
                reason: format!("subprocess exited with {status}"),
            }
            .into());
        }

        #[derive(serde::Serialize)]
        struct Envelope<'a> {
            id: u64,
            #[serde(flatten)]
            request: &'a Request,
        }
        let mut line = serde_json::to_vec(&Envelope { id, request: &request })
            .context("failed to serialize extension request")?;
        line.push(b'\n');
        transport.write_all(&line).await.map_err(|e| StencilError::ExtensionTransportError {
            module: self.spec.module.clone(),
            reason: e.to_string(),
        })?;

        let mut reader = BufReader::new(&mut *transport);
        let mut response_line = String::new();
        let bytes_read = reader.read_line(&mut response_line).await.map_err(|e| {
            StencilError::ExtensionTransportError {
                module: self.spec.module.clone(),
                reason: e.to_string(),
            }
        })?;
        if bytes_read == 0 {
            return Err(StencilError::ExtensionCrashed {
                module: self.spec.module.clone(),
                reason: "connection closed without a response".to_string(),
            }
            .into());
        }

        let response: Response = serde_json::from_str(response_line.trim()).map_err(|e| {
            StencilError::ExtensionTransportError {
                module: self.spec.module.clone(),
                reason: format!("malformed response: {e}"),
            }
        })?;

        if let Some(error) = response.error {
            return Err(StencilError::ExtensionFunctionError {
                module: self.spec.module.clone(),
                function: "<rpc>".to_string(),
                reason: error,
            }
            .into());
        }
        Ok(response.result.unwrap_or(serde_json::Value::Null))
    }

    /// `GetConfig` — the extension's self-reported configuration. Nothing
    /// in the template runtime currently consumes it, so this just exposes the raw response for a future
    /// caller rather than guessing at a schema.
    pub async fn get_config(&self) -> Result<serde_json::Value> {
        self.call(Request::GetConfig).await
    }

    pub async fn get_template_functions(&self) -> Result<Vec<String>> {
        let result = self.call(Request::GetTemplateFunctions).await?;
        let names: Vec<String> = serde_json::from_value(result)
            .context("GetTemplateFunctions did not return a string array")?;
        Ok(names)
    }

    pub async fn execute_template_function(&self, function: &str, args: Vec<Value>) -> Result<Value> {
        let result = self
            .call(Request::ExecuteTemplateFunction {
                function: function.to_string(),
                args,
            })
            .await?;
        Ok(Value::from_json(&result))
    }
}
