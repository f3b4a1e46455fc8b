//! Spawning a native extension subprocess and performing its handshake.

use super::protocol::{Handshake, CORE_PROTOCOL_VERSION};
use crate::core::StencilError;
use anyhow::{Context, Result};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

/// Env var an extension subprocess must echo back in its handshake line's
/// app-protocol slot to prove it understands this engine's RPC dialect.
pub const MAGIC_COOKIE_ENV: &str = "STENCIL_EXTENSION_MAGIC_COOKIE";
pub const MAGIC_COOKIE_VALUE: &str = "stencil-extension-v1";

pub struct SpawnedExtension {
    pub child: Child,
    pub handshake: Handshake,
}

/// Launch `command` as a subprocess, set the magic-cookie env var, and
/// read its single handshake line from stdout. The child is expected to
/// write exactly one line and then fall silent on stdout until it starts
/// serving RPC connections.
pub async fn spawn(module: &str, command: &str, args: &[String]) -> Result<SpawnedExtension> {
    let mut cmd = Command::new(command);
    cmd.args(args)
        .env(MAGIC_COOKIE_ENV, MAGIC_COOKIE_VALUE)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| StencilError::HandshakeFailed {
        module: module.to_string(),
        reason: format!("failed to spawn '{command}': {e}"),
    })?;

    let stdout = child.stdout.take().context("extension subprocess has no stdout")?;
    let mut reader = BufReader::new(stdout);
    let mut line = String::new();
    let bytes_read =
        reader.read_line(&mut line).await.map_err(|e| StencilError::HandshakeFailed {
            module: module.to_string(),
            reason: format!("failed to read handshake line: {e}"),
        })?;
    if bytes_read == 0 {
        return Err(StencilError::HandshakeFailed {
            module: module.to_string(),
            reason: "subprocess exited before writing a handshake line".to_string(),
        }
        .into());
    }

    let handshake = Handshake::parse(&line).map_err(|reason| StencilError::HandshakeFailed {
        module: module.to_string(),
        reason,
    })?;

    if handshake.core_version != CORE_PROTOCOL_VERSION {
        return Err(StencilError::HandshakeFailed {
            module: module.to_string(),
            reason: format!(
                "unsupported core protocol version {} (engine speaks {CORE_PROTOCOL_VERSION})",
                handshake.core_version
            ),
        }
        .into());
    }

    Ok(SpawnedExtension { child, handshake })
}
