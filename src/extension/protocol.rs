//! Wire format for the handshake line and the RPC messages that follow it.
//!
//! The handshake carries a protocol version, network type, address,
//! protocol name, and an optional TLS certificate, but leaves the
//! concrete transport open; this module resolves that as a
//! pipe-delimited handshake line (the same shape HashiCorp's `go-plugin`
//! uses, which is the de facto standard this kind of subprocess-RPC
//! protocol follows) followed by newline-delimited JSON request/response
//! frames, reusing `serde_json` rather than introducing a second
//! serialization format into the crate.

use crate::value::Value;
use serde::{Deserialize, Serialize};

pub const CORE_PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkType {
    Tcp,
    Unix,
}

impl std::str::FromStr for NetworkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Self::Tcp),
            "unix" => Ok(Self::Unix),
            other => Err(format!("unsupported network type '{other}'")),
        }
    }
}

/// A parsed handshake line: `CORE|APP|NETWORK|ADDRESS|PROTOCOL[|TLS_CERT]`.
#[derive(Debug, Clone)]
pub struct Handshake {
    pub core_version: u32,
    pub app_version: u32,
    pub network: NetworkType,
    pub address: String,
    pub protocol: String,
    pub tls_cert: Option<String>,
}

impl Handshake {
    pub fn parse(line: &str) -> Result<Self, String> {
        let parts: Vec<&str> = line.trim().split('|').collect();
        if parts.len() < 5 {
            return Err(format!("malformed handshake line: '{line}'"));
        }
        let core_version: u32 = parts[0].parse().map_err(|_| "invalid core protocol version".to_string())?;
        let app_version: u32 = parts[1].parse().map_err(|_| "invalid app protocol version".to_string())?;
        let network: NetworkType = parts[2].parse()?;
        let address = parts[3].to_string();
        let protocol = parts[4].to_string();
        let tls_cert = parts.get(5).map(|s| s.to_string());
        Ok(Self {
            core_version,
            app_version,
            network,
            address,
            protocol,
            tls_cert,
        })
    }
}

/// RPC methods a native extension must answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub enum Request {
    GetConfig,
    GetTemplateFunctions,
    ExecuteTemplateFunction { function: String, args: Vec<Value> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tcp_handshake_line() {
        let h = Handshake::parse("1|1|tcp|127.0.0.1:54321|json\n").unwrap();
        assert_eq!(h.network, NetworkType::Tcp);
        assert_eq!(h.address, "127.0.0.1:54321");
        assert!(h.tls_cert.is_none());
    }

    #[test]
    fn parses_unix_handshake_with_tls_cert() {
        let h = Handshake::parse("1|1|unix|/tmp/sock|json|BASE64CERT").unwrap();
        assert_eq!(h.network, NetworkType::Unix);
        assert_eq!(h.tls_cert.as_deref(), Some("BASE64CERT"));
    }

    #[test]
    fn rejects_malformed_line() {
        assert!(Handshake::parse("garbage").is_err());
    }

    #[test]
    fn rejects_unknown_network_type() {
        assert!(Handshake::parse("1|1|carrier-pigeon|addr|json").is_err());
    }
}
