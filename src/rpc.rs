//! RPC front-end: newline-delimited JSON over TCP.
//!
//! Each request line is `{"method": "SendCommand", "params": <CollarRequest>}`
//! and is answered by exactly one line, either `{"result": {}}` or
//! `{"error": {"code": "InvalidArgument", "message": "..."}}`. A connection
//! may carry any number of requests; they are handled in order.

use crate::error::Result;
use crate::remote::Remote;
use crate::request::{CollarRequest, CollarResponse};
use crate::transmitter::{Cancellation, Transmitter};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

pub const SEND_COMMAND: &str = "SendCommand";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcCode {
    InvalidArgument,
    Internal,
    Unimplemented,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: RpcCode,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcResponse {
    Result(CollarResponse),
    Error(RpcError),
}

impl RpcResponse {
    fn error(code: RpcCode, message: impl Display) -> Self {
        RpcResponse::Error(RpcError {
            code,
            message: message.to_string(),
        })
    }
}

pub struct RpcServer<T> {
    remote: Arc<Remote<T>>,
    cancel: Cancellation,
}

impl<T: Transmitter> RpcServer<T> {
    pub fn new(remote: Arc<Remote<T>>, cancel: Cancellation) -> Self {
        Self { remote, cancel }
    }

    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> io::Result<()> {
        info!("RPC server listening on {}", listener.local_addr()?);
        loop {
            let (stream, peer) = listener.accept().await?;
            let server = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(err) = server.handle_connection(stream).await {
                    debug!("RPC connection from {} failed: {}", peer, err);
                }
            });
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream) -> io::Result<()> {
        let (reader, mut writer) = stream.split();
        let mut lines = BufReader::new(reader).lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let response = self.dispatch(&line).await;
            let mut out = serde_json::to_vec(&response)?;
            out.push(b'\n');
            writer.write_all(&out).await?;
            writer.flush().await?;
        }
        Ok(())
    }

    /// Decode and run one request line.
    pub async fn dispatch(&self, line: &str) -> RpcResponse {
        let request: RpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(err) => return RpcResponse::error(RpcCode::InvalidArgument, err),
        };

        if request.method != SEND_COMMAND {
            return RpcResponse::error(
                RpcCode::Unimplemented,
                format!("unknown method {:?}", request.method),
            );
        }

        let params: CollarRequest = match serde_json::from_value(request.params) {
            Ok(params) => params,
            Err(err) => return RpcResponse::error(RpcCode::InvalidArgument, err),
        };

        match self.send_command(params).await {
            Ok(response) => RpcResponse::Result(response),
            Err(err) if err.is_bad_request() => {
                warn!("rejected RPC command: {}", err);
                RpcResponse::error(RpcCode::InvalidArgument, err)
            }
            Err(err) => {
                warn!("RPC command failed: {}", err);
                RpcResponse::error(RpcCode::Internal, err)
            }
        }
    }

    pub async fn send_command(&self, request: CollarRequest) -> Result<CollarResponse> {
        debug!("{}: {}", SEND_COMMAND, request);
        self.remote.send(request.command(), &self.cancel).await?;
        Ok(CollarResponse {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_encoding() {
        let ok = serde_json::to_string(&RpcResponse::Result(CollarResponse {})).unwrap();
        assert_eq!(ok, r#"{"result":{}}"#);

        let err = serde_json::to_string(&RpcResponse::error(RpcCode::InvalidArgument, "bad")).unwrap();
        assert_eq!(err, r#"{"error":{"code":"InvalidArgument","message":"bad"}}"#);
    }

    #[test]
    fn test_request_decoding() {
        let request: RpcRequest = serde_json::from_str(
            r#"{"method":"SendCommand","params":{"type":"NICK","intensity":2}}"#,
        )
        .unwrap();
        assert_eq!(request.method, SEND_COMMAND);
        let params: CollarRequest = serde_json::from_value(request.params).unwrap();
        assert_eq!(params.intensity, 2);
    }
}
