//! TCP put server (receiving side).
//!
//! Accepts connections until cancelled, one task per connection. Each
//! connection authenticates with the token and carries exactly one put
//! session: open, contents*, hash, end-of-stream. The file is written
//! under the server root and only kept if the digest matches.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use fileput_protocol::constants::{AUTH_TIMEOUT, MAX_PERMISSIONS};
use fileput_protocol::wire::{read_request, read_token, write_auth_response, write_response};
use fileput_protocol::{HashMethod, PutDetails, PutRequest, PutResponse};
use fileput_transfer::{DigestAccumulator, validate_remote_path};

use crate::error::DataChannelError;
use crate::token::{generate_token, is_well_formed, validate_token};
use crate::{FRAME_TIMEOUT, TCP_BUFFER_SIZE};

/// Address and token clients need to reach the server.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub addr: SocketAddr,
    pub token: String,
}

/// A file that was received and verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    pub path: PathBuf,
    pub bytes: u64,
    pub method: HashMethod,
}

/// TCP server that receives put sessions.
pub struct TcpPutServer {
    root: PathBuf,
    token: String,
    cancel: CancellationToken,
}

impl TcpPutServer {
    pub fn new(
        root: PathBuf,
        token: String,
        cancel: CancellationToken,
    ) -> Result<Self, DataChannelError> {
        if !is_well_formed(&token) {
            return Err(DataChannelError::InvalidToken(
                "server token must be 32 hex characters".into(),
            ));
        }
        Ok(Self {
            root,
            token,
            cancel,
        })
    }

    /// Creates a server with a freshly generated token.
    pub fn with_generated_token(root: PathBuf, cancel: CancellationToken) -> Self {
        Self {
            root,
            token: generate_token(),
            cancel,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Binds the listener.
    ///
    /// Returns the bound address (useful with port 0) and the token.
    pub async fn bind(
        &self,
        addr: impl ToSocketAddrs,
    ) -> Result<(ServerInfo, TcpListener), DataChannelError> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        info!(%addr, root = %self.root.display(), "put server listening");
        Ok((
            ServerInfo {
                addr,
                token: self.token.clone(),
            },
            listener,
        ))
    }

    /// Accepts connections until cancelled.
    ///
    /// In-flight sessions see the cancellation too and are awaited
    /// before returning.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), DataChannelError> {
        let mut sessions = JoinSet::new();

        loop {
            let (stream, peer) = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                Some(_) = sessions.join_next(), if !sessions.is_empty() => continue,
                result = listener.accept() => match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                },
            };

            debug!(%peer, "connection accepted");
            let root = self.root.clone();
            let token = self.token.clone();
            let cancel = self.cancel.child_token();
            sessions.spawn(async move {
                match handle_connection(stream, &root, &token, &cancel).await {
                    Ok(file) => info!(
                        %peer,
                        path = %file.path.display(),
                        bytes = file.bytes,
                        method = %file.method,
                        "file received"
                    ),
                    Err(e) => error!(%peer, error = %e, "put session failed"),
                }
            });
        }

        drop(listener);
        while sessions.join_next().await.is_some() {}
        info!("put server stopped");
        Ok(())
    }
}

/// Runs one connection: handshake, session, terminal response.
async fn handle_connection(
    stream: TcpStream,
    root: &Path,
    token: &str,
    cancel: &CancellationToken,
) -> Result<ReceivedFile, DataChannelError> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::with_capacity(TCP_BUFFER_SIZE, reader);

    authenticate(&mut reader, &mut writer, token, cancel).await?;

    match receive_file(&mut reader, root, cancel).await {
        Ok(file) => {
            write_response(&mut writer, &PutResponse::ok("")).await?;
            Ok(file)
        }
        Err(e) => {
            // The peer may already be gone.
            let _ = write_response(&mut writer, &PutResponse::rejected(e.to_string())).await;
            Err(e)
        }
    }
}

async fn authenticate<R, W>(
    reader: &mut R,
    writer: &mut W,
    expected: &str,
    cancel: &CancellationToken,
) -> Result<(), DataChannelError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let received = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(DataChannelError::Cancelled),
        result = tokio::time::timeout(AUTH_TIMEOUT, read_token(reader)) => match result {
            Ok(Ok(t)) => t,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(DataChannelError::Timeout),
        },
    };

    if !validate_token(&received, expected) {
        warn!("invalid token");
        write_auth_response(writer, false).await?;
        return Err(DataChannelError::AuthFailed("invalid token".into()));
    }
    write_auth_response(writer, true).await?;
    Ok(())
}

/// Receives one session and writes the file under `root`.
///
/// Data lands in a hidden partial file that is renamed over the
/// destination once verified, and removed on any failure.
async fn receive_file<R: AsyncRead + Unpin>(
    reader: &mut R,
    root: &Path,
    cancel: &CancellationToken,
) -> Result<ReceivedFile, DataChannelError> {
    let details = match next_frame(reader, cancel).await? {
        Some(PutRequest::Open(details)) => details,
        Some(other) => {
            return Err(DataChannelError::Protocol(format!(
                "expected open, got {}",
                other.kind()
            )));
        }
        None => return Err(DataChannelError::Protocol("stream ended before open".into())),
    };

    validate_remote_path(&details.remote_file)
        .map_err(|e| DataChannelError::InvalidPath(e.to_string()))?;
    if details.permissions > MAX_PERMISSIONS {
        return Err(DataChannelError::Protocol(format!(
            "permission bits {:#o} out of range",
            details.permissions
        )));
    }

    let path = root.join(&details.remote_file);
    let partial = partial_path(&path)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(&partial).await?;
    debug!(
        path = %path.display(),
        partial = %partial.display(),
        permissions = details.permissions,
        "receiving file"
    );

    let mut result = receive_body(reader, &mut file, &details, &partial, cancel).await;
    drop(file);

    // Only a verified file replaces what is already at the destination.
    if result.is_ok()
        && let Err(e) = tokio::fs::rename(&partial, &path).await
    {
        result = Err(e.into());
    }

    match result {
        Ok((bytes, method)) => Ok(ReceivedFile {
            path,
            bytes,
            method,
        }),
        Err(e) => {
            if let Err(rm) = tokio::fs::remove_file(&partial).await {
                warn!(path = %partial.display(), error = %rm, "cannot remove partial file");
            }
            Err(e)
        }
    }
}

/// Hidden sibling the upload is written to before it is verified.
///
/// The random suffix keeps concurrent uploads of the same name apart.
fn partial_path(path: &Path) -> Result<PathBuf, DataChannelError> {
    let name = path
        .file_name()
        .ok_or_else(|| DataChannelError::InvalidPath(format!("no file name in {}", path.display())))?;
    let token = generate_token();
    Ok(path.with_file_name(format!(
        ".{}.{}.partial",
        name.to_string_lossy(),
        &token[..8]
    )))
}

async fn receive_body<R: AsyncRead + Unpin>(
    reader: &mut R,
    file: &mut tokio::fs::File,
    details: &PutDetails,
    path: &Path,
    cancel: &CancellationToken,
) -> Result<(u64, HashMethod), DataChannelError> {
    // The digest method only arrives at the end, so hash with all of them.
    let mut digests: Vec<DigestAccumulator> = [HashMethod::Md5, HashMethod::Sha256, HashMethod::Sha512]
        .into_iter()
        .map(DigestAccumulator::new)
        .collect();
    let mut bytes: u64 = 0;

    let expected = loop {
        match next_frame(reader, cancel).await? {
            Some(PutRequest::Contents(data)) => {
                file.write_all(&data).await?;
                for digest in &mut digests {
                    digest.update(&data);
                }
                bytes += data.len() as u64;
            }
            Some(PutRequest::Hash(hash)) => break hash,
            Some(PutRequest::Open(_)) => {
                return Err(DataChannelError::Protocol("duplicate open".into()));
            }
            None => return Err(DataChannelError::Protocol("stream ended before hash".into())),
        }
    };

    if next_frame(reader, cancel).await?.is_some() {
        return Err(DataChannelError::Protocol(
            "expected end of stream after hash".into(),
        ));
    }
    file.flush().await?;

    let actual = digests
        .into_iter()
        .find(|d| d.method() == expected.method)
        .map(DigestAccumulator::finalize)
        .ok_or_else(|| DataChannelError::Protocol("unsupported digest method".into()))?;
    if actual.hash != expected.hash {
        return Err(DataChannelError::DigestMismatch {
            expected: hex::encode(&expected.hash),
            actual: hex::encode(&actual.hash),
        });
    }

    apply_permissions(path, details.permissions).await?;
    Ok((bytes, expected.method))
}

async fn next_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    cancel: &CancellationToken,
) -> Result<Option<PutRequest>, DataChannelError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DataChannelError::Cancelled),
        result = tokio::time::timeout(FRAME_TIMEOUT, read_request(reader)) => match result {
            Ok(frame) => Ok(frame?),
            Err(_) => Err(DataChannelError::Timeout),
        },
    }
}

#[cfg(unix)]
async fn apply_permissions(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await
}

#[cfg(not(unix))]
async fn apply_permissions(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}
