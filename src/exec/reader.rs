// src/exec/reader.rs

//! Pipe readers: one per captured stream.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use super::controller::Shared;
use super::listener::{Listener, OutputChannel};

/// Size of the buffer used when draining a pipe.
pub const READ_CHUNK_SIZE: usize = 8192;

/// Forward everything read from `stream` to the listener until end of stream.
///
/// A read error ends this reader only; a dying process legitimately closes
/// its pipes. A kill request also ends it, since a grandchild holding the
/// pipe open could otherwise keep the reader alive forever.
pub(crate) async fn forward_stream<R>(
    mut stream: R,
    channel: OutputChannel,
    listener: Arc<dyn Listener>,
    shared: Arc<Shared>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let n = tokio::select! {
            res = stream.read(&mut buf) => match res {
                Ok(0) => {
                    debug!(%channel, "end of stream");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    debug!(%channel, error = %e, "read failed; treating as end of stream");
                    break;
                }
            },
            () = shared.killed() => {
                debug!(%channel, "kill requested; reader stopping");
                break;
            }
        };

        if shared.is_killed() {
            break;
        }
        listener.on_data(channel, &buf[..n]);
    }
}
