//! Byte-windowed response body over a transferred descriptor

use hyper::body::{Body, Bytes, Frame, SizeHint};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::{AsyncRead, ReadBuf, Take};

const CHUNK_SIZE: u64 = 64 * 1024;

/// Streaming body over an already-positioned file descriptor.
///
/// The descriptor was seeked and length-limited by
/// [`FileHandle::into_body`](crate::fs::FileHandle::into_body); this body is
/// its sole owner and releases it when the stream ends, errors, or is
/// dropped mid-transfer.
#[derive(Debug)]
pub struct FileBody {
    reader: Take<File>,
}

impl FileBody {
    pub(crate) fn new(reader: Take<File>) -> Self {
        Self { reader }
    }

    /// Bytes not yet handed to the consumer
    pub fn remaining(&self) -> u64 {
        self.reader.limit()
    }
}

impl Body for FileBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let remaining = this.reader.limit();
        if remaining == 0 {
            return Poll::Ready(None);
        }

        let mut chunk = vec![0u8; usize::try_from(remaining.min(CHUNK_SIZE)).unwrap_or(0)];
        let mut buf = ReadBuf::new(&mut chunk);
        match Pin::new(&mut this.reader).poll_read(cx, &mut buf) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(err)) => Poll::Ready(Some(Err(err))),
            Poll::Ready(Ok(())) => {
                let filled = buf.filled().len();
                if filled == 0 {
                    // short file: window overshot the real end
                    return Poll::Ready(None);
                }
                chunk.truncate(filled);
                Poll::Ready(Some(Ok(Frame::data(Bytes::from(chunk)))))
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.reader.limit() == 0
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.reader.limit())
    }
}
