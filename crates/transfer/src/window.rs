use blockwise_protocol::ResourcePath;

use crate::TransferError;
use crate::source::{ResourceSource, ResourceStream};

/// Bytes read for one block, plus whether the resource ends with them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub data: Vec<u8>,
    /// No byte exists past the end of `data`.
    pub reached_end: bool,
    /// Total resource length, if the stream knew it up front.
    pub total_size: Option<u64>,
}

/// Reads `[offset, offset + length)` of `resource`.
///
/// The stream is opened fresh, positioned with [`ResourceStream::skip`] and
/// consumed until one byte past the window is seen (or the stream ends), so
/// the result does not depend on how the source slices its bursts.
pub fn read_window(
    source: &dyn ResourceSource,
    resource: &ResourcePath,
    offset: u64,
    length: usize,
) -> Result<Window, TransferError> {
    let mut stream = source.open(resource)?;
    let total_size = stream.size_hint();
    let mut data = Vec::with_capacity(length);

    let mut burst = stream.skip(offset)?;
    loop {
        let wanted = length - data.len();
        if burst.len() > wanted {
            data.extend_from_slice(&burst[..wanted]);
            return Ok(Window {
                data,
                reached_end: false,
                total_size,
            });
        }
        data.extend_from_slice(&burst);
        if data.len() == length {
            let reached_end = !has_more_bytes(stream.as_mut())?;
            return Ok(Window {
                data,
                reached_end,
                total_size,
            });
        }
        match stream.next_burst()? {
            Some(next) => burst = next,
            None => break,
        }
    }

    Ok(Window {
        data,
        reached_end: true,
        total_size,
    })
}

fn has_more_bytes(stream: &mut dyn ResourceStream) -> Result<bool, TransferError> {
    while let Some(burst) = stream.next_burst()? {
        if !burst.is_empty() {
            return Ok(true);
        }
    }
    Ok(false)
}
