use blockwise_protocol::constants::{
    CONTENT_FORMAT_OCTET_STREAM, OPTION_CONTENT_FORMAT, OPTION_MAX_AGE, OPTION_SIZE2,
};
use blockwise_protocol::{BlockDescriptor, BlockError, Code, Message};

use crate::window::Window;

/// Builds the 2.05 response carrying one block.
///
/// Block 0 also advertises the total size in Size2 when the source knew it.
pub fn content_response(
    request: &Message,
    fresh_id: u16,
    seq_num: u32,
    block_size: u16,
    window: Window,
) -> Result<Message, BlockError> {
    let block = BlockDescriptor::new(seq_num, !window.reached_end, block_size);
    let mut response = request.response(Code::CONTENT, fresh_id);
    response.set_uint_option(OPTION_CONTENT_FORMAT, u32::from(CONTENT_FORMAT_OCTET_STREAM));
    response.set_block2(&block)?;
    let total = window
        .total_size
        .filter(|_| seq_num == 0)
        .and_then(|t| u32::try_from(t).ok());
    if let Some(total) = total {
        response.set_uint_option(OPTION_SIZE2, total);
    }
    response.payload = window.data;
    Ok(response)
}

/// Builds an error response, with Max-Age when the client should retry later.
pub fn error_response(
    request: &Message,
    fresh_id: u16,
    code: Code,
    max_age: Option<u32>,
) -> Message {
    let mut response = request.response(code, fresh_id);
    if let Some(seconds) = max_age {
        response.set_uint_option(OPTION_MAX_AGE, seconds);
    }
    response
}
