use blockwise_protocol::constants::{
    OPTION_ACCEPT, OPTION_BLOCK2, OPTION_SIZE2, OPTION_URI_HOST, OPTION_URI_PATH, OPTION_URI_PORT,
    OPTION_URI_QUERY,
};
use blockwise_protocol::{BlockDescriptor, Code, Message, ResourcePath};

use crate::admission::Rejection;

/// Options a plain block-wise read may carry.
const READ_OPTIONS: [u16; 7] = [
    OPTION_URI_HOST,
    OPTION_URI_PORT,
    OPTION_URI_PATH,
    OPTION_URI_QUERY,
    OPTION_ACCEPT,
    OPTION_BLOCK2,
    OPTION_SIZE2,
];

/// What makes a request something other than a plain read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Foreign {
    /// Method other than GET.
    Method(Code),
    /// Critical (odd-numbered) option outside the read set, such as Block1.
    Option(u16),
    /// A read carrying a payload.
    Payload,
    /// Elective (even-numbered) option outside the read set, such as Observe
    /// or ETag.
    ElectiveOption(u16),
}

impl Foreign {
    /// Returns `true` if a server that does not understand this part may
    /// ignore it (RFC 7252 section 5.4.1).
    pub fn is_elective(&self) -> bool {
        matches!(self, Foreign::ElectiveOption(_))
    }
}

/// A request reduced to what admission looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRequest {
    pub resource: ResourcePath,
    pub block2: Option<BlockDescriptor>,
    pub foreign: Option<Foreign>,
}

impl BlockRequest {
    /// A plain read of `resource`, optionally naming a block.
    pub fn read(resource: ResourcePath, block2: Option<BlockDescriptor>) -> Self {
        Self {
            resource,
            block2,
            foreign: None,
        }
    }
}

/// Parses the parts of `request` the engine cares about.
///
/// Undecodable Uri-Path or Block2 options are rejected here, before any
/// admission decision is made.
pub fn classify(request: &Message) -> Result<BlockRequest, Rejection> {
    let resource = request
        .uri_path()
        .map_err(|e| Rejection::MalformedOption(e.to_string()))?;
    let block2 = request
        .block2()
        .map_err(|e| Rejection::MalformedOption(e.to_string()))?;

    Ok(BlockRequest {
        resource,
        block2,
        foreign: foreign_part(request),
    })
}

fn foreign_part(request: &Message) -> Option<Foreign> {
    if request.code != Code::GET {
        return Some(Foreign::Method(request.code));
    }
    let mut unknown = request
        .options
        .iter()
        .map(|opt| opt.number)
        .filter(|number| !READ_OPTIONS.contains(number));
    let first_unknown = unknown.next();
    let critical = first_unknown
        .into_iter()
        .chain(unknown)
        .find(|number| number % 2 == 1);
    if let Some(number) = critical {
        return Some(Foreign::Option(number));
    }
    if !request.payload.is_empty() {
        return Some(Foreign::Payload);
    }
    first_unknown.map(Foreign::ElectiveOption)
}
