use crate::{
    compact,
    error::{Result, RetargetError},
    types::BlockHeader,
    util::Saveable,
};

use std::io::{Error as IoError, ErrorKind as IoErrorKind, Read, Result as IoResult, Write};

/// Read-only access to headers by height. This is all the retarget engine needs from the chain
/// store.
pub trait HeaderSource {
    fn header_at(&self, height: u64) -> Option<BlockHeader>;

    /// number of headers available, i.e. one past the highest height
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HeaderSource for [BlockHeader] {
    fn header_at(&self, height: u64) -> Option<BlockHeader> {
        usize::try_from(height)
            .ok()
            .and_then(|index| self.get(index))
            .copied()
    }

    fn len(&self) -> u64 {
        <[BlockHeader]>::len(self) as u64
    }
}

impl HeaderSource for Vec<BlockHeader> {
    fn header_at(&self, height: u64) -> Option<BlockHeader> {
        self.as_slice().header_at(height)
    }

    fn len(&self) -> u64 {
        Vec::len(self) as u64
    }
}

/// Snapshot of a chain's headers, indexed by height.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderChain {
    headers: Vec<BlockHeader>,
}

impl HeaderChain {
    pub fn new() -> Self {
        HeaderChain { headers: vec![] }
    }

    /// Build a chain from headers in height order, validating each one.
    pub fn from_headers(headers: impl IntoIterator<Item = BlockHeader>) -> Result<Self> {
        let mut chain = HeaderChain::new();
        for header in headers {
            chain.push(header)?;
        }
        Ok(chain)
    }

    /// Append the next header. Its height must follow the tip and its bits must decode.
    pub fn push(&mut self, header: BlockHeader) -> Result<()> {
        let expected = self.headers.len() as u64;
        if header.height != expected {
            return Err(RetargetError::invalid_header(
                header.height,
                format!("expected height {expected}"),
            ));
        }

        if let Err(e) = compact::decode(header.bits) {
            return Err(RetargetError::invalid_header(header.height, e.to_string()));
        }

        self.headers.push(header);
        Ok(())
    }

    pub fn tip(&self) -> Option<&BlockHeader> {
        self.headers.last()
    }

    /// the height the next header would get
    pub fn next_height(&self) -> u64 {
        self.headers.len() as u64
    }
}

impl HeaderSource for HeaderChain {
    fn header_at(&self, height: u64) -> Option<BlockHeader> {
        self.headers.as_slice().header_at(height)
    }

    fn len(&self) -> u64 {
        self.headers.len() as u64
    }
}

impl Saveable for HeaderChain {
    fn load<I: Read>(reader: I) -> IoResult<Self> {
        let headers: Vec<BlockHeader> = ciborium::de::from_reader(reader)
            .map_err(|_| IoError::new(IoErrorKind::InvalidData, "Failed to deserialize HeaderChain"))?;
        // files come from outside, hold them to the same rules as push
        HeaderChain::from_headers(headers)
            .map_err(|e| IoError::new(IoErrorKind::InvalidData, e.to_string()))
    }
    fn save<O: Write>(&self, writer: O) -> IoResult<()> {
        ciborium::ser::into_writer(&self.headers, writer)
            .map_err(|_| IoError::new(IoErrorKind::InvalidData, "Failed to serialize HeaderChain"))
    }
}
