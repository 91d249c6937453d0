//! Bincode dumps of a built index, as written by `count` and read back by the other tools.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::IndexError;
use crate::hashing::KmerHasher;
use crate::index::{Built, KmerIndex};

const BUFFER_SIZE: usize = 1 << 23;

pub fn dump<P: AsRef<Path>>(index: &KmerIndex<Built>, path: P) -> Result<(), IndexError> {
    let mut out = BufWriter::with_capacity(BUFFER_SIZE, File::create(path)?);
    bincode::serialize_into(&mut out, index)?;
    out.flush()?;
    Ok(())
}

/// Reads back an index written by [`dump`].
/// Keys only make sense under the hasher that produced them, so a dump built with
/// another k or another hash function is rejected.
pub fn load<P: AsRef<Path>>(path: P, expected: &KmerHasher) -> Result<KmerIndex<Built>, IndexError> {
    let input = BufReader::with_capacity(BUFFER_SIZE, File::open(path)?);
    let index: KmerIndex<Built> = bincode::deserialize_from(input)?;
    if index.hasher() != expected {
        return Err(IndexError::HasherMismatch {
            expected: *expected,
            found: *index.hasher(),
        });
    }
    Ok(index)
}
