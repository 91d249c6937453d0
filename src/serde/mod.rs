pub mod bin;
pub mod fasta;
pub mod gfa;
pub mod tsv;

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::error::GraphFileError;

fn io_error(path: &Path) -> impl Fn(std::io::Error) -> GraphFileError + '_ {
    move |source| GraphFileError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn create(path: &Path) -> Result<BufWriter<File>, GraphFileError> {
    Ok(BufWriter::new(File::create(path).map_err(io_error(path))?))
}
