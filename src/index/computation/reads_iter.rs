use needletail::errors::ParseError;
use needletail::FastxReader;

/// Upper-cased sequences of a FASTA/FASTQ reader, one record at a time.
pub struct ReadsIter {
    data: Box<dyn FastxReader>,
}

impl ReadsIter {
    pub fn new(data: Box<dyn FastxReader>) -> Self {
        Self { data }
    }
}

impl Iterator for ReadsIter {
    type Item = Result<Vec<u8>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.data.next()? {
            Ok(record) => record,
            Err(error) => return Some(Err(error)),
        };
        Some(Ok(record.seq().to_ascii_uppercase()))
    }
}
