//! Nucleotide encodings shared by the hashers, the index and the graph.

/// Order in which neighbours of a k-mer are enumerated.
pub const NUCLEOTIDES: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// Largest k for which a k-mer fits in a `u64` with 2 bits per base
/// (one bit is left unused so keys stay below `i64::MAX`).
pub const MAX_PACKED_K: usize = 31;

const NO_BASE: u8 = u8::MAX;

const ENCODING_TAB: [u8; 256] = {
    let mut tab = [NO_BASE; 256];
    tab[b'A' as usize] = 0;
    tab[b'C' as usize] = 1;
    tab[b'G' as usize] = 2;
    tab[b'T' as usize] = 3;
    tab
};

/// Same codes as the encoding table, with every other byte mapped to 0.
pub const ENCODING_TAB_MASKED: [u8; 256] = {
    let mut tab = [0; 256];
    tab[b'C' as usize] = 1;
    tab[b'G' as usize] = 2;
    tab[b'T' as usize] = 3;
    tab
};

const REVCOMP_TAB: [u8; 256] = {
    let mut tab = [b'N'; 256];
    tab[b'A' as usize] = b'T';
    tab[b'T' as usize] = b'A';
    tab[b'C' as usize] = b'G';
    tab[b'G' as usize] = b'C';
    tab
};

#[inline]
pub fn is_acgt(seq: &[u8]) -> bool {
    seq.iter().all(|c| ENCODING_TAB[*c as usize] != NO_BASE)
}

pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|base| REVCOMP_TAB[*base as usize]).collect()
}

/// Returns the lexicographically smaller of `kmer` and its reverse complement.
pub fn canonical(kmer: &[u8]) -> Vec<u8> {
    let rc = reverse_complement(kmer);
    if kmer < rc.as_slice() {
        kmer.to_vec()
    } else {
        rc
    }
}

/// Packs a window of at most [`MAX_PACKED_K`] bases, forward and reverse complement,
/// and returns the smaller value. Non ACGT bases are not expected here.
pub fn encode_canonical(window: &[u8]) -> u64 {
    debug_assert!(window.len() <= MAX_PACKED_K);
    let mut forward = 0u64;
    let mut reverse = 0u64;
    for (i, base) in window.iter().enumerate() {
        let code = u64::from(ENCODING_TAB_MASKED[*base as usize]);
        forward = (forward << 2) | code;
        // the complement of the i-th base is the (k-1-i)-th base of the reverse complement
        reverse |= (3 ^ code) << (2 * i);
    }
    forward.min(reverse)
}

/// Splits `sequence` into its maximal runs of ACGT bases.
pub fn acgt_fragments(sequence: &[u8]) -> impl Iterator<Item = &[u8]> {
    sequence
        .split(|c| ENCODING_TAB[*c as usize] == NO_BASE)
        .filter(|fragment| !fragment.is_empty())
}

/// The 4 k-mers obtained by dropping the last base and prepending each nucleotide.
pub fn left_neighbors(kmer: &[u8]) -> [Vec<u8>; 4] {
    NUCLEOTIDES.map(|nuc| {
        let mut neighbor = Vec::with_capacity(kmer.len());
        neighbor.push(nuc);
        neighbor.extend_from_slice(&kmer[..kmer.len() - 1]);
        neighbor
    })
}

/// The 4 k-mers obtained by dropping the first base and appending each nucleotide.
pub fn right_neighbors(kmer: &[u8]) -> [Vec<u8>; 4] {
    NUCLEOTIDES.map(|nuc| {
        let mut neighbor = Vec::with_capacity(kmer.len());
        neighbor.extend_from_slice(&kmer[1..]);
        neighbor.push(nuc);
        neighbor
    })
}

/// Left and right neighbours interleaved: `left[0], right[0], left[1], ...`
pub fn all_neighbors(kmer: &[u8]) -> Vec<Vec<u8>> {
    let left = left_neighbors(kmer);
    let right = right_neighbors(kmer);
    left.into_iter()
        .zip(right)
        .flat_map(|(l, r)| [l, r])
        .collect()
}

/// `first k` + `...` + `last k` for long sequences, used in log messages.
pub fn shorten_label(label: &[u8], k: usize) -> String {
    if label.len() >= 2 * k {
        format!(
            "{}...{} (length={})",
            String::from_utf8_lossy(&label[..k]),
            String::from_utf8_lossy(&label[label.len() - k..]),
            label.len()
        )
    } else {
        String::from_utf8_lossy(label).into_owned()
    }
}
