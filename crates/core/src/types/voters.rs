use sha2::{Digest, Sha256};

/// Size in bytes of the persisted voter fingerprint.
pub const VOTERS_LEN: usize = 256;

const BIT_WIDTH: u16 = (VOTERS_LEN * 8) as u16;
const HASH_COUNT: usize = 11;

/// Bloom filter of the remote addresses that already interacted with a comment.
///
/// 2048 bits and 11 hash slices keep the false-positive rate around 1e-5 below
/// 80 elements, 1e-4 below 105 and 1e-3 below 142, while staying small enough
/// to be stored next to every comment row.
///
/// The filter cannot report its own cardinality, so the element count travels
/// separately and is handed back to [`VoterSet::recover_from`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoterSet {
    bits: [u8; VOTERS_LEN],
    len: usize,
}

impl Default for VoterSet {
    fn default() -> Self {
        Self::new()
    }
}

impl VoterSet {
    pub fn new() -> Self {
        Self {
            bits: [0; VOTERS_LEN],
            len: 0,
        }
    }

    /// Rebuilds a filter from persisted bytes. Returns `None` when the buffer
    /// does not have the expected size.
    pub fn recover_from(bytes: &[u8], len: usize) -> Option<Self> {
        let bits: [u8; VOTERS_LEN] = bytes.try_into().ok()?;
        Some(Self { bits, len })
    }

    pub fn add(&mut self, element: &[u8]) {
        for position in positions(element) {
            self.bits[usize::from(position / 8)] |= 1 << (position % 8);
        }
        self.len += 1;
    }

    pub fn contains(&self, element: &[u8]) -> bool {
        positions(element)
            .iter()
            .all(|position| self.bits[usize::from(position / 8)] & (1 << (position % 8)) != 0)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8; VOTERS_LEN] {
        &self.bits
    }
}

fn positions(element: &[u8]) -> [u16; HASH_COUNT] {
    let mut digest: [u8; 32] = Sha256::digest(element).into();
    let mut out = [0u16; HASH_COUNT];
    for slot in out.iter_mut() {
        let low = u16::from_be_bytes([digest[30], digest[31]]);
        *slot = low & (BIT_WIDTH - 1);
        shift_right(&mut digest, HASH_COUNT as u32);
    }
    out
}

/// Shifts a big-endian 256-bit integer right by `bits`.
fn shift_right(data: &mut [u8; 32], bits: u32) {
    let byte_shift = (bits / 8) as usize;
    let bit_shift = bits % 8;
    let mut shifted = [0u8; 32];
    for index in (byte_shift..data.len()).rev() {
        let source = index - byte_shift;
        let mut value = data[source] >> bit_shift;
        if bit_shift > 0 && source > 0 {
            value |= data[source - 1] << (8 - bit_shift);
        }
        shifted[index] = value;
    }
    *data = shifted;
}
