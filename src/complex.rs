use byte_slice_cast::AsMutSliceOf;
pub use num_complex::Complex;

use crate::error::{Error, Result};

/// One I/Q pair as delivered by the radio (SC16)
pub type IqSample = Complex<i16>;

/// Size of one I/Q pair on disk
pub const BYTES_PER_SAMPLE: usize = std::mem::size_of::<IqSample>();

/// View a raw byte region as I/Q pairs, in place.
///
/// The region must be aligned for `i16` and hold a whole number of pairs.
/// Samples are stored in host byte order, which is little-endian on every
/// platform we capture on.
pub fn as_samples_mut(bytes: &mut [u8]) -> Result<&mut [IqSample]> {
    let len = bytes.len() as u64;
    let words = bytes
        .as_mut_slice_of::<i16>()
        .map_err(|_| Error::InvalidLength { len, capacity: len })?;
    if words.len() % 2 != 0 {
        return Err(Error::InvalidLength { len, capacity: len });
    }
    let pairs = words.len() / 2;
    // Safety: Complex<i16> is repr(C) { re: i16, im: i16 }, so it has the
    // alignment of i16 and the size of two of them. The length was checked above.
    Ok(unsafe { std::slice::from_raw_parts_mut(words.as_mut_ptr().cast::<IqSample>(), pairs) })
}

/// Bytes occupied by `n` samples
pub const fn sample_bytes(n: usize) -> u64 {
    (n * BYTES_PER_SAMPLE) as u64
}
