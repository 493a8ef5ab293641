//! Word-granularity buffer moves.
//!
//! Scanline data is always a whole number of DMA words, so moves between
//! pixmap rows and ring slots stay on `u32` boundaries. The heavy streaming
//! in this crate belongs to the DMA controller; the routine here only backs
//! the direct-color renderer and setup-time fills, where a plain slice copy
//! meets the budget on either core.

/// Moves `source` into `dest`, word by word.
///
/// Both slices must have the same length; mismatched lengths are a caller
/// bug and panic. Callers that slice both sides with the same bounds pay
/// nothing for the check.
pub fn copy_words(source: &[u32], dest: &mut [u32]) {
    assert_eq!(source.len(), dest.len());
    dest.copy_from_slice(source);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moves_every_word() {
        let src = [1u32, 2, 3, 4];
        let mut dst = [0u32; 4];
        copy_words(&src, &mut dst);
        assert_eq!(dst, src);
    }

    #[test]
    #[should_panic]
    fn length_mismatch_is_a_bug() {
        let src = [1u32, 2];
        let mut dst = [0u32; 3];
        copy_words(&src, &mut dst);
    }
}
