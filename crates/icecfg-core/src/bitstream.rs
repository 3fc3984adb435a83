//! Padded bitstream buffer
//!
//! After the last bitstream bit the iCE40 needs at least 49 more SCLK cycles
//! to finish configuration and raise CDONE. Those clocks are produced by
//! sending zero bytes after the image as part of the same transfer.

use alloc::vec::Vec;

/// Extra clock cycles required after the image
pub const DUMMY_CLOCKS: usize = 49;

/// Zero bytes appended to every image (49 clocks rounded up to bytes)
pub const DUMMY_PAD: usize = DUMMY_CLOCKS.div_ceil(8);

/// Configuration image followed by [`DUMMY_PAD`] zero bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitstream {
    buf: Vec<u8>,
    image_len: usize,
}

impl Bitstream {
    /// Copy an image and append the padding
    pub fn from_image(image: &[u8]) -> Self {
        let mut buf = Vec::with_capacity(image.len() + DUMMY_PAD);
        buf.extend_from_slice(image);
        Self::from_vec(buf)
    }

    /// Take ownership of an image and append the padding
    pub fn from_vec(mut image: Vec<u8>) -> Self {
        let image_len = image.len();
        image.resize(image_len + DUMMY_PAD, 0);
        Self {
            buf: image,
            image_len,
        }
    }

    /// Bytes to put on the bus, padding included
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// The image without padding
    pub fn image(&self) -> &[u8] {
        &self.buf[..self.image_len]
    }

    /// Length of the image without padding
    pub fn image_len(&self) -> usize {
        self.image_len
    }

    /// Total transfer length (image plus padding)
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Always false: a bitstream carries at least the padding
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The trailing padding
    pub fn padding(&self) -> &[u8] {
        &self.buf[self.image_len..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_pad_size() {
        assert_eq!(DUMMY_PAD, 7);
        assert!(DUMMY_PAD * 8 >= DUMMY_CLOCKS);
    }

    #[test]
    fn test_padding_for_any_length() {
        for len in [0usize, 1, 7, 8, 100, 4097] {
            let image = vec![0xFFu8; len];
            let bs = Bitstream::from_image(&image);
            assert_eq!(bs.len(), len + DUMMY_PAD);
            assert_eq!(bs.image_len(), len);
            assert!(bs.padding().iter().all(|&b| b == 0));
            assert_eq!(bs.image(), &image[..]);
        }
    }

    #[test]
    fn test_from_vec_keeps_content() {
        let bs = Bitstream::from_vec(vec![0x7E, 0xAA, 0x99, 0x7E]);
        assert_eq!(bs.as_bytes(), &[0x7E, 0xAA, 0x99, 0x7E, 0, 0, 0, 0, 0, 0, 0]);
        assert!(!bs.is_empty());
    }
}
