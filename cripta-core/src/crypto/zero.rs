//! Zeroization helpers for secrets held outside the key types.

use zeroize::Zeroize;

/// Overwrite a byte buffer with zeros in place.
pub fn zero_buffer(buf: &mut [u8]) {
    buf.zeroize();
}

/// Overwrite a string's contents and clear it.
pub fn zero_string(s: &mut String) {
    s.zeroize();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_buffer() {
        let mut data = vec![1u8, 2, 3, 4, 5];
        zero_buffer(&mut data);
        assert_eq!(data, vec![0, 0, 0, 0, 0]);

        let mut arr = [0xffu8; 32];
        zero_buffer(&mut arr[4..]);
        assert_eq!(&arr[..4], &[0xff; 4]);
        assert!(arr[4..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_zero_string() {
        let mut s = String::from("hunter2");
        zero_string(&mut s);
        assert!(s.is_empty());
    }
}
