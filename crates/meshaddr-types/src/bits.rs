//! Bit-exact operations on 128-bit addresses.
//!
//! All RFC-mandated bit boundaries (solicited-node low 24 bits, 64-bit
//! interface identifiers, policy prefixes) go through these helpers.

/// Copies the low `bits` bits of `src` into `dst`, leaving the high
/// `128 - bits` bits of `dst` untouched. `bits` is clamped to 128.
pub fn copy_low_bits(dst: &mut [u8; 16], src: &[u8; 16], bits: u8) {
    let bits = usize::from(bits.min(128));
    let full = bits / 8;
    let rem = bits % 8;

    dst[16 - full..].copy_from_slice(&src[16 - full..]);
    if rem != 0 {
        let idx = 15 - full;
        let mask = (1u8 << rem) - 1;
        dst[idx] = (dst[idx] & !mask) | (src[idx] & mask);
    }
}

/// Returns true if the first `bits` bits of `a` and `b` are equal.
pub fn bits_equal(a: &[u8; 16], b: &[u8; 16], bits: u8) -> bool {
    let bits = usize::from(bits.min(128));
    let full = bits / 8;
    let rem = bits % 8;

    if a[..full] != b[..full] {
        return false;
    }
    if rem == 0 {
        return true;
    }
    let mask = 0xffu8 << (8 - rem);
    (a[full] & mask) == (b[full] & mask)
}

/// Clears every bit after the first `bits` bits.
pub fn mask_prefix(addr: &[u8; 16], bits: u8) -> [u8; 16] {
    let mut out = [0u8; 16];
    let bits = usize::from(bits.min(128));
    let full = bits / 8;
    let rem = bits % 8;

    out[..full].copy_from_slice(&addr[..full]);
    if rem != 0 {
        out[full] = addr[full] & (0xffu8 << (8 - rem));
    }
    out
}

/// Length of the longest common leading bit sequence of `a` and `b`.
pub fn common_prefix_len(a: &[u8; 16], b: &[u8; 16]) -> u8 {
    let mut len = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        let diff = x ^ y;
        if diff != 0 {
            // leading_zeros of a non-zero u8 is at most 7
            return len + diff.leading_zeros() as u8;
        }
        len += 8;
    }
    len
}
