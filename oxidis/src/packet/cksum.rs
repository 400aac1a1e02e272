//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

// ISO 8473 checksum, adapted from the C reference in RFC 1008 section 7.2.1.

// Accumulation block size. Both running sums fit in 32 bits as long as the
// sums are folded modulo 255 at least every 4102 octets.
const MODX: usize = 4102;

// Computes the two checksum octets for insertion at offset `ckoff` of
// `data`. The octets currently stored at the checksum position are treated
// as zero.
pub(crate) fn checksum(data: &[u8], ckoff: usize) -> [u8; 2] {
    let (c0, c1) = sums(data, Some(ckoff));

    // Scale the sums so that placing the result at `ckoff` yields a message
    // whose checksum evaluates to zero.
    let sop = (data.len() - (ckoff + 1)) as i32;
    let mut iq = (sop * c0 - c1) % 255;
    if iq <= 0 {
        iq += 255;
    }
    let mut ir = 510 - c0 - iq;
    if ir > 255 {
        ir -= 255;
    }

    [iq as u8, ir as u8]
}

// Checks a received message, including its embedded checksum octets. The
// checksum is valid iff both running sums evaluate to zero.
pub(crate) fn checksum_is_valid(data: &[u8]) -> bool {
    let (c0, c1) = sums(data, None);
    c0 == 0 && c1 == 0
}

fn sums(data: &[u8], ckoff: Option<usize>) -> (i32, i32) {
    let mut c0: i32 = 0;
    let mut c1: i32 = 0;

    let mut p1 = 0;
    while p1 < data.len() {
        let p2 = std::cmp::min(p1 + MODX, data.len());

        for (p, byte) in data.iter().enumerate().take(p2).skip(p1) {
            // The checksum octets themselves are treated as zero.
            if let Some(ckoff) = ckoff
                && (p == ckoff || p == ckoff + 1)
            {
                c1 += c0;
                continue;
            }
            c0 += *byte as i32;
            c1 += c0;
        }

        c0 %= 255;
        c1 %= 255;
        p1 = p2;
    }

    (c0, c1)
}

// ===== tests =====

#[cfg(test)]
mod tests {
    use super::*;

    // Apply the computed checksum and verify the resulting message.
    fn seal(data: &mut [u8], ckoff: usize) {
        let cksum = checksum(data, ckoff);
        data[ckoff] = cksum[0];
        data[ckoff + 1] = cksum[1];
    }

    #[test]
    fn roundtrip() {
        let mut data = vec![0u8; 64];
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = i as u8;
        }
        seal(&mut data, 12);
        assert!(checksum_is_valid(&data));
    }

    #[test]
    fn single_octet_corruption() {
        let mut data: Vec<u8> = (0u8..=255).cycle().take(300).collect();
        seal(&mut data, 12);
        assert!(checksum_is_valid(&data));

        for i in 0..data.len() {
            let mut corrupt = data.clone();
            corrupt[i] ^= 0x01;
            assert!(
                !checksum_is_valid(&corrupt),
                "corruption at octet {i} went undetected"
            );
        }
    }

    #[test]
    fn large_message() {
        // Exercise the accumulation fold across multiple MODX blocks.
        let mut data = vec![0xab; 3 * MODX + 17];
        seal(&mut data, 12);
        assert!(checksum_is_valid(&data));
    }

    #[test]
    fn rfc1008_reference() {
        // Checksum octets over a short all-zero message must be non-zero
        // (an all-zero checksum field is reserved to mean "not computed").
        let data = [0u8; 20];
        let cksum = checksum(&data, 12);
        assert_ne!(cksum, [0, 0]);
    }
}
