/// [Cantor pairing function][cantor-pairing], in the diagonal-major
/// orientation used to key binary predicate maps:
///
/// ```text
/// (a, b) -> (a + b) * (a + b + 1) / 2 + a
/// ```
///
/// [cantor-pairing]: https://en.wikipedia.org/wiki/Pairing_function#Cantor_pairing_function
pub fn pairing_cantor(a: u64, b: u64) -> u64 {
    let diagonal = a + b;
    diagonal * (diagonal + 1) / 2 + a
}

/// Inverse of [`pairing_cantor`].
pub fn unpair_cantor(code: u64) -> (u64, u64) {
    // Recover the diagonal: the largest d with d*(d+1)/2 <= code.
    let mut d = (((8.0 * code as f64 + 1.0).sqrt() - 1.0) / 2.0) as u64;
    // Float truncation can be off by one in either direction.
    while d * (d + 1) / 2 > code {
        d -= 1;
    }
    while (d + 1) * (d + 2) / 2 <= code {
        d += 1;
    }
    let a = code - d * (d + 1) / 2;
    (a, d - a)
}

/// [Szudzik pairing function][szudzik-pairing].
///
/// ```text
/// (a, b) -> if (a<b) then (b^2 + a) else (a^2 + a + b)
/// ```
///
/// [szudzik-pairing]: https://en.wikipedia.org/wiki/Pairing_function
pub fn pairing_szudzik(a: u64, b: u64) -> u64 {
    if a < b {
        b * b + a
    } else {
        a * a + a + b
    }
}

/// FNV-style mixing of one value into a running hash. Used by the
/// intern tables, where a well-spread (not perfect) hash is enough.
pub fn mix(h: u64, x: u64) -> u64 {
    (h ^ x).wrapping_mul(0x0000_0100_0000_01b3)
}

/// Hash of two values.
pub fn hash2(a: u64, b: u64) -> u64 {
    mix(mix(0xcbf2_9ce4_8422_2325, a), b)
}

/// Hash of three values.
pub fn hash3(a: u64, b: u64, c: u64) -> u64 {
    mix(hash2(a, b), c)
}

/// Hash of four values.
pub fn hash4(a: u64, b: u64, c: u64, d: u64) -> u64 {
    mix(hash3(a, b, c), d)
}

pub trait MyHash {
    /// Hash function used to bucket values in the intern tables.
    fn hash(&self) -> u64;
}

impl MyHash for (u32, u32) {
    fn hash(&self) -> u64 {
        hash2(self.0 as u64, self.1 as u64)
    }
}

impl MyHash for [u32; 4] {
    fn hash(&self) -> u64 {
        hash4(
            self[0] as u64,
            self[1] as u64,
            self[2] as u64,
            self[3] as u64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cantor() {
        // b\a  0  1  2  3  4
        // ------------------
        // 0    0  2  5  9 14
        // 1    1  4  8 13
        // 2    3  7 12
        // 3    6 11
        // 4   10          40
        assert_eq!(pairing_cantor(0, 0), 0);
        assert_eq!(pairing_cantor(0, 1), 1);
        assert_eq!(pairing_cantor(1, 0), 2);
        assert_eq!(pairing_cantor(0, 2), 3);
        assert_eq!(pairing_cantor(1, 1), 4);
        assert_eq!(pairing_cantor(2, 0), 5);
        assert_eq!(pairing_cantor(0, 4), 10);
        assert_eq!(pairing_cantor(4, 0), 14);
        assert_eq!(pairing_cantor(4, 4), 40);
    }

    #[test]
    fn test_cantor_roundtrip() {
        for a in 0..40u64 {
            for b in 0..40u64 {
                assert_eq!(unpair_cantor(pairing_cantor(a, b)), (a, b));
            }
        }
    }

    #[test]
    fn test_szudzik() {
        // a\b  0  1  2  3  4
        // ------------------
        // 0    0  1  4  9 16
        // 1    2  3  5 10 17
        // 2    6  7  8 11 18
        // 3   12 13 14 15 19
        // 4   20 21 22 23 24
        assert_eq!(pairing_szudzik(0, 0), 0);
        assert_eq!(pairing_szudzik(0, 1), 1);
        assert_eq!(pairing_szudzik(1, 0), 2);
        assert_eq!(pairing_szudzik(1, 1), 3);
        assert_eq!(pairing_szudzik(2, 2), 8);
        assert_eq!(pairing_szudzik(4, 4), 24);
    }

    #[test]
    fn test_hash_spread() {
        // Nearby keys should not collide.
        let mut seen = std::collections::HashSet::new();
        for a in 0..32u64 {
            for b in 0..32u64 {
                assert!(seen.insert(hash2(a, b)));
            }
        }
    }
}
