//! 32-bit sequence-number arithmetic.
//!
//! Sequence and acknowledgement numbers live on a circle of size 2^32.  Every
//! comparison the engine makes between two of them must go through this
//! module: a plain `<` on the raw integers gives the wrong answer as soon as
//! a session's numbers wrap past `u32::MAX`.
//!
//! Ordering uses half the space as the horizon: `a` precedes `b` when
//! `b - a (mod 2^32)` lies in `[1, 2^31)`.

/// Half the sequence space; differences at or beyond this are "behind".
const HALF: u32 = 1 << 31;

/// `(a + n) mod 2^32`.
#[inline]
pub fn add(a: u32, n: u32) -> u32 {
    a.wrapping_add(n)
}

/// `(a - b) mod 2^32`: the forward distance from `b` to `a`.
#[inline]
pub fn distance(b: u32, a: u32) -> u32 {
    a.wrapping_sub(b)
}

/// `true` if `a` strictly precedes `b` in modular order.
#[inline]
pub fn less_than(a: u32, b: u32) -> bool {
    let d = b.wrapping_sub(a);
    d != 0 && d < HALF
}

/// `true` if `seq` lies in `[base, base + size)` modulo 2^32.
#[inline]
pub fn in_window(seq: u32, base: u32, size: u32) -> bool {
    seq.wrapping_sub(base) < size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_wraps() {
        assert_eq!(add(u32::MAX, 1), 0);
        assert_eq!(add(u32::MAX - 2, 5), 2);
        assert_eq!(add(7, 0), 7);
    }

    #[test]
    fn less_than_without_wrap() {
        assert!(less_than(1, 2));
        assert!(!less_than(2, 1));
        assert!(!less_than(5, 5));
    }

    #[test]
    fn less_than_across_wrap() {
        assert!(less_than(u32::MAX, 0));
        assert!(less_than(u32::MAX - 10, 3));
        assert!(!less_than(3, u32::MAX - 10));
    }

    #[test]
    fn half_space_is_the_horizon() {
        assert!(less_than(0, HALF - 1));
        assert!(!less_than(0, HALF));
        // Exactly half apart: neither precedes the other.
        assert!(!less_than(HALF, 0));
    }

    #[test]
    fn window_membership() {
        assert!(in_window(100, 100, 16));
        assert!(in_window(115, 100, 16));
        assert!(!in_window(116, 100, 16));
        assert!(!in_window(99, 100, 16));
    }

    #[test]
    fn window_membership_across_wrap() {
        let base = u32::MAX - 3;
        for k in 0..16 {
            assert!(in_window(add(base, k), base, 16), "offset {k}");
        }
        assert!(!in_window(add(base, 16), base, 16));
        assert!(!in_window(base.wrapping_sub(1), base, 16));
    }

    #[test]
    fn wrap_behaves_like_origin() {
        // Every relation near the top of the space matches the same relation
        // near zero.
        let near_top = u32::MAX - 7;
        for i in 0..16u32 {
            for j in 0..16u32 {
                assert_eq!(
                    less_than(add(near_top, i), add(near_top, j)),
                    less_than(i, j),
                    "i={i} j={j}"
                );
                assert_eq!(
                    in_window(add(near_top, i), add(near_top, j), 4),
                    in_window(i, j, 4),
                    "i={i} j={j}"
                );
            }
        }
    }

    #[test]
    fn distance_is_forward() {
        assert_eq!(distance(u32::MAX, 1), 2);
        assert_eq!(distance(10, 10), 0);
    }
}
