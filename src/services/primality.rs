/// Naive trial-division primality test.
///
/// Tries every divisor from 2 up to `n / 2`. The bound is `n / 2`, not
/// `sqrt(n)`: scan timing depends on this exact cost.
pub fn is_prime(n: i64) -> bool {
    if n < 2 {
        return false;
    }

    // Any divisor means composite
    !(2..=n / 2).any(|d| n % d == 0)
}
