/// Round a dollar amount to the nearest cent.
///
/// Every computed monetary value goes through this before persistence so that
/// stored records never accumulate floating-point drift.
pub fn round_cent(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
