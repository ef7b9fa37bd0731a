//! Availability check trait

/// Caller-supplied stock/availability predicate
///
/// Invoked only when a candidate's confidence reaches the auto-approve
/// tier. Persistence is out of scope for the engine, so this is plain
/// dependency injection; any `Fn(&str, u32) -> bool` closure works.
pub trait AvailabilityCheck: Send + Sync {
    /// Whether `requested_quantity` units of the item are available
    fn is_available(&self, identity_key: &str, requested_quantity: u32) -> bool;
}

impl<F> AvailabilityCheck for F
where
    F: Fn(&str, u32) -> bool + Send + Sync,
{
    fn is_available(&self, identity_key: &str, requested_quantity: u32) -> bool {
        self(identity_key, requested_quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_impl() {
        let check = |key: &str, quantity: u32| key == "T-100" && quantity <= 5000;
        assert!(check.is_available("T-100", 500));
        assert!(!check.is_available("T-200", 500));
        assert!(!check.is_available("T-100", 10_000));
    }
}
