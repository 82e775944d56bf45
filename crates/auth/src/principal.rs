use serde::{Deserialize, Serialize};

use storefront_core::CustomerId;

/// Identity of an authenticated customer, as resolved by the auth layer.
///
/// Cart operations take this instead of a raw [`CustomerId`] so callers cannot
/// act on a cart without first going through authentication.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerPrincipal(CustomerId);

impl CustomerPrincipal {
    /// Wrap a customer id that the auth layer has already verified.
    pub fn authenticated(customer_id: CustomerId) -> Self {
        Self(customer_id)
    }

    pub fn customer_id(&self) -> CustomerId {
        self.0
    }
}

impl core::fmt::Display for CustomerPrincipal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "customer:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_wrapped_customer() {
        let principal = CustomerPrincipal::authenticated(CustomerId::new(9));
        assert_eq!(principal.customer_id(), CustomerId::new(9));
        assert_eq!(principal.to_string(), "customer:9");
    }
}
