//! Payment methods accepted at checkout.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a customer settles a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Bank transfer; the customer uploads a proof-of-payment and the
    /// checkout response lists the active bank accounts.
    Transfer,
    /// Card payment through an external processor; carries the
    /// processor's transaction id.
    Card,
    /// Cash on delivery of the event.
    Cash,
}

impl PaymentMethod {
    /// Parses the API/database string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "transfer" => Some(Self::Transfer),
            "card" => Some(Self::Card),
            "cash" => Some(Self::Cash),
            _ => None,
        }
    }

    /// String form stored in `reservations.payment_method`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
            Self::Card => "card",
            Self::Cash => "cash",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips() {
        for method in [
            PaymentMethod::Transfer,
            PaymentMethod::Card,
            PaymentMethod::Cash,
        ] {
            assert_eq!(PaymentMethod::parse(method.as_str()), Some(method));
        }
        assert_eq!(PaymentMethod::parse("crypto"), None);
    }
}
