//! Integer quantities as reported by the Envoy.
//!
//! Values are unsigned by type: a negative reading never makes it past deserialization.

macro_rules! quantity {
    ($name:ident, suffix: $suffix:literal) => {
        #[repr(transparent)]
        #[derive(Clone, Copy, Eq, PartialEq, ::serde::Deserialize)]
        #[serde(transparent)]
        #[must_use]
        pub struct $name(pub u64);

        impl $name {
            pub const ZERO: Self = Self(0);

            /// Gauge value, saturating at [`i64::MAX`].
            #[must_use]
            pub fn to_gauge(self) -> i64 {
                i64::try_from(self.0).unwrap_or(i64::MAX)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, formatter: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(formatter, "{} {}", self.0, $suffix)
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, formatter: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(formatter, "{}{}", self.0, $suffix)
            }
        }
    };
}

quantity!(Watts, suffix: "W");
quantity!(WattHours, suffix: "Wh");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_ok() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::from_str::<Watts>("3860")?, Watts(3860));
        assert_eq!(serde_json::from_str::<WattHours>("7021969")?, WattHours(7_021_969));
        Ok(())
    }

    #[test]
    fn negative_is_rejected() {
        assert!(serde_json::from_str::<Watts>("-1").is_err());
    }

    #[test]
    fn fractional_is_rejected() {
        assert!(serde_json::from_str::<WattHours>("1.5").is_err());
    }

    #[test]
    fn to_gauge_saturates() {
        assert_eq!(WattHours(42).to_gauge(), 42);
        assert_eq!(WattHours(u64::MAX).to_gauge(), i64::MAX);
    }

    #[test]
    fn formatting() {
        assert_eq!(Watts(3860).to_string(), "3860 W");
        assert_eq!(format!("{:?}", WattHours(5585)), "5585Wh");
    }
}
