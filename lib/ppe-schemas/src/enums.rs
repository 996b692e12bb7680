//! Closed enumerations from the wire schema, encoded as integers.
//!
//! Every enum reserves `0` for `Unspecified`. Decoding an integer outside the
//! known range yields `Unspecified` rather than failing, so that additive
//! future variants on the producer side don't break older consumers.

use serde::{Deserialize, Serialize};

macro_rules! int_enum {
    ($name:ident { $($variant:ident = $value:expr),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        #[serde(into = "i32", from = "i32")]
        pub enum $name {
            #[default]
            Unspecified,
            $($variant,)+
        }

        impl From<$name> for i32 {
            fn from(value: $name) -> i32 {
                match value {
                    $name::Unspecified => 0,
                    $($name::$variant => $value,)+
                }
            }
        }

        impl From<i32> for $name {
            fn from(value: i32) -> Self {
                match value {
                    $($value => $name::$variant,)+
                    _ => $name::Unspecified,
                }
            }
        }
    };
}

int_enum!(PpeViolationType {
    NoHelmet = 1,
    NoSafetyVest = 2,
    NoSafetyGlasses = 3,
    NoGloves = 4,
    NoSafetyBoots = 5,
    NoEarProtection = 6,
    NoFaceMask = 7,
});

int_enum!(ActivityType {
    Walking = 1,
    Standing = 2,
    OperatingMachinery = 3,
    Lifting = 4,
    Climbing = 5,
    Running = 6,
    Falling = 7,
    Reaching = 8,
    Carrying = 9,
});

int_enum!(AlertSeverity {
    Info = 1,
    Warning = 2,
    Critical = 3,
    Emergency = 4,
});

int_enum!(AlertType {
    PpeViolation = 1,
    PpeMissing = 2,
    UnsafeActivity = 3,
    RestrictedZoneEntry = 4,
    FallDetected = 5,
    UnusualInactivity = 6,
    HazardDetected = 7,
    EquipmentMalfunction = 8,
    DeviceLowBattery = 9,
    DeviceOffline = 10,
    DeviceError = 11,
    PatternDetected = 12,
    ThresholdExceeded = 13,
});

int_enum!(AlertStatus {
    New = 1,
    Acknowledged = 2,
    InProgress = 3,
    Resolved = 4,
    Dismissed = 5,
    Escalated = 6,
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_integer_decodes_to_unspecified() {
        assert_eq!(PpeViolationType::from(99), PpeViolationType::Unspecified);
        assert_eq!(AlertSeverity::from(-1), AlertSeverity::Unspecified);
    }

    #[test]
    fn round_trips_through_integer() {
        for v in [
            PpeViolationType::NoHelmet,
            PpeViolationType::NoFaceMask,
            PpeViolationType::Unspecified,
        ] {
            assert_eq!(PpeViolationType::from(i32::from(v)), v);
        }
    }
}
