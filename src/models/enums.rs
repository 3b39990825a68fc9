//! Shared domain enums stored as text slugs

use serde::{Deserialize, Serialize};
use sqlx::{
    postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef},
    Decode, Encode, Postgres,
};
use utoipa::ToSchema;

/// Implements `as_str`, `Display`, `FromStr` and the sqlx text codec for a
/// slug enum. Extra literals after `|` are accepted on read only (legacy
/// values found in imported data); `db_slugs` lists them for filters.
macro_rules! text_slug {
    ($name:ident { $($variant:ident => $slug:literal $(| $alias:literal)*),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $slug,)+
                }
            }

            /// Every stored literal that reads back as this value
            pub fn db_slugs(&self) -> &'static [&'static str] {
                match self {
                    $($name::$variant => &[$slug $(, $alias)*],)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($slug $(| $alias)* => Ok($name::$variant),)+
                    _ => Err(format!("Invalid {} value: {}", stringify!($name), s)),
                }
            }
        }

        impl sqlx::Type<Postgres> for $name {
            fn type_info() -> PgTypeInfo {
                <String as sqlx::Type<Postgres>>::type_info()
            }

            fn compatible(ty: &PgTypeInfo) -> bool {
                <String as sqlx::Type<Postgres>>::compatible(ty)
            }
        }

        impl<'r> Decode<'r, Postgres> for $name {
            fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
                let s = <&str as Decode<Postgres>>::decode(value)?;
                s.parse().map_err(|e: String| e.into())
            }
        }

        impl Encode<'_, Postgres> for $name {
            fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> sqlx::encode::IsNull {
                <&str as Encode<Postgres>>::encode(self.as_str(), buf)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// RentalStatus
// ---------------------------------------------------------------------------

/// Rental contract status
///
/// `quotation -> quotation_generated -> active -> completed`; `active` is also
/// reachable straight from either quotation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RentalStatus {
    Quotation,
    QuotationGenerated,
    Active,
    Completed,
}

text_slug!(RentalStatus {
    Quotation => "quotation" | "pending",
    QuotationGenerated => "quotation_generated",
    Active => "active" | "approved",
    Completed => "completed",
});

// ---------------------------------------------------------------------------
// RentalItemStatus
// ---------------------------------------------------------------------------

/// Line item status, independent of (but synchronized with) the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RentalItemStatus {
    Active,
    Completed,
}

text_slug!(RentalItemStatus {
    Active => "active",
    Completed => "completed",
});

// ---------------------------------------------------------------------------
// AssignmentStatus / AssignmentType
// ---------------------------------------------------------------------------

/// Ledger entry status. An entry never goes back from completed to active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Active,
    Completed,
}

text_slug!(AssignmentStatus {
    Active => "active",
    Completed => "completed",
});

/// Context an equipment or employee is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentType {
    Rental,
    Project,
    Manual,
}

text_slug!(AssignmentType {
    Rental => "rental",
    Project => "project",
    Manual => "manual",
});

// ---------------------------------------------------------------------------
// EquipmentStatus
// ---------------------------------------------------------------------------

/// Displayed equipment status, always the resolver's output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentStatus {
    Available,
    Rented,
    Assigned,
    Maintenance,
}

text_slug!(EquipmentStatus {
    Available => "available",
    Rented => "rented",
    Assigned => "assigned",
    Maintenance => "maintenance" | "under_maintenance",
});

impl EquipmentStatus {
    /// Whether the equipment is committed to a rental or assignment
    pub fn is_committed(&self) -> bool {
        matches!(self, EquipmentStatus::Rented | EquipmentStatus::Assigned)
    }
}

// ---------------------------------------------------------------------------
// MaintenanceStatus
// ---------------------------------------------------------------------------

/// Maintenance record status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceStatus {
    Open,
    InProgress,
    Completed,
    Cancelled,
}

text_slug!(MaintenanceStatus {
    Open => "open",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl MaintenanceStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, MaintenanceStatus::Open | MaintenanceStatus::InProgress)
    }
}
