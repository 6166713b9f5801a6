use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::validation::{display_name, require_not_blank};
use stockroom_core::{DomainError, DomainResult, Entity, UnitId, ValueObject};

/// Limits applied when units are created or edited.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UnitLimits {
    pub max_name_len: usize,
    /// Inclusive ceiling for a conversion factor.
    pub max_conversion_factor: i64,
}

impl Default for UnitLimits {
    fn default() -> Self {
        Self {
            max_name_len: 50,
            max_conversion_factor: 1_000_000,
        }
    }
}

/// Integer multiplier from a unit to its base unit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversionFactor(i64);

impl ValueObject for ConversionFactor {}

impl ConversionFactor {
    /// The factor every base unit carries.
    pub const ONE: ConversionFactor = ConversionFactor(1);

    /// Validate `value` against `1..=ceiling`.
    pub fn new(value: i64, ceiling: i64) -> DomainResult<Self> {
        if value <= 0 {
            return Err(DomainError::invalid_conversion_factor(format!(
                "factor must be positive (got {value})"
            )));
        }
        if value > ceiling {
            return Err(DomainError::invalid_conversion_factor(format!(
                "factor {value} exceeds maximum {ceiling}"
            )));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> i64 {
        self.0
    }

    /// `qty * factor`, failing instead of overflowing.
    pub fn to_base(self, qty: i64) -> DomainResult<i64> {
        qty.checked_mul(self.0).ok_or_else(|| {
            DomainError::invalid_quantity(format!(
                "{qty} x {} overflows the base-unit range",
                self.0
            ))
        })
    }

    /// `base_qty / factor`, truncating toward zero.
    pub fn from_base(self, base_qty: i64) -> i64 {
        base_qty / self.0
    }
}

impl core::fmt::Display for ConversionFactor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// A measurement unit.
///
/// Base units are their own reference (`base_unit_symbol == name`, factor 1).
/// Derived units point at a base unit by symbol and scale into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    id: UnitId,
    name: String,
    base_unit_symbol: String,
    conversion_factor: ConversionFactor,
    is_base_unit: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Unit {
    /// A base unit named by its own symbol.
    pub fn base(
        id: UnitId,
        symbol: &str,
        limits: &UnitLimits,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let symbol = display_name(symbol, "base unit symbol", limits.max_name_len)?;
        Ok(Self {
            id,
            name: symbol.clone(),
            base_unit_symbol: symbol,
            conversion_factor: ConversionFactor::ONE,
            is_base_unit: true,
            created_at: at,
            updated_at: at,
        })
    }

    /// A unit scaling into the base unit `base_symbol`.
    ///
    /// Existence of the base unit is the registry's concern, not checked here.
    pub fn derived(
        id: UnitId,
        name: &str,
        base_symbol: &str,
        factor: i64,
        limits: &UnitLimits,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = display_name(name, "unit name", limits.max_name_len)?;
        require_not_blank(base_symbol, "base unit symbol")?;
        let conversion_factor = ConversionFactor::new(factor, limits.max_conversion_factor)?;
        Ok(Self {
            id,
            name,
            base_unit_symbol: base_symbol.trim().to_string(),
            conversion_factor,
            is_base_unit: false,
            created_at: at,
            updated_at: at,
        })
    }

    pub fn id_typed(&self) -> UnitId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_unit_symbol(&self) -> &str {
        &self.base_unit_symbol
    }

    pub fn conversion_factor(&self) -> ConversionFactor {
        self.conversion_factor
    }

    pub fn is_base_unit(&self) -> bool {
        self.is_base_unit
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Same base unit, hence convertible.
    pub fn is_compatible_with(&self, other: &Unit) -> bool {
        self.base_unit_symbol == other.base_unit_symbol
    }

    pub fn to_base(&self, qty: i64) -> DomainResult<i64> {
        self.conversion_factor.to_base(qty)
    }

    pub fn from_base(&self, base_qty: i64) -> i64 {
        self.conversion_factor.from_base(base_qty)
    }

    /// Apply an edit of name and factor.
    ///
    /// A base unit keeps factor 1; asking for anything else is a conflict.
    pub fn edited(
        &self,
        name: &str,
        factor: i64,
        limits: &UnitLimits,
        at: DateTime<Utc>,
    ) -> DomainResult<Unit> {
        let name = display_name(name, "unit name", limits.max_name_len)?;
        let conversion_factor = if self.is_base_unit {
            if factor != 1 {
                return Err(DomainError::BaseUnitImmutable(format!(
                    "'{}' must keep conversion factor 1",
                    self.name
                )));
            }
            ConversionFactor::ONE
        } else {
            ConversionFactor::new(factor, limits.max_conversion_factor)?
        };

        Ok(Unit {
            name,
            conversion_factor,
            updated_at: at,
            ..self.clone()
        })
    }
}

impl Entity for Unit {
    type Id = UnitId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn dozen() -> Unit {
        Unit::derived(UnitId::new(), "dozen", "pcs", 12, &UnitLimits::default(), at()).unwrap()
    }

    #[test]
    fn base_unit_has_factor_one_and_names_itself() {
        let pcs = Unit::base(UnitId::new(), " pcs ", &UnitLimits::default(), at()).unwrap();
        assert!(pcs.is_base_unit());
        assert_eq!(pcs.name(), "pcs");
        assert_eq!(pcs.base_unit_symbol(), "pcs");
        assert_eq!(pcs.conversion_factor(), ConversionFactor::ONE);
    }

    #[test]
    fn factor_must_be_positive_and_bounded() {
        let limits = UnitLimits::default();
        for bad in [0, -12, 1_000_001] {
            let err = Unit::derived(UnitId::new(), "x", "pcs", bad, &limits, at()).unwrap_err();
            assert!(matches!(err, DomainError::InvalidConversionFactor(_)), "{bad}");
        }
        assert!(Unit::derived(UnitId::new(), "x", "pcs", 1_000_000, &limits, at()).is_ok());
    }

    #[test]
    fn conversion_truncates_toward_zero() {
        let unit = dozen();
        assert_eq!(unit.to_base(2).unwrap(), 24);
        assert_eq!(unit.from_base(24), 2);
        assert_eq!(unit.from_base(35), 2);
        assert_eq!(unit.from_base(11), 0);
    }

    #[test]
    fn conversion_overflow_is_rejected() {
        let unit = dozen();
        assert!(matches!(
            unit.to_base(i64::MAX / 2),
            Err(DomainError::InvalidQuantity(_))
        ));
    }

    #[test]
    fn base_unit_factor_cannot_change() {
        let limits = UnitLimits::default();
        let pcs = Unit::base(UnitId::new(), "pcs", &limits, at()).unwrap();
        assert!(matches!(
            pcs.edited("pcs", 2, &limits, at()),
            Err(DomainError::BaseUnitImmutable(_))
        ));
        let renamed = pcs.edited("pieces", 1, &limits, at()).unwrap();
        assert_eq!(renamed.name(), "pieces");
        assert_eq!(renamed.base_unit_symbol(), "pcs");
    }

    #[test]
    fn derived_unit_edit_revalidates_factor() {
        let limits = UnitLimits::default();
        let unit = dozen();
        let edited = unit.edited("baker's dozen", 13, &limits, at()).unwrap();
        assert_eq!(edited.conversion_factor().get(), 13);
        assert_eq!(edited.id_typed(), unit.id_typed());
        assert!(unit.edited("dozen", 0, &limits, at()).is_err());
    }
}
