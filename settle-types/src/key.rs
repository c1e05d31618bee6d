//! Compound keys identifying settlement series.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::SettleError;

/// Calendar granularity of a contract (the `product` dimension).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Product {
    /// Calendar year.
    Year,
    /// Calendar quarter.
    Quarter,
    /// Calendar month.
    Month,
    /// Calendar week, starting on Monday.
    Week,
    /// Calendar day.
    Day,
    /// Hour. Carried as a label only; offsets are not defined for it.
    Hour,
}

impl Product {
    /// Every granularity, coarsest first.
    pub const ALL: [Self; 6] = [
        Self::Year,
        Self::Quarter,
        Self::Month,
        Self::Week,
        Self::Day,
        Self::Hour,
    ];

    /// Single-letter code used in keys and configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Year => "Y",
            Self::Quarter => "Q",
            Self::Month => "M",
            Self::Week => "W",
            Self::Day => "D",
            Self::Hour => "H",
        }
    }

    /// True if the offset calculator supports this granularity.
    #[must_use]
    pub const fn has_offsets(self) -> bool {
        !matches!(self, Self::Hour)
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Product {
    type Err = SettleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Y" => Ok(Self::Year),
            "Q" => Ok(Self::Quarter),
            "M" => Ok(Self::Month),
            "W" => Ok(Self::Week),
            "D" => Ok(Self::Day),
            "H" => Ok(Self::Hour),
            other => Err(SettleError::invalid_granularity(other)),
        }
    }
}

impl TryFrom<String> for Product {
    type Error = SettleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Product> for String {
    fn from(p: Product) -> Self {
        p.as_str().to_string()
    }
}

/// Kind of value stored for a key (the `type` dimension).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ValueType {
    /// Raw settlement price.
    Close,
    /// Roll-adjusted continuous price.
    AdjClose,
    /// Delivery start date of the contract behind the cell.
    Maturity,
    /// Any other value series (volume, open interest, custom continuous types...).
    Other(String),
}

impl ValueType {
    /// Label used in keys and in persisted column names.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Close => "close",
            Self::AdjClose => "adj_close",
            Self::Maturity => "maturity",
            Self::Other(s) => s.as_str(),
        }
    }

    /// True for the maturity series, whose cells are dates.
    #[must_use]
    pub const fn is_maturity(&self) -> bool {
        matches!(self, Self::Maturity)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ValueType {
    fn from(s: &str) -> Self {
        match s {
            "close" => Self::Close,
            "adj_close" => Self::AdjClose,
            "maturity" => Self::Maturity,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ValueType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "close" | "adj_close" | "maturity" => Self::from(s.as_str()),
            _ => Self::Other(s),
        }
    }
}

impl From<ValueType> for String {
    fn from(v: ValueType) -> Self {
        match v {
            ValueType::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

/// The seven key dimensions of a panel column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Data-source name.
    Market,
    /// Commodity (Power, Gas, CO2...).
    Commodity,
    /// Contract family (BL, PK, EUA...).
    Instrument,
    /// Geography or currency scope.
    Area,
    /// Calendar granularity.
    Product,
    /// Periods from the as-of date to maturity.
    Offset,
    /// Value type (close, adj_close, maturity...).
    Type,
}

impl Dimension {
    /// Every dimension in key order.
    pub const ALL: [Self; 7] = [
        Self::Market,
        Self::Commodity,
        Self::Instrument,
        Self::Area,
        Self::Product,
        Self::Offset,
        Self::Type,
    ];

    /// Name of the dimension as used in messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Market => "market",
            Self::Commodity => "commodity",
            Self::Instrument => "instrument",
            Self::Area => "area",
            Self::Product => "product",
            Self::Offset => "offset",
            Self::Type => "type",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full seven-field key of a panel column.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnKey {
    /// Data-source name (Omip, EEX, Barchart...).
    pub market: String,
    /// Commodity (Power, Gas, CO2...).
    pub commodity: String,
    /// Contract family, e.g. "BL" for baseload.
    pub instrument: String,
    /// Geography or currency scope.
    pub area: String,
    /// Calendar granularity.
    pub product: Product,
    /// Periods from the as-of date to the contract's maturity.
    pub offset: i32,
    /// Which value series this column carries.
    #[serde(rename = "type")]
    pub value_type: ValueType,
}

impl ColumnKey {
    /// Build a key from its seven parts.
    pub fn new(
        market: impl Into<String>,
        commodity: impl Into<String>,
        instrument: impl Into<String>,
        area: impl Into<String>,
        product: Product,
        offset: i32,
        value_type: impl Into<ValueType>,
    ) -> Self {
        Self {
            market: market.into(),
            commodity: commodity.into(),
            instrument: instrument.into(),
            area: area.into(),
            product,
            offset,
            value_type: value_type.into(),
        }
    }

    /// Same key with a different offset.
    #[must_use]
    pub fn with_offset(&self, offset: i32) -> Self {
        Self {
            offset,
            ..self.clone()
        }
    }

    /// Same key with a different value type.
    #[must_use]
    pub fn with_type(&self, value_type: impl Into<ValueType>) -> Self {
        Self {
            value_type: value_type.into(),
            ..self.clone()
        }
    }

    /// The instrument family (key without offset and type).
    #[must_use]
    pub fn family(&self) -> FamilyKey {
        FamilyKey {
            market: self.market.clone(),
            commodity: self.commodity.clone(),
            instrument: self.instrument.clone(),
            area: self.area.clone(),
            product: self.product,
        }
    }

    /// The roll group this column belongs to.
    #[must_use]
    pub fn group(&self) -> GroupKey {
        GroupKey {
            market: self.market.clone(),
            commodity: self.commodity.clone(),
            area: self.area.clone(),
            product: self.product,
        }
    }

    /// The key without its offset, used when columns are aggregated by maturity.
    #[must_use]
    pub fn contract(&self) -> ContractKey {
        ContractKey {
            market: self.market.clone(),
            commodity: self.commodity.clone(),
            instrument: self.instrument.clone(),
            area: self.area.clone(),
            product: self.product,
            value_type: self.value_type.clone(),
        }
    }

    /// Value of one dimension rendered as text.
    #[must_use]
    pub fn label(&self, dim: Dimension) -> String {
        match dim {
            Dimension::Market => self.market.clone(),
            Dimension::Commodity => self.commodity.clone(),
            Dimension::Instrument => self.instrument.clone(),
            Dimension::Area => self.area.clone(),
            Dimension::Product => self.product.to_string(),
            Dimension::Offset => self.offset.to_string(),
            Dimension::Type => self.value_type.to_string(),
        }
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}/{}/{}",
            self.market,
            self.commodity,
            self.instrument,
            self.area,
            self.product,
            self.offset,
            self.value_type
        )
    }
}

/// An instrument family: every offset and value type of one contract series.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FamilyKey {
    /// Data-source name.
    pub market: String,
    /// Commodity.
    pub commodity: String,
    /// Contract family.
    pub instrument: String,
    /// Geography or currency scope.
    pub area: String,
    /// Calendar granularity.
    pub product: Product,
}

impl FamilyKey {
    /// Column of this family at `offset` carrying `value_type`.
    pub fn column(&self, offset: i32, value_type: impl Into<ValueType>) -> ColumnKey {
        ColumnKey {
            market: self.market.clone(),
            commodity: self.commodity.clone(),
            instrument: self.instrument.clone(),
            area: self.area.clone(),
            product: self.product,
            offset,
            value_type: value_type.into(),
        }
    }
}

impl fmt::Display for FamilyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.market, self.commodity, self.instrument, self.area, self.product
        )
    }
}

/// Grouping used by the continuous-price pass: `(market, commodity, area, product)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    /// Data-source name.
    pub market: String,
    /// Commodity.
    pub commodity: String,
    /// Geography or currency scope.
    pub area: String,
    /// Calendar granularity.
    pub product: Product,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.market, self.commodity, self.area, self.product
        )
    }
}

/// A column key without the offset dimension.
///
/// Produced when a cross-section selects a single maturity, where several
/// offsets may momentarily refer to the same contract.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContractKey {
    /// Data-source name.
    pub market: String,
    /// Commodity.
    pub commodity: String,
    /// Contract family.
    pub instrument: String,
    /// Geography or currency scope.
    pub area: String,
    /// Calendar granularity.
    pub product: Product,
    /// Which value series this column carries.
    #[serde(rename = "type")]
    pub value_type: ValueType,
}
