//! Container sizes and per-size maps.

use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use painterp_core::DomainError;

/// Fixed package-volume label under which stock and price may vary.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContainerSize {
    #[serde(rename = "1L")]
    OneLitre,
    #[serde(rename = "4L")]
    FourLitre,
    #[serde(rename = "10L")]
    TenLitre,
    #[serde(rename = "20L")]
    TwentyLitre,
}

impl ContainerSize {
    pub const ALL: [ContainerSize; 4] = [
        ContainerSize::OneLitre,
        ContainerSize::FourLitre,
        ContainerSize::TenLitre,
        ContainerSize::TwentyLitre,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ContainerSize::OneLitre => "1L",
            ContainerSize::FourLitre => "4L",
            ContainerSize::TenLitre => "10L",
            ContainerSize::TwentyLitre => "20L",
        }
    }
}

impl core::fmt::Display for ContainerSize {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ContainerSize {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ContainerSize::ALL
            .into_iter()
            .find(|size| size.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "Invalid size '{s}'. Allowed sizes: 1L, 4L, 10L, 20L"
                ))
            })
    }
}

/// One value per container size. Missing sizes deserialize to the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct SizeMap<T> {
    #[serde(rename = "1L", default)]
    one_litre: T,
    #[serde(rename = "4L", default)]
    four_litre: T,
    #[serde(rename = "10L", default)]
    ten_litre: T,
    #[serde(rename = "20L", default)]
    twenty_litre: T,
}

/// Per-size stock counts.
pub type StockBySize = SizeMap<i64>;

/// Per-size unit prices.
pub type PriceBySize = SizeMap<Decimal>;

impl<T: Copy> SizeMap<T> {
    pub fn get(&self, size: ContainerSize) -> T {
        match size {
            ContainerSize::OneLitre => self.one_litre,
            ContainerSize::FourLitre => self.four_litre,
            ContainerSize::TenLitre => self.ten_litre,
            ContainerSize::TwentyLitre => self.twenty_litre,
        }
    }

    pub fn set(&mut self, size: ContainerSize, value: T) {
        let slot = match size {
            ContainerSize::OneLitre => &mut self.one_litre,
            ContainerSize::FourLitre => &mut self.four_litre,
            ContainerSize::TenLitre => &mut self.ten_litre,
            ContainerSize::TwentyLitre => &mut self.twenty_litre,
        };
        *slot = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (ContainerSize, T)> + '_ {
        ContainerSize::ALL.into_iter().map(move |size| (size, self.get(size)))
    }
}

impl<T: Copy + Default> SizeMap<T> {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (ContainerSize, T)>) -> Self {
        let mut map = Self::default();
        for (size, value) in pairs {
            map.set(size, value);
        }
        map
    }
}

impl SizeMap<i64> {
    /// Sum across the whole size enumeration. `None` on `i64` overflow.
    pub fn total(&self) -> Option<i64> {
        self.iter()
            .try_fold(0i64, |acc, (_, count)| acc.checked_add(count))
    }

    /// First size holding a negative count, if any.
    pub fn first_negative(&self) -> Option<ContainerSize> {
        self.iter().find(|(_, count)| *count < 0).map(|(size, _)| size)
    }
}

impl SizeMap<Decimal> {
    pub fn first_negative(&self) -> Option<ContainerSize> {
        self.iter()
            .find(|(_, price)| *price < Decimal::ZERO)
            .map(|(size, _)| size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labels_case_insensitively() {
        assert_eq!("4L".parse::<ContainerSize>().unwrap(), ContainerSize::FourLitre);
        assert_eq!(" 20l ".parse::<ContainerSize>().unwrap(), ContainerSize::TwentyLitre);
    }

    #[test]
    fn rejects_sizes_outside_the_enumeration() {
        let err = "2L".parse::<ContainerSize>().unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("2L")));
    }

    #[test]
    fn missing_sizes_default_to_zero() {
        let map: StockBySize = serde_json::from_str(r#"{"1L": 5, "10L": 2}"#).unwrap();
        assert_eq!(map.get(ContainerSize::OneLitre), 5);
        assert_eq!(map.get(ContainerSize::FourLitre), 0);
        assert_eq!(map.get(ContainerSize::TenLitre), 2);
        assert_eq!(map.total(), Some(7));
    }

    #[test]
    fn total_reports_overflow() {
        let map = StockBySize::from_pairs([
            (ContainerSize::OneLitre, 5),
            (ContainerSize::FourLitre, i64::MAX),
        ]);
        assert_eq!(map.total(), None);
    }

    #[test]
    fn unknown_size_keys_are_rejected() {
        let res = serde_json::from_str::<StockBySize>(r#"{"2L": 5}"#);
        assert!(res.is_err());
    }

    #[test]
    fn serializes_every_size_label() {
        let map = StockBySize::from_pairs([(ContainerSize::FourLitre, 3)]);
        let json = serde_json::to_value(map).unwrap();
        assert_eq!(json, serde_json::json!({"1L": 0, "4L": 3, "10L": 0, "20L": 0}));
    }
}
