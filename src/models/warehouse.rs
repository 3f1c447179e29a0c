use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Physical stock pools an order line can draw boxes from.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Warehouse {
    Ddd,
    Ljbb,
    Mbb,
    Ubb,
}

impl Warehouse {
    /// Buckets in allocation order.
    pub const ALL: [Warehouse; 4] = [
        Warehouse::Ddd,
        Warehouse::Ljbb,
        Warehouse::Mbb,
        Warehouse::Ubb,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Warehouse::Ddd => "DDD",
            Warehouse::Ljbb => "LJBB",
            Warehouse::Mbb => "MBB",
            Warehouse::Ubb => "UBB",
        }
    }

    /// Exact, case-sensitive lookup of a bucket code.
    pub fn from_code(code: &str) -> Option<Warehouse> {
        code.parse().ok()
    }
}

/// One box count per warehouse bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseBoxes {
    pub ddd: u32,
    pub ljbb: u32,
    pub mbb: u32,
    pub ubb: u32,
}

impl WarehouseBoxes {
    pub fn get(&self, warehouse: Warehouse) -> u32 {
        match warehouse {
            Warehouse::Ddd => self.ddd,
            Warehouse::Ljbb => self.ljbb,
            Warehouse::Mbb => self.mbb,
            Warehouse::Ubb => self.ubb,
        }
    }

    pub fn set(&mut self, warehouse: Warehouse, boxes: u32) {
        match warehouse {
            Warehouse::Ddd => self.ddd = boxes,
            Warehouse::Ljbb => self.ljbb = boxes,
            Warehouse::Mbb => self.mbb = boxes,
            Warehouse::Ubb => self.ubb = boxes,
        }
    }

    pub fn with(mut self, warehouse: Warehouse, boxes: u32) -> Self {
        self.set(warehouse, boxes);
        self
    }

    /// Sum over all buckets. Per-bucket values are capped well below
    /// `u32::MAX / 4` on the way in, so this cannot overflow.
    pub fn total(&self) -> u32 {
        Warehouse::ALL.iter().map(|w| self.get(*w)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Non-zero buckets in allocation order.
    pub fn used(&self) -> impl Iterator<Item = (Warehouse, u32)> + '_ {
        Warehouse::ALL
            .iter()
            .map(move |w| (*w, self.get(*w)))
            .filter(|(_, boxes)| *boxes > 0)
    }

    pub fn saturating_add(&self, other: &WarehouseBoxes) -> WarehouseBoxes {
        WarehouseBoxes {
            ddd: self.ddd.saturating_add(other.ddd),
            ljbb: self.ljbb.saturating_add(other.ljbb),
            mbb: self.mbb.saturating_add(other.mbb),
            ubb: self.ubb.saturating_add(other.ubb),
        }
    }
}

/// Box counts as submitted by a caller, before non-negativity is enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxCounts {
    #[serde(default)]
    pub ddd: i64,
    #[serde(default)]
    pub ljbb: i64,
    #[serde(default)]
    pub mbb: i64,
    #[serde(default)]
    pub ubb: i64,
}

impl BoxCounts {
    pub fn get(&self, warehouse: Warehouse) -> i64 {
        match warehouse {
            Warehouse::Ddd => self.ddd,
            Warehouse::Ljbb => self.ljbb,
            Warehouse::Mbb => self.mbb,
            Warehouse::Ubb => self.ubb,
        }
    }
}

impl From<WarehouseBoxes> for BoxCounts {
    fn from(boxes: WarehouseBoxes) -> Self {
        BoxCounts {
            ddd: boxes.ddd.into(),
            ljbb: boxes.ljbb.into(),
            mbb: boxes.mbb.into(),
            ubb: boxes.ubb.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_strum() {
        for warehouse in Warehouse::ALL {
            assert_eq!(warehouse.to_string(), warehouse.code());
            assert_eq!(Warehouse::from_code(warehouse.code()), Some(warehouse));
        }
        assert_eq!(Warehouse::from_code("ddd"), None);
        assert_eq!(Warehouse::from_code("XXX"), None);
    }

    #[test]
    fn used_skips_empty_buckets() {
        let boxes = WarehouseBoxes::default()
            .with(Warehouse::Ddd, 6)
            .with(Warehouse::Mbb, 1);
        let used: Vec<_> = boxes.used().collect();
        assert_eq!(used, vec![(Warehouse::Ddd, 6), (Warehouse::Mbb, 1)]);
        assert_eq!(boxes.total(), 7);
    }

    #[test]
    fn warehouse_serializes_as_upper_case_code() {
        let json = serde_json::to_string(&Warehouse::Ljbb).unwrap();
        assert_eq!(json, "\"LJBB\"");
    }
}
