//! Average-price aggregation over the logged entries.
//!
//! Records are cleaned before grouping: blank product or location names and
//! non-positive prices are dropped, and names are normalized to
//! alphanumeric title case so spelling variants of the same product land in
//! one group.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::domain::EntryRecord;
use crate::format;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupBy {
    Product,
    Location,
    ProductLocation,
}

/// A cleaned observation ready for aggregation.
#[derive(Clone, Debug, PartialEq)]
pub struct CleanRecord {
    pub product: String,
    pub location: String,
    pub price: Decimal,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GroupStats {
    pub count: usize,
    pub average: Decimal,
}

pub fn clean_records(records: &[EntryRecord]) -> Vec<CleanRecord> {
    records
        .iter()
        .filter_map(|record| {
            if record.price <= Decimal::ZERO {
                return None;
            }
            let product = format::clean_display_text(&record.product);
            let location = format::clean_display_text(&record.location);
            if product.is_empty() || location.is_empty() {
                return None;
            }
            Some(CleanRecord { product, location, price: record.price })
        })
        .collect()
}

/// Count and mean price per group, mean rounded to two decimal places.
/// Composite keys are `product\nlocation`; the BTreeMap keeps the render
/// order deterministic.
pub fn average_prices(records: &[CleanRecord], group_by: GroupBy) -> BTreeMap<String, GroupStats> {
    let mut sums: BTreeMap<String, (Decimal, usize)> = BTreeMap::new();
    for record in records {
        let key = match group_by {
            GroupBy::Product => record.product.clone(),
            GroupBy::Location => record.location.clone(),
            GroupBy::ProductLocation => format!("{}\n{}", record.product, record.location),
        };
        let slot = sums.entry(key).or_insert((Decimal::ZERO, 0));
        slot.0 += record.price;
        slot.1 += 1;
    }

    sums.into_iter()
        .map(|(key, (total, count))| {
            let average = (total / Decimal::from(count as u64)).round_dp(2);
            (key, GroupStats { count, average })
        })
        .collect()
}

/// Splits a composite product+location key back into its parts.
pub fn split_composite_key(key: &str) -> (&str, &str) {
    key.split_once('\n').unwrap_or((key, ""))
}

#[cfg(test)]
mod tests {
    use super::{average_prices, clean_records, split_composite_key, GroupBy};
    use crate::domain::EntryRecord;
    use rust_decimal::Decimal;

    fn entry(product: &str, location: &str, price: i64) -> EntryRecord {
        EntryRecord::new("trader", product, Decimal::from(price), location, "")
    }

    #[test]
    fn cleaning_drops_blank_names_and_bad_prices() {
        let records = vec![
            entry("Carrot", "DC 1", 100),
            entry("", "DC 1", 100),
            entry("Carrot", "", 100),
            entry("Carrot", "DC 1", 0),
            entry("Carrot", "DC 1", -5),
            entry("(/)", "DC 1", 100),
        ];
        let cleaned = clean_records(&records);
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].product, "Carrot");
        assert_eq!(cleaned[0].location, "Dc 1");
    }

    #[test]
    fn cleaning_merges_spelling_variants_into_one_group() {
        let records = vec![entry("carrot!", "DC 1", 10), entry("Carrot", "dc 1", 20)];
        let averages = average_prices(&clean_records(&records), GroupBy::Product);
        assert_eq!(averages.len(), 1);
        let stats = &averages["Carrot"];
        assert_eq!(stats.count, 2);
        assert_eq!(stats.average, Decimal::new(1500, 2));
    }

    #[test]
    fn averages_by_product_use_two_decimal_places() {
        let records = vec![
            entry("Carrot", "DC 1", 10),
            entry("Carrot", "DC 2", 11),
            entry("Carrot", "DC 1", 11),
        ];
        let averages = average_prices(&clean_records(&records), GroupBy::Product);
        let stats = &averages["Carrot"];
        assert_eq!(stats.count, 3);
        assert_eq!(stats.average, Decimal::new(1067, 2));
    }

    #[test]
    fn composite_grouping_keys_carry_both_parts() {
        let records = clean_records(&vec![
            entry("Carrot", "DC 1", 10),
            entry("Carrot", "DC 2", 30),
            entry("Apple", "DC 1", 50),
        ]);
        let averages = average_prices(&records, GroupBy::ProductLocation);
        assert_eq!(averages.len(), 3);
        let (product, location) =
            split_composite_key(averages.keys().next().expect("first key"));
        assert_eq!(product, "Apple");
        assert_eq!(location, "Dc 1");
    }

    #[test]
    fn empty_input_yields_no_groups() {
        assert!(average_prices(&[], GroupBy::Product).is_empty());
    }
}
