use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::record::{ListingId, VehicleRecord};

/// Collapse a batch to one record per listing and stamp it with a single
/// collection time.
pub fn finalize(records: Vec<VehicleRecord>) -> Vec<VehicleRecord> {
    finalize_at(records, Utc::now())
}

/// Last write wins; the surviving record keeps the position of its first occurrence.
pub fn finalize_at(records: Vec<VehicleRecord>, scraped_at: DateTime<Utc>) -> Vec<VehicleRecord> {
    let total = records.len();
    let mut by_id: IndexMap<ListingId, VehicleRecord> = IndexMap::with_capacity(total);
    let mut blank = 0usize;

    for record in records {
        if record.listing_url.is_blank() {
            blank += 1;
            continue;
        }
        by_id.insert(record.listing_url.clone(), record);
    }

    if blank > 0 {
        warn!("Dropped {} records without a listing URL", blank);
    }
    debug!(
        input = total,
        output = by_id.len(),
        duplicates = total - blank - by_id.len(),
        "finalized batch"
    );

    by_id
        .into_values()
        .map(|mut r| {
            r.scraped_at = Some(scraped_at);
            r
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FIELD_KEYS;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn rec(url: &str, price: Option<f64>) -> VehicleRecord {
        let mut r = VehicleRecord::bare(ListingId::from(url.to_string()), "https://dealer.test");
        r.price = price;
        r
    }

    #[test]
    fn last_write_wins_in_first_seen_order() {
        let out = finalize(vec![
            rec("a", Some(1.0)),
            rec("b", Some(2.0)),
            rec("a", Some(3.0)),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].listing_url.as_str(), "a");
        assert_eq!(out[0].price, Some(3.0));
        assert_eq!(out[1].price, Some(2.0));
    }

    #[test]
    fn blank_ids_are_dropped() {
        let out = finalize(vec![rec("", Some(1.0)), rec("  ", None), rec("c", None)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].listing_url.as_str(), "c");
    }

    #[test]
    fn one_timestamp_for_the_whole_batch() {
        let out = finalize(vec![rec("a", None), rec("b", None), rec("c", None)]);
        let stamps: HashSet<_> = out.iter().map(|r| r.scraped_at).collect();
        assert_eq!(stamps.len(), 1);
        assert!(out[0].scraped_at.is_some());
    }

    #[test]
    fn empty_batch() {
        assert!(finalize(Vec::new()).is_empty());
    }

    proptest! {
        #[test]
        fn ids_unique_and_never_grows(urls in proptest::collection::vec("[ab c]{0,2}", 0..40)) {
            let input: Vec<_> = urls.iter().map(|u| rec(u, None)).collect();
            let n = input.len();
            let out = finalize(input);

            prop_assert!(out.len() <= n);
            let ids: HashSet<_> = out.iter().map(|r| r.listing_url.clone()).collect();
            prop_assert_eq!(ids.len(), out.len());
            prop_assert!(out.iter().all(|r| !r.listing_url.is_blank()));
        }

        #[test]
        fn finalized_records_carry_every_key(url in "[a-z]{1,8}", price in proptest::option::of(0.0f64..1e6)) {
            let out = finalize(vec![rec(&url, price)]);
            let value = serde_json::to_value(&out[0]).unwrap();
            let obj = value.as_object().unwrap();
            prop_assert_eq!(obj.len(), FIELD_KEYS.len());
            for key in FIELD_KEYS {
                prop_assert!(obj.contains_key(*key));
            }
            prop_assert!(!obj["scraped_at"].is_null());
        }
    }
}
