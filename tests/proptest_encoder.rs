//! Property-based tests for entry encoding.
//!
//! These tests verify the encoder is total over categories, deterministic,
//! and keeps the temporal feature inside a day for every accepted
//! timestamp layout.

use ledgerscan::features::{EntryEncoder, LabelSpace, DEFAULT_CATEGORIES};
use ledgerscan::{Entry, NUM_FEATURES};
use proptest::prelude::*;

/// Strategy for valid timestamps paired with their expected hour of day
///
/// Covers every layout the parser accepts: naive with `T` or space, with or
/// without seconds, fractional seconds, `Z`, `+hh:mm` and `+hhmm` offsets,
/// and bare dates.
fn timestamp_with_hour() -> impl Strategy<Value = (String, f64)> {
    (
        (2000i32..2100, 1u32..=12, 1u32..=28),
        (0u32..24, 0u32..60, 0u32..60),
        (0usize..9, 0u32..1000, any::<bool>(), 0u32..14, prop::sample::select(vec![0u32, 30, 45])),
    )
        .prop_map(|((y, mo, d), (h, mi, s), (layout, millis, west, oh, om))| {
            let date = format!("{:04}-{:02}-{:02}", y, mo, d);
            let sign = if west { '-' } else { '+' };
            let ts = match layout {
                0 => format!("{}T{:02}:{:02}:{:02}", date, h, mi, s),
                1 => format!("{} {:02}:{:02}:{:02}", date, h, mi, s),
                2 => format!("{}T{:02}:{:02}", date, h, mi),
                3 => format!("{} {:02}:{:02}", date, h, mi),
                4 => format!("{}T{:02}:{:02}:{:02}.{:03}", date, h, mi, s, millis),
                5 => format!("{}T{:02}:{:02}:{:02}Z", date, h, mi, s),
                6 => format!("{}T{:02}:{:02}:{:02}{}{:02}:{:02}", date, h, mi, s, sign, oh, om),
                7 => format!("{}T{:02}:{:02}:{:02}{}{:02}{:02}", date, h, mi, s, sign, oh, om),
                _ => return (date, 0.0),
            };
            (ts, h as f64 + mi as f64 / 60.0)
        })
}

/// Strategy for valid timestamps in any accepted layout
fn timestamp() -> impl Strategy<Value = String> {
    timestamp_with_hour().prop_map(|(ts, _)| ts)
}

/// Strategy for category labels, known and unknown
fn category() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        prop::sample::select(DEFAULT_CATEGORIES).prop_map(|c| Some(c.to_string())),
        "[a-zA-Z ]{0,16}".prop_map(Some),
    ]
}

fn entry() -> impl Strategy<Value = Entry> {
    (
        -1.0e6f64..1.0e6,
        timestamp(),
        category(),
        prop::option::of(prop_oneof![Just("debit"), Just("credit"), Just("DEBIT"), Just("refund")]),
        prop::option::of(any::<bool>()),
    )
        .prop_map(|(amount, ts, category, entry_type, is_reversal)| Entry {
            user_id: None,
            amount,
            timestamp: Some(ts),
            category,
            entry_type: entry_type.map(str::to_string),
            is_reversal,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: encoding the same entry twice gives identical vectors
    #[test]
    fn encoding_is_deterministic(e in entry()) {
        let encoder = EntryEncoder::default();
        let a = encoder.encode(&e).unwrap();
        let b = encoder.encode(&e).unwrap();
        prop_assert_eq!(a, b);
    }

    /// Property: vectors always have the canonical width and layout
    #[test]
    fn vector_layout(e in entry()) {
        let v = EntryEncoder::default().encode(&e).unwrap();
        prop_assert_eq!(v.len(), NUM_FEATURES);
        prop_assert_eq!(v.as_slice()[0], e.amount);
        prop_assert!(v.as_slice()[3] == 0.0 || v.as_slice()[3] == 1.0);
        prop_assert_eq!(v.as_slice()[4], if e.is_reversal == Some(true) { 1.0 } else { 0.0 });
    }

    /// Property: hour of day stays in [0, 24)
    #[test]
    fn hour_in_range(ts in timestamp()) {
        let e = Entry::new(1.0, ts);
        let hour = EntryEncoder::default().encode(&e).unwrap().as_slice()[1];
        prop_assert!((0.0..24.0).contains(&hour));
    }

    /// Property: hour of day is the wall-clock time as written, whatever the layout
    #[test]
    fn hour_matches_written_time((ts, expected) in timestamp_with_hour()) {
        let e = Entry::new(1.0, ts.clone());
        let hour = EntryEncoder::default().encode(&e).unwrap().as_slice()[1];
        prop_assert_eq!(hour, expected, "timestamp {}", ts);
    }

    /// Property: category code is always a valid index, unknowns go to "others"
    #[test]
    fn category_code_total(label in "[a-z]{1,12}") {
        let space = LabelSpace::default();
        let code = space.encode(Some(label.as_str()));
        prop_assert!(code < space.len());
        if !DEFAULT_CATEGORIES.contains(&label.as_str()) && label != "others" {
            prop_assert_eq!(code, space.others_index());
        }
    }

    /// Property: user id never influences the vector
    #[test]
    fn user_id_ignored(e in entry(), user in "[a-z0-9-]{1,20}") {
        let encoder = EntryEncoder::default();
        let with_user = e.clone().with_user(user);
        prop_assert_eq!(encoder.encode(&e).unwrap(), encoder.encode(&with_user).unwrap());
    }
}
