//! Property-based tests for the feature pipeline using proptest.

use proptest::prelude::*;

use churnfeat_core::encode::count_services;
use churnfeat_core::{CustomerRecord, FeaturePipeline, ServiceFlags, TenureBin};

fn categorical(domain: &'static [&'static str]) -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        4 => prop::sample::select(domain).prop_map(|s| Some(s.to_string())),
        1 => "[a-zA-Z ]{0,12}".prop_map(Some),
        1 => Just(None),
    ]
}

fn flag() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(Some("Yes".to_string())),
        Just(Some("No".to_string())),
        Just(Some("No internet service".to_string())),
        Just(None),
    ]
}

prop_compose! {
    fn customer()(
        id in "[0-9]{4}-[A-Z]{5}",
        gender in categorical(&["Male", "Female"]),
        senior in prop::option::of(0i64..=1),
        tenure in prop::option::of(-5i64..80),
        internet in categorical(&["DSL", "Fiber optic", "No"]),
        contract in categorical(&["Month-to-month", "One year", "Two year"]),
        flags in prop::array::uniform6(flag()),
        charges in prop::option::of(0.0f64..200.0),
    ) -> CustomerRecord {
        CustomerRecord {
            customer_id: id,
            gender,
            senior_citizen: senior,
            tenure,
            internet_service: internet,
            contract,
            services: ServiceFlags::from_values(flags),
            monthly_charges: charges,
        }
    }
}

proptest! {
    #[test]
    fn internet_one_hot_is_exclusive(records in prop::collection::vec(customer(), 1..40)) {
        let out = FeaturePipeline::default().transform(&records).unwrap();
        for row in &out {
            let sum = row.internet_dsl + row.internet_fiber + row.internet_no;
            let in_domain = matches!(
                row.raw.internet_service.as_deref(),
                Some("DSL" | "Fiber optic" | "No")
            );
            prop_assert_eq!(sum, u8::from(in_domain));
        }
    }

    #[test]
    fn tenure_one_hot_matches_bin(records in prop::collection::vec(customer(), 1..40)) {
        let out = FeaturePipeline::default().transform(&records).unwrap();
        for row in &out {
            let sum = row.tenure_bin_short + row.tenure_bin_med + row.tenure_bin_long;
            prop_assert!(sum <= 1);
            let short = matches!(row.raw.tenure, Some(t) if (0..=12).contains(&t));
            prop_assert_eq!(row.tenure_bin_short == 1, short);
            prop_assert_eq!(sum == 0, row.tenure_bin == TenureBin::Unknown);
        }
    }

    #[test]
    fn num_services_counts_yes(records in prop::collection::vec(customer(), 1..40)) {
        let out = FeaturePipeline::default().transform(&records).unwrap();
        for row in &out {
            prop_assert!(row.num_services <= 6);
            let yes = row
                .raw
                .services
                .as_array()
                .iter()
                .filter(|f| **f == Some("Yes"))
                .count() as u8;
            prop_assert_eq!(row.num_services, yes);
            prop_assert_eq!(row.num_services, count_services(row.raw.services.as_array()));
        }
    }

    #[test]
    fn normalized_charge_is_bounded_and_monotonic(
        records in prop::collection::vec(customer(), 2..40)
    ) {
        let out = FeaturePipeline::default().transform(&records).unwrap();
        let mut pairs: Vec<(f64, f64)> = out
            .iter()
            .filter_map(|r| Some((r.raw.monthly_charges?, r.monthly_charges_norm?)))
            .collect();
        for (_, norm) in &pairs {
            prop_assert!((0.0..=1.0).contains(norm));
        }
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        for w in pairs.windows(2) {
            prop_assert!(w[0].1 <= w[1].1);
        }
    }

    #[test]
    fn transform_is_idempotent(records in prop::collection::vec(customer(), 0..40)) {
        let pipeline = FeaturePipeline::default();
        let first = pipeline.transform(&records).unwrap();
        let second = pipeline.transform(&records).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn contract_code_is_never_zero_for_unknown(
        records in prop::collection::vec(customer(), 1..40)
    ) {
        let out = FeaturePipeline::default().transform(&records).unwrap();
        for row in &out {
            if row.raw.contract.as_deref() != Some("Month-to-month") {
                prop_assert_ne!(row.contract_numeric, Some(0));
            }
        }
    }
}
