use chrono::NaiveDate;
use geo_insights_core::{
    aggregate::{
        geo_mix::geo_mix_by_house,
        platform::{platform_composition, ranked_channel_platforms},
        AggregateResult, ShareRow,
    },
    config::GeoConfig,
    dataset::{BuyerType, Dataset, HouseMeta, TransactionRecord},
    filter::View,
    geo::{DistanceTaxonomy, GroupingScheme},
};

// ── Helpers ───────────────────────────────────────────────────────

fn taxonomy() -> DistanceTaxonomy {
    DistanceTaxonomy::from_config(&GeoConfig::default_test()).unwrap()
}

fn tx(customer: &str, house: &str, km: f64, channel: Option<(&str, &str)>) -> TransactionRecord {
    TransactionRecord {
        customer_id: customer.into(),
        created_at: NaiveDate::from_ymd_opt(2025, 3, 4)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap(),
        plz: "702".into(),
        city: Some("Stuttgart".into()),
        distance_km: Some(km),
        distance_band: None,
        revenue: 30.0,
        ftb_rb: BuyerType::FirstTime,
        is_renewal: false,
        channel_type: channel.map(|c| c.0.into()),
        platform: channel.map(|c| c.1.into()),
        house_id: house.into(),
        event_category: None,
    }
}

fn share_rows(result: &AggregateResult) -> &[ShareRow] {
    match result {
        AggregateResult::Shares { rows, .. } => rows,
        other => panic!("expected share rows, got {other:?}"),
    }
}

fn candidates() -> Vec<String> {
    GeoConfig::default_test().platform_candidates
}

// ── Geo mix ───────────────────────────────────────────────────────

#[test]
fn geo_mix_orders_houses_by_rank_not_name() {
    let data = Dataset::new(vec![
        tx("a", "h-a", 10.0, None),
        tx("b", "h-z", 10.0, None),
        tx("c", "h-z", 400.0, None),
    ])
    .with_houses(vec![
        HouseMeta { house_id: "h-a".into(), name: "Alpha".into(), rank: 2 },
        HouseMeta { house_id: "h-z".into(), name: "Zulu".into(), rank: 1 },
    ]);
    let view = View::from_records(&data.transactions);
    let result = geo_mix_by_house(&view, &data, &taxonomy(), GroupingScheme::ThreeTier, 1).unwrap();
    let rows = share_rows(&result);

    assert_eq!(rows.len(), 2 * 3);
    assert_eq!(rows[0].group, "Zulu");
    assert_eq!(rows[3].group, "Alpha");
    assert_eq!(rows[0].customers, 1);
    assert_eq!(rows[0].share_pct, 50.0);
    assert_eq!(rows[2].share_pct, 50.0, "National tier of Zulu");
    assert_eq!(rows[3].share_pct, 100.0);
}

#[test]
fn geo_mix_needs_house_metadata() {
    let data = Dataset::new(vec![tx("a", "h-a", 10.0, None)]);
    let view = View::from_records(&data.transactions);
    assert!(geo_mix_by_house(&view, &data, &taxonomy(), GroupingScheme::SixBand, 1).is_err());
}

// ── Platform ──────────────────────────────────────────────────────

#[test]
fn platforms_rank_by_distinct_customers() {
    let records = vec![
        tx("a", "h", 10.0, Some(("Paid Search", "Google"))),
        tx("b", "h", 10.0, Some(("Paid Social", "Meta"))),
        tx("c", "h", 10.0, Some(("Paid Social", "Meta"))),
        tx("c", "h", 10.0, Some(("Paid Social", "Meta"))),
        tx("d", "h", 10.0, Some(("Referral", "Partner"))),
        tx("e", "h", 10.0, Some(("Referral", "Partner"))),
        tx("f", "h", 10.0, Some(("Referral", "Partner"))),
        tx("g", "h", 10.0, None),
    ];
    let view = View::from_records(&records);

    let ranked = ranked_channel_platforms(&view, &candidates());
    assert_eq!(
        ranked,
        vec![
            ("Paid Social | Meta".to_string(), 2),
            ("Paid Search | Google".to_string(), 1),
        ],
        "Partner is not a candidate and never appears"
    );
}

#[test]
fn platform_shares_are_within_each_option() {
    let records = vec![
        tx("a", "h", 10.0, Some(("Paid Social", "Meta"))),
        tx("b", "h", 150.0, Some(("Paid Social", "Meta"))),
        tx("c", "h", 150.0, Some(("Paid Social", "Meta"))),
        tx("d", "h", 600.0, Some(("Direct", "Direct"))),
    ];
    let view = View::from_records(&records);
    let result = platform_composition(&view, &candidates(), &taxonomy(), GroupingScheme::ThreeTier, 1);
    let rows = share_rows(&result);

    assert_eq!(rows.len(), 2 * 3);
    assert_eq!(rows[0].group, "Paid Social | Meta");
    assert_eq!(rows[0].share_pct, 33.3);
    assert_eq!(rows[1].share_pct, 66.7);
    assert_eq!(rows[5].group, "Direct | Direct");
    assert_eq!(rows[5].share_pct, 100.0);
}

#[test]
fn no_candidate_platform_yields_a_sentinel() {
    let records = vec![tx("a", "h", 10.0, Some(("Referral", "Partner")))];
    let view = View::from_records(&records);
    let result = platform_composition(&view, &candidates(), &taxonomy(), GroupingScheme::SixBand, 1);
    assert!(result.is_unavailable());
}
