use sarkari_portal::query_state::{ListingLocation, ListingParams, ListingUpdate, SortKey};

#[test]
fn test_missing_keys_take_defaults() {
    let params = ListingParams::from_query("");
    assert_eq!(params, ListingParams::default());
    assert_eq!(params.sort, SortKey::Newest);
}

#[test]
fn test_unknown_sort_falls_back_to_newest() {
    assert_eq!(ListingParams::from_query("?sort=oldest").sort, SortKey::Newest);
    assert_eq!(ListingParams::from_query("sort=updated").sort, SortKey::Updated);
}

#[test]
fn test_round_trip_strips_empty_values_and_reparses() {
    let location = ListingLocation::parse("/category/result", "?organization=&tag=SSC&year=2024&sort=updated");
    let updated = location.update_params(&ListingUpdate {
        tag: Some(String::new()),
        ..Default::default()
    });

    let query = updated.query_string();
    assert!(!query.contains("tag="));
    assert!(!query.contains("organization="));
    assert!(query.split('&').all(|pair| !pair.ends_with('=')));

    let reparsed = ListingParams::from_query(&query);
    assert_eq!(reparsed, updated.params);
    assert_eq!(reparsed.year, "2024");
    assert_eq!(reparsed.sort, SortKey::Updated);
}

#[test]
fn test_update_preserves_other_params() {
    let location = ListingLocation::parse("/category/result", "organization=SSC&year=2023");
    let next = location.update_params(&ListingUpdate {
        year: Some("2024".into()),
        ..Default::default()
    });
    assert_eq!(next.params.organization, "SSC");
    assert_eq!(next.params.year, "2024");
    assert_eq!(next.href(), "/category/result?organization=SSC&year=2024");
}

#[test]
fn test_default_state_has_no_query() {
    let location = ListingLocation::parse("/category/admitCard", "sort=newest&tag=");
    assert_eq!(location.href(), "/category/admitCard");
    assert!(!location.is_canonical_query("sort=newest&tag="));
    assert!(location.is_canonical_query(""));
}

#[test]
fn test_search_text_survives_filter_change() {
    let location = ListingLocation::parse("/search", "q=constable&tag=SSC");
    let next = location.update_params(&ListingUpdate {
        sort: Some(SortKey::Updated),
        ..Default::default()
    });
    assert_eq!(next.search, "constable");
    assert_eq!(next.href(), "/search?q=constable&sort=updated&tag=SSC");
}

#[test]
fn test_values_are_url_encoded() {
    let params = ListingParams {
        organization: "Staff Selection & Co".into(),
        ..Default::default()
    };
    let query = params.to_query_string();
    assert_eq!(query, "organization=Staff+Selection+%26+Co");
    assert_eq!(ListingParams::from_query(&query), params);
}

#[test]
fn test_repeated_key_keeps_last_value() {
    assert_eq!(ListingParams::from_query("tag=a&tag=b").tag, "b");
}
