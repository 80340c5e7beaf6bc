use serde_json::json;

use super::*;

fn mugs_and_hats() -> Vec<CollectionSummary> {
    vec![
        CollectionSummary::new("mugs", "Mugs"),
        CollectionSummary::new("hats", "Hats"),
    ]
}

#[test]
fn merging_collections_twice_is_idempotent() {
    let batch = mugs_and_hats();

    let mut once = SiteDocument::new("shop.example");
    once.merge_collections(&batch);

    let mut twice = once.clone();
    let stats = twice.merge_collections(&batch);

    assert_eq!(once, twice);
    assert_eq!(
        stats,
        MergeStats {
            inserted: 0,
            updated: 2
        }
    );
}

#[test]
fn collection_metadata_is_overwritten_in_place() {
    let mut doc = SiteDocument::new("shop.example");
    doc.merge_collections(&mugs_and_hats());
    doc.merge_products("mugs", &[ProductRecord::new(1, "Blue mug")]);

    doc.merge_collections(&[CollectionSummary::new("mugs", "Coffee Mugs")]);

    let handles: Vec<&str> = doc.collections.iter().map(|c| c.handle.as_str()).collect();
    assert_eq!(handles, ["mugs", "hats"]);
    let mugs = doc.collection("mugs").unwrap();
    assert_eq!(mugs.title.as_deref(), Some("Coffee Mugs"));
    assert_eq!(mugs.product_ids(), [1], "products survive a metadata update");
}

#[test]
fn collections_without_handle_are_ignored() {
    let mut doc = SiteDocument::new("shop.example");
    let stats = doc.merge_collections(&[CollectionSummary::new("", "Nameless")]);
    assert_eq!(stats.total(), 0);
    assert!(doc.collections.is_empty());
}

#[test]
fn duplicate_handles_in_one_batch_keep_the_last() {
    let mut doc = SiteDocument::new("shop.example");
    doc.merge_collections(&[
        CollectionSummary::new("mugs", "Old"),
        CollectionSummary::new("mugs", "New"),
    ]);
    assert_eq!(doc.collections.len(), 1);
    assert_eq!(doc.collections[0].title.as_deref(), Some("New"));
}

#[test]
fn product_replacement_is_wholesale() {
    let mut doc = SiteDocument::new("shop.example");
    let mut first: ProductRecord =
        serde_json::from_value(json!({"id": 7, "title": "Mug", "vendor": "Acme", "tags": ["a"]}))
            .unwrap();
    doc.merge_products("mugs", std::slice::from_ref(&first));

    first = serde_json::from_value(json!({"id": 7, "title": "Mug v2"})).unwrap();
    let stats = doc.merge_products("mugs", &[first]);

    assert_eq!(stats.updated, 1);
    let stored = &doc.collection("mugs").unwrap().products[0];
    assert_eq!(stored.title.as_deref(), Some("Mug v2"));
    assert!(
        stored.attributes.is_empty(),
        "old fields must not survive a re-fetch: {:?}",
        stored.attributes
    );
}

#[test]
fn same_product_under_two_collections_is_stored_twice() {
    let mut doc = SiteDocument::new("shop.example");
    doc.merge_products("mugs", &[ProductRecord::new(1, "Mug")]);
    doc.merge_products("gifts", &[ProductRecord::new(1, "Mug")]);

    assert_eq!(doc.collection("mugs").unwrap().product_ids(), [1]);
    assert_eq!(doc.collection("gifts").unwrap().product_ids(), [1]);
}

#[test]
fn products_for_unknown_collection_create_untitled_entry() {
    let mut doc = SiteDocument::new("shop.example");
    doc.merge_products("mugs", &[ProductRecord::new(1, "Mug")]);

    let mugs = doc.collection("mugs").unwrap();
    assert!(mugs.title.is_none());

    doc.merge_collections(&[CollectionSummary::new("mugs", "Mugs")]);
    let mugs = doc.collection("mugs").unwrap();
    assert_eq!(mugs.title.as_deref(), Some("Mugs"));
    assert_eq!(mugs.product_ids(), [1]);
}

#[test]
fn out_of_order_pages_converge() {
    let page_one = [ProductRecord::new(1, "a"), ProductRecord::new(2, "b")];
    let page_two = [ProductRecord::new(3, "c")];

    let mut forward = SiteDocument::new("s");
    forward.merge_products("mugs", &page_one);
    forward.merge_products("mugs", &page_two);

    let mut backward = SiteDocument::new("s");
    backward.merge_products("mugs", &page_two);
    backward.merge_products("mugs", &page_one);
    backward.merge_products("mugs", &page_two);

    let mut fwd = forward.collection("mugs").unwrap().product_ids();
    let mut bwd = backward.collection("mugs").unwrap().product_ids();
    fwd.sort_unstable();
    bwd.sort_unstable();
    assert_eq!(fwd, bwd);
    assert_eq!(fwd, [1, 2, 3]);
}

#[test]
fn document_serializes_to_persisted_layout() {
    let mut doc = SiteDocument::new("shop.example");
    doc.merge_collections(&[CollectionSummary::new("mugs", "Mugs")]);
    doc.merge_products("mugs", &[ProductRecord::new(1, "Mug")]);

    assert_eq!(
        serde_json::to_value(&doc).unwrap(),
        json!({
            "site": "shop.example",
            "collections": [{
                "handle": "mugs",
                "title": "Mugs",
                "products": [{"id": 1, "title": "Mug"}]
            }]
        })
    );
}

#[test]
fn upstream_collection_fields_are_preserved() {
    let summary: CollectionSummary = serde_json::from_value(json!({
        "id": 99,
        "handle": "mugs",
        "title": "Mugs",
        "products_count": 12
    }))
    .unwrap();
    assert_eq!(summary.attributes.get("products_count"), Some(&json!(12)));
    assert_eq!(summary.attributes.get("id"), Some(&json!(99)));
}

#[test]
fn latest_by_key_keeps_first_position() {
    let items = [(1, "a"), (2, "b"), (1, "c")];
    let out = latest_by_key(items.iter(), |(k, _)| *k);
    assert_eq!(out, [&(1, "c"), &(2, "b")]);
}

#[test]
fn handles_are_trimmed_when_parsed() {
    let padded: CollectionSummary =
        serde_json::from_value(json!({"handle": " mugs ", "title": "Mugs"})).unwrap();
    assert_eq!(padded.handle, "mugs");

    let blank: CollectionSummary =
        serde_json::from_value(json!({"handle": "   ", "title": "Blank"})).unwrap();
    assert!(!blank.has_handle());

    let null: CollectionSummary = serde_json::from_value(json!({"handle": null})).unwrap();
    assert!(!null.has_handle());

    let mut doc = SiteDocument::new("shop.example");
    doc.merge_collections(&[padded, CollectionSummary::new("mugs", "Mugs v2")]);
    assert_eq!(doc.collections.len(), 1);
    assert_eq!(doc.collections[0].title.as_deref(), Some("Mugs v2"));
}
