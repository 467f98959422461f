// FacetEngine end-to-end against a mock executor.

mod common;

use common::*;
use serde_json::json;
use sqlx_facets::facet::{FacetData, ValueOption};
use sqlx_facets::{
    EngineOptions, Error, FacetConfig, FacetEngine, FacetKind, FilterOp, FilterParams, Filters,
    PublicationState, RawRow, SqlValue,
};

fn ranges_row() -> RawRow {
    RawRow::new()
        .with("total", 10i64)
        .with("max_price", 99i64)
        .with("min_price", 5i64)
        .with("count_price", 10i64)
}

fn name_rows(n: usize) -> Vec<RawRow> {
    (0..n)
        .map(|i| RawRow::new().with("value", format!("v{}", i)).with("count", 1i64))
        .collect()
}

#[tokio::test]
async fn test_product_facets() {
    init_tracing();
    let executor = MockExecutor::new(|statement| {
        if is_ranges(statement) {
            Ok(Some(vec![ranges_row()]))
        } else {
            Ok(Some(vec![
                RawRow::new().with("value", "A").with("count", 6i64),
                RawRow::new().with("value", "B").with("count", 4i64),
            ]))
        }
    });
    let engine = FacetEngine::new(catalog(), executor.clone());

    let facets = engine
        .run_filters(PRODUCT, None, FilterParams::default())
        .await
        .unwrap();

    assert_eq!(facets.len(), 2);
    let name = facets.iter().find(|f| f.key == "name").unwrap();
    let price = facets.iter().find(|f| f.key == "price").unwrap();

    assert_eq!(name.kind, FacetKind::List);
    assert!(name.full_set);
    assert_eq!(
        serde_json::to_value(name.items().unwrap()).unwrap(),
        json!([
            {"value": "A", "label": "A", "count": 6},
            {"value": "B", "label": "B", "count": 4}
        ])
    );

    assert_eq!(price.kind, FacetKind::Range);
    assert!(price.full_set);
    assert_eq!(price.title, "Price");
    match &price.data {
        FacetData::Range { min, max, count } => {
            assert_eq!(min.value().and_then(|n| n.as_i64()), Some(5));
            assert_eq!(max.value().and_then(|n| n.as_i64()), Some(99));
            assert_eq!(*count, 10);
        }
        other => panic!("expected a range facet, got {:?}", other),
    }

    // one list query plus the combined ranges query, all live-only
    let statements = executor.statements();
    assert_eq!(statements.len(), 2);
    for statement in &statements {
        assert!(statement.sql.contains("IS NOT NULL"), "{}", statement.sql);
        assert!(!statement.sql.contains("{{"), "{}", statement.sql);
    }
}

#[tokio::test]
async fn test_partial_coverage_is_not_full_set() {
    let executor = MockExecutor::new(|statement| {
        if is_ranges(statement) {
            Ok(Some(vec![RawRow::new()
                .with("total", 10i64)
                .with("max_price", 20i64)
                .with("min_price", 1i64)
                .with("count_price", 7i64)]))
        } else {
            Ok(Some(vec![RawRow::new().with("value", "A").with("count", 9i64)]))
        }
    });
    let engine = FacetEngine::new(catalog(), executor);

    let facets = engine
        .run_filters(PRODUCT, None, FilterParams::default())
        .await
        .unwrap();

    assert!(facets.iter().all(|f| !f.full_set));
}

#[tokio::test]
async fn test_max_values_boundary() {
    let rows_for = |n: usize| {
        MockExecutor::new(move |statement| {
            if is_ranges(statement) {
                Ok(Some(vec![RawRow::new().with("total", n as i64)]))
            } else {
                Ok(Some(name_rows(n)))
            }
        })
    };
    let config = [FacetConfig::list("name")];

    let engine = FacetEngine::new(catalog(), rows_for(3)).with_options(EngineOptions::default().with_max_values(3));
    let facets = engine.run_filters(PRODUCT, Some(&config[..]), FilterParams::default()).await.unwrap();
    assert_eq!(facets.len(), 1);
    assert_eq!(facets[0].items().unwrap().len(), 3);

    let engine = FacetEngine::new(catalog(), rows_for(4)).with_options(EngineOptions::default().with_max_values(3));
    let facets = engine.run_filters(PRODUCT, Some(&config[..]), FilterParams::default()).await.unwrap();
    assert!(facets.is_empty());

    // per-call override wins over the engine option
    let engine = FacetEngine::new(catalog(), rows_for(4)).with_options(EngineOptions::default().with_max_values(3));
    let params = FilterParams {
        max_values: Some(4),
        ..FilterParams::default()
    };
    let facets = engine.run_filters(PRODUCT, Some(&config[..]), params).await.unwrap();
    assert_eq!(facets.len(), 1);
}

#[tokio::test]
async fn test_configured_values_order_and_labels() {
    let executor = MockExecutor::new(|statement| {
        if is_ranges(statement) {
            Ok(Some(vec![RawRow::new().with("total", 5i64)]))
        } else {
            Ok(Some(vec![
                RawRow::new().with("value", "small").with("count", 2i64),
                RawRow::new().with("value", "large").with("count", 3i64),
            ]))
        }
    });
    let engine = FacetEngine::new(catalog(), executor);
    let config = [FacetConfig::list("name")
        .with_title("Size")
        .with_values(vec![
            ValueOption::new("large").with_label("L"),
            ValueOption::new("medium"),
            ValueOption::new("small"),
        ])];

    let facets = engine.run_filters(PRODUCT, Some(&config[..]), FilterParams::default()).await.unwrap();

    assert_eq!(facets[0].title, "Size");
    assert!(facets[0].full_set);
    let items = facets[0].items().unwrap();
    let labels: Vec<_> = items.iter().map(|i| i.label.as_str()).collect();
    assert_eq!(labels, vec!["L", "Small"]);
}

#[tokio::test]
async fn test_unknown_config_keys_are_dropped() {
    let executor = MockExecutor::new(|_| Ok(Some(vec![RawRow::new().with("total", 0i64)])));
    let engine = FacetEngine::new(catalog(), executor.clone());
    let config = [FacetConfig::list("color"), FacetConfig::new("")];

    let facets = engine.run_filters(PRODUCT, Some(&config[..]), FilterParams::default()).await.unwrap();

    assert!(facets.is_empty());
    assert!(executor.statements().is_empty());
}

#[tokio::test]
async fn test_empty_range_is_dropped() {
    let executor = MockExecutor::new(|_| {
        Ok(Some(vec![RawRow::new()
            .with("total", 4i64)
            .with("max_price", SqlValue::Null)
            .with("min_price", SqlValue::Null)
            .with("count_price", 0i64)]))
    });
    let engine = FacetEngine::new(catalog(), executor);
    let config = [FacetConfig::range("price")];

    let facets = engine.run_filters(PRODUCT, Some(&config[..]), FilterParams::default()).await.unwrap();
    assert!(facets.is_empty());
}

#[tokio::test]
async fn test_filters_and_state_reach_every_query() {
    let executor = MockExecutor::new(|statement| {
        if is_ranges(statement) {
            Ok(Some(vec![ranges_row()]))
        } else {
            Ok(Some(name_rows(2)))
        }
    });
    let engine = FacetEngine::new(catalog(), executor.clone());
    let params = FilterParams {
        filters: Some(Filters::new().with("price", FilterOp::Gte(SqlValue::Int(5)))),
        publication_state: Some(PublicationState::All),
        ..FilterParams::default()
    };

    engine.run_filters(PRODUCT, None, params).await.unwrap();

    for statement in executor.statements() {
        assert_eq!(statement.parameters, vec![SqlValue::Int(5)]);
        assert!(!statement.sql.contains("published_at"), "{}", statement.sql);
    }
}

#[tokio::test]
async fn test_backend_failure_fails_the_call() {
    let executor = MockExecutor::new(|statement| {
        if is_ranges(statement) {
            Ok(Some(vec![ranges_row()]))
        } else {
            Err(backend_down())
        }
    });
    let engine = FacetEngine::new(catalog(), executor);

    let result = engine.run_filters(PRODUCT, None, FilterParams::default()).await;
    assert!(matches!(result, Err(Error::Database(_))));
}

#[tokio::test]
async fn test_missing_ranges_row() {
    let executor = MockExecutor::new(|_| Ok(Some(Vec::new())));
    let engine = FacetEngine::new(catalog(), executor);

    let result = engine.run_filters(PRODUCT, None, FilterParams::default()).await;
    assert!(matches!(result, Err(Error::MissingAggregate(_))));
}

#[tokio::test]
async fn test_unknown_entity() {
    let engine = FacetEngine::new(catalog(), MockExecutor::new(|_| Ok(None)));

    let result = engine.run_filters("api::nope.nope", None, FilterParams::default()).await;
    assert!(matches!(result, Err(Error::UnknownEntity(_))));
}

#[tokio::test]
async fn test_results_serialize() {
    let executor = MockExecutor::new(|statement| {
        if is_ranges(statement) {
            Ok(Some(vec![ranges_row()]))
        } else {
            Ok(Some(vec![RawRow::new().with("value", "A").with("count", 10i64)]))
        }
    });
    let engine = FacetEngine::new(catalog(), executor);

    let facets = engine.run_filters(PRODUCT, None, FilterParams::default()).await.unwrap();
    let json = serde_json::to_value(&facets).unwrap();

    assert_eq!(
        json,
        json!([
            {
                "key": "name", "type": "list", "title": "Name", "full_set": true,
                "items": [{"value": "A", "label": "A", "count": 10}]
            },
            {
                "key": "price", "type": "range", "title": "Price", "full_set": true,
                "min": 5, "max": 99, "count": 10
            }
        ])
    );
}
