use std::sync::atomic::Ordering;

use super::{anime_catalog, hashing_engine, item, SwitchableProvider};
use crate::error::RecommendError;
use crate::recommendation::Recommendation;
use crate::semantic::{EngineState, IndexError, Recommender};

fn assert_ranked(results: &[Recommendation]) {
    for rec in results {
        assert!(
            (-1.0..=1.0).contains(&rec.similarity),
            "similarity out of bounds: {}",
            rec.similarity
        );
    }
    for pair in results.windows(2) {
        assert!(pair[0].similarity >= pair[1].similarity);
    }
}

#[test]
fn test_three_item_catalog_excludes_query_item() {
    let engine = hashing_engine();
    engine
        .build(vec![
            item("Naruto", Some("A young ninja dreams of leading his village")),
            item("Bleach", Some("A teenager becomes a soul reaper")),
            item("One Piece", Some("A pirate crew hunts for treasure")),
        ])
        .unwrap();
    assert_eq!(engine.indexed_count(), 3);

    let results = engine.recommend_by_title("Naruto", 2).unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|rec| rec.title != "Naruto"));
    assert_ranked(&results);
}

#[test]
fn test_title_without_synopsis_is_not_indexed() {
    let engine = hashing_engine();
    let mut catalog = anime_catalog();
    catalog.insert(2, item("Recap Special", None));
    engine.build(catalog).unwrap();

    assert_eq!(engine.indexed_count(), 10);
    assert!(matches!(
        engine.recommend_by_title("Recap Special", 5),
        Err(RecommendError::ItemNotIndexed(title)) if title == "Recap Special"
    ));

    // Rows after the gap still join to the right items
    let results = engine.recommend_by_synopsis("rubber pirate grand line treasure", 1).unwrap();
    assert_eq!(results[0].title, "One Piece");
}

#[test]
fn test_unknown_title_not_found() {
    let engine = hashing_engine();
    engine.build(anime_catalog()).unwrap();

    assert!(matches!(
        engine.recommend_by_title("Dragon Ball", 5),
        Err(RecommendError::TitleNotFound(_))
    ));
}

#[test]
fn test_title_match_ignores_case() {
    let engine = hashing_engine();
    engine.build(anime_catalog()).unwrap();

    let lower = engine.recommend_by_title("one piece", 3).unwrap();
    let upper = engine.recommend_by_title("ONE PIECE", 3).unwrap();
    assert_eq!(lower, upper);
    assert!(lower.iter().all(|rec| rec.title != "One Piece"));
}

#[test]
fn test_empty_catalog() {
    let engine = hashing_engine();
    assert!(matches!(engine.build(vec![]), Err(RecommendError::EmptyCatalog)));

    let no_synopses = vec![item("A", None), item("B", Some("  \n"))];
    assert!(matches!(
        engine.build(no_synopses),
        Err(RecommendError::EmptyCatalog)
    ));
    assert_eq!(engine.state(), EngineState::Uninitialized);
}

#[test]
fn test_empty_synopsis_query() {
    let engine = hashing_engine();
    engine.build(anime_catalog()).unwrap();

    for text in ["", "   ", "\t\n"] {
        assert!(matches!(
            engine.recommend_by_synopsis(text, 5),
            Err(RecommendError::EmptyQuery)
        ));
    }
}

#[test]
fn test_large_k_returns_every_row_ranked() {
    let engine = hashing_engine();
    engine.build(anime_catalog()).unwrap();

    let results = engine
        .recommend_by_synopsis("a student at school", 1000)
        .unwrap();
    assert_eq!(results.len(), 10);
    assert_ranked(&results);

    let by_title = engine.recommend_by_title("Haikyuu", 1000).unwrap();
    assert_eq!(by_title.len(), 9);
    assert_ranked(&by_title);
}

#[test]
fn test_self_exclusion_with_duplicate_titles() {
    let engine = hashing_engine();
    let mut catalog = anime_catalog();
    catalog.insert(0, item("Hero", Some("A masked hero protects the city at night")));
    catalog.push(item("hero", Some("A masked hero protects the city at night")));
    engine.build(catalog).unwrap();

    let results = engine.recommend_by_title("HERO", 3).unwrap();
    assert_eq!(results.len(), 3);

    // The duplicate is a different row and is kept; the query row is not
    assert_eq!(results[0].title, "hero");
    assert!((results[0].similarity - 1.0).abs() < 1e-5);
    assert_eq!(
        results
            .iter()
            .filter(|rec| rec.title.eq_ignore_ascii_case("hero"))
            .count(),
        1
    );
}

#[test]
fn test_synopsis_query_is_deterministic() {
    let engine = hashing_engine();
    engine.build(anime_catalog()).unwrap();

    let first = engine.recommend_by_synopsis("pirates at sea", 5).unwrap();
    let second = engine.recommend_by_synopsis("pirates at sea", 5).unwrap();
    assert_eq!(first, second);
    assert_ranked(&first);
}

#[test]
fn test_synopsis_query_finds_related_titles() {
    let engine = hashing_engine();
    engine.build(anime_catalog()).unwrap();

    let results = engine
        .recommend_by_synopsis("ninja of the leaf village and the hokage", 2)
        .unwrap();
    let titles: Vec<&str> = results.iter().map(|rec| rec.title.as_str()).collect();
    assert!(titles.contains(&"Naruto"));
    assert!(titles.contains(&"Boruto"));
}

#[test]
fn test_missing_fields_filled_with_defaults() {
    let engine = hashing_engine();
    engine.build(anime_catalog()).unwrap();

    let results = engine.recommend_by_title("Naruto", 3).unwrap();
    for rec in results {
        assert_eq!(rec.score, 52.0);
        assert_eq!(rec.year, 0);
        assert_eq!(rec.genres, "");
        assert_eq!(rec.kind, "");
    }
}

#[test]
fn test_rebuild_replaces_catalog() {
    let engine = hashing_engine();
    engine.build(anime_catalog()).unwrap();
    engine
        .build(vec![
            item("Monster", Some("A surgeon hunts a former patient")),
            item("Pluto", Some("A robot detective investigates murders")),
        ])
        .unwrap();

    assert_eq!(engine.indexed_count(), 2);
    assert!(matches!(
        engine.recommend_by_title("Naruto", 3),
        Err(RecommendError::TitleNotFound(_))
    ));
    assert_eq!(engine.recommend_by_title("Monster", 3).unwrap().len(), 1);
}

#[test]
fn test_query_without_tokens_rejected() {
    let engine = hashing_engine();
    engine.build(anime_catalog()).unwrap();

    assert!(matches!(
        engine.recommend_by_synopsis("?!", 3),
        Err(RecommendError::Index(IndexError::ZeroNormVector { row: None }))
    ));
}

#[test]
fn test_provider_failure_during_query() {
    let (provider, available) = SwitchableProvider::new();
    let engine = Recommender::new(Box::new(provider));
    engine.build(anime_catalog()).unwrap();

    available.store(false, Ordering::SeqCst);
    assert!(matches!(
        engine.recommend_by_synopsis("pirates", 3),
        Err(RecommendError::ProviderUnavailable(_))
    ));

    // Title queries reuse stored vectors and never call the provider
    assert_eq!(engine.state(), EngineState::Ready);
    assert_eq!(engine.recommend_by_title("Bleach", 3).unwrap().len(), 3);
}

#[test]
fn test_provider_failure_during_build_keeps_state() {
    let (provider, available) = SwitchableProvider::new();
    let engine = Recommender::new(Box::new(provider));
    engine.build(anime_catalog()).unwrap();
    let before = engine.recommend_by_title("Naruto", 5).unwrap();

    available.store(false, Ordering::SeqCst);
    let result = engine.build(vec![item("Monster", Some("A surgeon hunts a former patient"))]);
    assert!(matches!(result, Err(RecommendError::ProviderUnavailable(_))));

    assert_eq!(engine.indexed_count(), 10);
    assert_eq!(engine.recommend_by_title("Naruto", 5).unwrap(), before);
}

#[test]
fn test_provider_failure_on_first_build() {
    let (provider, available) = SwitchableProvider::new();
    available.store(false, Ordering::SeqCst);
    let engine = Recommender::new(Box::new(provider));

    assert!(engine.build(anime_catalog()).is_err());
    assert_eq!(engine.state(), EngineState::Uninitialized);
}

#[test]
fn test_concurrent_queries() {
    let engine = hashing_engine();
    engine.build(anime_catalog()).unwrap();

    let expected_title = engine.recommend_by_title("Black Lagoon", 4).unwrap();
    let expected_text = engine.recommend_by_synopsis("school", 4).unwrap();

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..20 {
                    assert_eq!(
                        engine.recommend_by_title("Black Lagoon", 4).unwrap(),
                        expected_title
                    );
                    assert_eq!(
                        engine.recommend_by_synopsis("school", 4).unwrap(),
                        expected_text
                    );
                }
            });
        }
    });
}

#[test]
fn test_queries_during_rebuild_see_a_complete_snapshot() {
    let engine = hashing_engine();
    engine.build(anime_catalog()).unwrap();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for _ in 0..10 {
                engine.build(anime_catalog()).unwrap();
            }
        });
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..50 {
                    let results = engine.recommend_by_title("Naruto", 9).unwrap();
                    assert_eq!(results.len(), 9);
                }
            });
        }
    });
}
