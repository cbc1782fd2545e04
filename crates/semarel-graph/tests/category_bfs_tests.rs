use approx::assert_abs_diff_eq;
use semarel_graph::{
    shortest_distance, BfsOptions, CategoryBfs, CategoryGraph, CategorySimilarity, Document,
    DocumentKind, SimilarityStrategy, VecCollection,
};

fn article(id: u32, title: &str, categories: &[&str]) -> Document {
    Document {
        id,
        title: title.to_string(),
        kind: DocumentKind::Article,
        categories: categories.iter().map(|s| s.to_string()).collect(),
        text: String::new(),
    }
}

fn category(id: u32, title: &str, parents: &[&str]) -> Document {
    Document {
        id,
        title: title.to_string(),
        kind: DocumentKind::Category,
        categories: parents.iter().map(|s| s.to_string()).collect(),
        text: String::new(),
    }
}

/// music
///  ├─ classical: {1, 3}
///  └─ jazz: {2}
/// islands: {9}        (disconnected)
fn music_collection() -> VecCollection {
    VecCollection::new(vec![
        category(100, "music", &[]),
        category(101, "classical", &["music"]),
        category(102, "jazz", &["music"]),
        category(103, "islands", &[]),
        article(1, "fugue", &["classical"]),
        article(2, "bebop", &["jazz"]),
        article(3, "sonata", &["classical"]),
        article(9, "atoll", &["islands"]),
    ])
}

#[test]
fn two_sided_distance_matches_hand_computed_path() {
    let graph = CategoryGraph::build(&music_collection()).unwrap();
    let classical = graph.category_index("classical").unwrap();
    let jazz = graph.category_index("jazz").unwrap();
    let music = graph.category_index("music").unwrap();

    // 1 climbs classical -> music, 2 climbs jazz -> music; music's cost is
    // counted once.
    let expected = graph.path_distance(&[classical, music, jazz]);
    let got = shortest_distance(&graph, 1, 2).unwrap();
    assert_abs_diff_eq!(got, expected, epsilon = 0.001);
}

#[test]
fn entities_sharing_a_category_are_one_hop_apart() {
    let graph = CategoryGraph::build(&music_collection()).unwrap();
    let classical = graph.category_index("classical").unwrap();

    let got = shortest_distance(&graph, 1, 3).unwrap();
    assert_abs_diff_eq!(got, graph.cost(classical), epsilon = 0.001);
}

#[test]
fn similarity_is_symmetric() {
    let graph = CategoryGraph::build(&music_collection()).unwrap();
    let strategy = CategorySimilarity::new(&graph);
    let ab = strategy.similarity(1, 2).unwrap();
    let ba = strategy.similarity(2, 1).unwrap();
    assert_abs_diff_eq!(ab, ba, epsilon = 1e-12);

    // The score is exactly the transform of the measured distance.
    let distance = shortest_distance(&graph, 1, 2).unwrap();
    assert_abs_diff_eq!(ab, graph.distance_to_score(distance), epsilon = 1e-12);
}

#[test]
fn self_similarity_is_score_of_distance_zero() {
    let graph = CategoryGraph::build(&music_collection()).unwrap();
    let strategy = CategorySimilarity::new(&graph);
    for entity in [1, 2, 3, 9] {
        assert_eq!(
            strategy.similarity(entity, entity).unwrap(),
            graph.distance_to_score(0.0)
        );
    }
    assert_eq!(graph.distance_to_score(0.0), 1.0);
}

#[test]
fn disconnected_entities_score_zero() {
    let graph = CategoryGraph::build(&music_collection()).unwrap();
    let strategy = CategorySimilarity::new(&graph);
    assert_eq!(strategy.similarity(1, 9).unwrap(), 0.0);
    assert!(shortest_distance(&graph, 1, 9).is_none());
}

#[test]
fn closer_entities_score_higher() {
    let graph = CategoryGraph::build(&music_collection()).unwrap();
    let strategy = CategorySimilarity::new(&graph);
    // Same category beats same grandparent.
    assert!(strategy.similarity(1, 3).unwrap() > strategy.similarity(1, 2).unwrap());
}

/// A chain of small specific categories must be cheaper (and so score
/// higher) than a chain of broad ones.
#[test]
fn specific_chain_is_cheaper_than_broad_chain() {
    let mut docs = vec![
        category(200, "vowel letters", &["poetry"]),
        category(201, "poetry", &["symphonic poems"]),
        category(202, "symphonic poems", &[]),
        category(203, "people of the trojan war", &["people"]),
        category(204, "people", &["1809 births"]),
        category(205, "1809 births", &[]),
        article(10, "aeiou", &["vowel letters"]),
    ];
    // Broad categories: pad each with many members.
    for i in 0..40 {
        docs.push(article(
            1000 + i,
            "hero",
            &["people of the trojan war", "people", "1809 births"],
        ));
    }
    let graph = CategoryGraph::build(&VecCollection::new(docs)).unwrap();

    let specific = [
        graph.category_index("vowel letters").unwrap(),
        graph.category_index("poetry").unwrap(),
        graph.category_index("symphonic poems").unwrap(),
    ];
    let broad = [
        graph.category_index("people of the trojan war").unwrap(),
        graph.category_index("people").unwrap(),
        graph.category_index("1809 births").unwrap(),
    ];

    let specific_cost = graph.path_distance(&specific);
    let broad_cost = graph.path_distance(&broad);
    assert!(specific_cost < broad_cost);
    assert!(graph.distance_to_score(specific_cost) > graph.distance_to_score(broad_cost));
}

#[test]
fn top_k_is_bounded_and_ranked() {
    let graph = CategoryGraph::build(&music_collection()).unwrap();
    let strategy = CategorySimilarity::new(&graph);

    // Entities reachable from 1: 3 (same category) and 2 (via music).
    let row = strategy.top_k_neighbors(1, 10).unwrap();
    assert_eq!(row.len(), 2);
    let scores: Vec<f32> = row.entries().iter().map(|(_, s)| *s).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    assert!(row.get(1).is_none());

    let top1 = strategy.top_k_neighbors(1, 1).unwrap();
    assert_eq!(top1.entries()[0].0, 3);
}

#[test]
fn unknown_entity_is_rejected() {
    let graph = CategoryGraph::build(&music_collection()).unwrap();
    let strategy = CategorySimilarity::new(&graph);
    assert!(strategy.top_k_neighbors(777, 3).is_err());
    assert!(strategy.similarity(1, 777).is_err());
}

/// Tight result caps cut off mid-member-list: later members of the same
/// category are skipped even though they are exactly as close. Documented,
/// intentional approximation.
#[test]
fn result_cap_cuts_off_mid_category() {
    let graph = CategoryGraph::build(&VecCollection::new(vec![
        category(100, "trio", &[]),
        article(20, "first", &["trio"]),
        article(21, "second", &["trio"]),
        article(22, "third", &["trio"]),
    ]))
    .unwrap();

    let strategy = CategorySimilarity::with_search_cap(&graph, 1);
    let row = strategy.top_k_neighbors(20, 10).unwrap();
    assert_eq!(row.len(), 1);
    assert_eq!(row.entries()[0].0, 21);
    assert!(row.get(22).is_none());
}

/// Once the search has started descending it must never climb again: a
/// sibling's other parent stays unexplored.
#[test]
fn descending_search_never_reascends() {
    let graph = CategoryGraph::build(&VecCollection::new(vec![
        category(100, "shared root", &[]),
        category(101, "left", &["shared root"]),
        category(102, "right", &["shared root", "other root"]),
        category(103, "other root", &[]),
        article(1, "leaf", &["left"]),
    ]))
    .unwrap();

    let mut bfs = CategoryBfs::new(&graph, 1, BfsOptions::default());
    bfs.run();

    let right = graph.category_index("right").unwrap();
    let other_root = graph.category_index("other root").unwrap();
    // "right" is reached downward from the shared root...
    assert!(bfs.category_distance(right).is_some());
    // ...so its second parent is never pushed.
    assert!(bfs.category_distance(other_root).is_none());
}

#[test]
fn graph_is_safe_for_concurrent_queries() {
    let graph = CategoryGraph::build(&music_collection()).unwrap();
    let baseline = {
        let strategy = CategorySimilarity::new(&graph);
        strategy.similarity(1, 2).unwrap()
    };

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let strategy = CategorySimilarity::new(&graph);
                for _ in 0..16 {
                    assert_eq!(strategy.similarity(1, 2).unwrap(), baseline);
                    let _ = strategy.top_k_neighbors(1, 2).unwrap();
                }
            });
        }
    });
}
