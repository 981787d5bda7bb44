use std::collections::HashSet;
use std::sync::Arc;

use approx::assert_relative_eq;
use mfsgd::metrics::{hit_rate_at_k, ndcg_at_k, precision_at_k, recall_at_k};
use mfsgd::model_selection::train_test_split;
use mfsgd::{
    Biases, Dataset, FallbackRanker, FittedParams, MatrixFactorization, MfConfig, MfError, Recommender,
    TrainSet,
};
use proptest::prelude::*;

fn ratings() -> TrainSet {
    TrainSet::from_triples(&[
        (0, 0, 5.0),
        (0, 1, 3.0),
        (0, 2, 1.0),
        (1, 0, 4.0),
        (1, 3, 2.0),
        (2, 1, 4.0),
        (2, 2, 5.0),
        (2, 3, 1.0),
        (3, 3, 3.0),
    ])
    .unwrap()
}

fn fitted(use_bias: bool) -> MatrixFactorization {
    let mut mf = MatrixFactorization::new(MfConfig {
        k: 4,
        max_iter: 30,
        use_bias,
        seed: Some(5),
        ..Default::default()
    })
    .unwrap();
    mf.fit(&ratings());
    mf
}

/// One user whose scores over 3 items are 2.0, 3.0, 0.5; min rating 1.0.
fn padded_model() -> MatrixFactorization {
    let params = FittedParams {
        k: 1,
        num_users: 1,
        num_items: 3,
        user_factors: vec![1.0],
        item_factors: vec![2.0, 3.0, 0.5],
        biases: Biases::NoBias,
        min_rating: 1.0,
        unknown_users: Vec::new(),
        unknown_items: Vec::new(),
    };
    MatrixFactorization::from_params(MfConfig { k: 1, use_bias: false, ..Default::default() }, params).unwrap()
}

#[test]
fn untrained_model_refuses_inference() {
    let mf = MatrixFactorization::new(MfConfig::default()).unwrap();
    assert!(!mf.is_fitted());
    assert!(matches!(mf.score(0, 0), Err(MfError::UntrainedModel)));
    assert!(matches!(mf.rank(0, None), Err(MfError::UntrainedModel)));
    assert!(matches!(mf.rank(0, Some(&[1, 2])), Err(MfError::UntrainedModel)));
    assert!(matches!(mf.recommend(0, 3, &[]), Err(MfError::UntrainedModel)));
    assert!(matches!(mf.recommend_all(3), Err(MfError::UntrainedModel)));
    assert!(matches!(mf.save_json(Vec::new()), Err(MfError::UntrainedModel)));
}

#[test]
fn score_without_bias_is_exactly_the_dot_product() {
    let mf = fitted(false);
    let params = mf.params().unwrap();
    for user in 0..params.num_users {
        for item in 0..params.num_items {
            let expected: f32 = params
                .user_vector(user)
                .iter()
                .zip(params.item_vector(item))
                .map(|(p, q)| p * q)
                .sum();
            assert_relative_eq!(mf.score(user, item).unwrap(), expected, epsilon = 1e-6);
        }
    }
}

#[test]
fn unknown_endpoints_with_bias_fall_back_to_biases() {
    let mf = fitted(true);
    let params = mf.params().unwrap();
    let (mean, user_bias, item_bias) = match &params.biases {
        Biases::WithBias { global_mean, user_bias, item_bias } => (*global_mean, user_bias, item_bias),
        Biases::NoBias => panic!("bias mode expected"),
    };
    assert_relative_eq!(mf.score(1, 99).unwrap(), mean + user_bias[1]);
    assert_relative_eq!(mf.score(99, 2).unwrap(), mean + item_bias[2]);
    assert_relative_eq!(mf.score(99, 99).unwrap(), mean);
}

#[test]
fn unknown_endpoints_without_bias_are_errors() {
    let mf = fitted(false);
    match mf.score(1, 99) {
        Err(MfError::ScorePredictionUnavailable { user, item }) => assert_eq!((user, item), (1, 99)),
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(mf.score(42, 0), Err(MfError::ScorePredictionUnavailable { user: 42, item: 0 })));
}

#[test]
fn full_rank_is_a_permutation_sorted_by_score() {
    let mf = fitted(false);
    for user in 0..4 {
        let order = mf.rank(user, None).unwrap();
        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2, 3]);
        let scores: Vec<f32> = order.iter().map(|&i| mf.score(user, i).unwrap()).collect();
        for pair in scores.windows(2) {
            assert!(pair[0] >= pair[1] - 1e-6, "{scores:?}");
        }
    }
}

#[test]
fn out_of_catalog_candidates_sink_below_better_items() {
    let mf = padded_model();
    let order = mf.rank(0, Some(&[2, 5, 0, 1])).unwrap();
    assert_eq!(order, vec![1, 0, 5, 2]);
    let pos_of = |id: usize| order.iter().position(|&i| i == id).unwrap();
    for better in [0, 1] {
        assert!(pos_of(better) < pos_of(5));
    }
}

#[test]
fn candidate_ranking_matches_filtered_full_ranking() {
    let mf = fitted(true);
    let wanted: HashSet<usize> = [2, 0].into_iter().collect();
    for user in 0..4 {
        let restricted = mf.rank(user, Some(&[2, 0])).unwrap();
        let filtered: Vec<usize> = mf
            .rank(user, None)
            .unwrap()
            .into_iter()
            .filter(|i| wanted.contains(i))
            .collect();
        assert_eq!(restricted, filtered);
    }
}

#[test]
fn unknown_user_with_bias_ranks_by_item_bias() {
    let mf = fitted(true);
    // biases stay at zero, so ties resolve to catalog order
    assert_eq!(mf.rank(10, None).unwrap(), vec![0, 1, 2, 3]);
}

#[test]
fn unknown_user_without_bias_uses_popularity_or_custom_fallback() {
    let mf = fitted(false);
    // item 3 has three ratings, items 0..=2 have two each
    assert_eq!(mf.rank(10, None).unwrap(), vec![3, 0, 1, 2]);
    assert_eq!(mf.rank(10, Some(&[2, 3])).unwrap(), vec![3, 2]);

    struct Fixed(Vec<usize>);
    impl FallbackRanker for Fixed {
        fn rank(&self, _candidates: Option<&[usize]>) -> Vec<usize> {
            self.0.clone()
        }
    }
    let mf = mf.with_fallback(Arc::new(Fixed(vec![2, 1])));
    assert_eq!(mf.rank(10, None).unwrap(), vec![2, 1]);
}

#[test]
fn recommend_respects_exclusions() {
    let mf = fitted(true);
    let recs = mf.recommend(0, 2, &[0, 1]).unwrap();
    assert_eq!(recs.len(), 2);
    assert!(recs.iter().all(|(i, _)| *i == 2 || *i == 3));
    assert!(recs[0].1 >= recs[1].1);

    let all = mf.recommend_all(2).unwrap();
    assert_eq!(all.len(), 4);
    for (user, recs) in all.iter().enumerate() {
        let expected: Vec<usize> = mf.rank(user, None).unwrap().into_iter().take(2).collect();
        assert_eq!(recs.iter().map(|r| r.0).collect::<Vec<_>>(), expected);
    }
}

#[test]
fn usable_through_the_trait_object() {
    let mut model: Box<dyn Recommender> = Box::new(
        MatrixFactorization::new(MfConfig { name: "mf-test".into(), max_iter: 5, ..Default::default() }).unwrap(),
    );
    assert_eq!(model.name(), "mf-test");
    assert!(!model.is_fitted());
    let report = model.fit(&ratings());
    assert_eq!(report.epochs, 5);
    assert!(model.is_fitted());
    assert!(model.score(0, 0).is_ok());
    assert_eq!(model.rank(0, None).unwrap().len(), 4);
}

#[test]
fn exported_parameters_reload_to_the_same_model() {
    let mf = fitted(true);
    let mut file = tempfile::tempfile().unwrap();
    mf.save_json(&mut file).unwrap();

    use std::io::{Seek, SeekFrom};
    file.seek(SeekFrom::Start(0)).unwrap();
    let reloaded = MatrixFactorization::load_json(mf.config().clone(), &mut file).unwrap();

    assert_eq!(reloaded.params(), mf.params());
    for user in 0..4 {
        assert_eq!(reloaded.rank(user, None).unwrap(), mf.rank(user, None).unwrap());
        assert_eq!(reloaded.score(user, 1).unwrap(), mf.score(user, 1).unwrap());
    }

    let wrong = MfConfig { use_bias: false, ..mf.config().clone() };
    file.seek(SeekFrom::Start(0)).unwrap();
    assert!(matches!(
        MatrixFactorization::load_json(wrong, &mut file),
        Err(MfError::ShapeMismatch(_))
    ));
    assert!(matches!(
        MatrixFactorization::load_json(MfConfig::default(), "not json".as_bytes()),
        Err(MfError::Serialization(_))
    ));
}

#[test]
fn holdout_evaluation_produces_bounded_metrics() {
    let all = ratings();
    let triples: Vec<(usize, usize, f32)> = all.interactions().iter().collect();
    let (train_idx, test_idx) = train_test_split(triples.len(), 0.3, Some(2)).unwrap();
    let pick = |idx: &[usize]| idx.iter().map(|&i| triples[i]).collect::<Vec<_>>();
    let train = TrainSet::from_triples_with_shape(&pick(&train_idx), 4, 4).unwrap();

    let mut mf = MatrixFactorization::new(MfConfig { k: 3, max_iter: 20, seed: Some(4), ..Default::default() }).unwrap();
    mf.fit(&train);
    for (user, item, _) in pick(&test_idx) {
        let ranking = mf.rank(user, None).unwrap();
        for metric in [precision_at_k, recall_at_k, hit_rate_at_k, ndcg_at_k] {
            let value = metric(&[item], &ranking, 2);
            assert!((0.0..=1.0).contains(&value));
        }
        assert_eq!(hit_rate_at_k(&[item], &ranking, 4), 1.0);
    }
}

proptest! {
    #[test]
    fn candidate_ranking_is_an_ordered_subset(candidates in prop::collection::vec(0usize..8, 0..10)) {
        let mf = padded_model();
        let order = mf.rank(0, Some(&candidates)).unwrap();

        let unique: HashSet<usize> = candidates.iter().copied().collect();
        prop_assert_eq!(order.len(), unique.len());
        prop_assert_eq!(order.iter().copied().collect::<HashSet<_>>(), unique);

        let padded_score = |i: usize| if i < 3 { mf.score(0, i).unwrap() } else { 1.0 };
        for pair in order.windows(2) {
            prop_assert!(padded_score(pair[0]) >= padded_score(pair[1]));
        }
    }
}
