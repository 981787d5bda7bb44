use std::collections::BTreeMap;

use rand::prelude::*;
use rand::rngs::StdRng;

use crate::error::{MfError, Result};

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Shuffle `0..n` and split it into `(train, test)` index lists.
pub fn train_test_split(n: usize, test_ratio: f32, seed: Option<u64>) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(0.0..=1.0).contains(&test_ratio) {
        return Err(MfError::InvalidArgument(format!(
            "test_ratio must be between 0 and 1, got {test_ratio}"
        )));
    }
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut make_rng(seed));

    let test_size = (n as f32 * test_ratio).round() as usize;
    let train = indices.split_off(test_size);
    Ok((train, indices))
}

/// Hold out one interaction per user: the latest when `timestamps` is given,
/// a random one otherwise. Users with a single interaction stay in train.
pub fn leave_one_out(
    user_ids: &[usize],
    timestamps: Option<&[f64]>,
    seed: Option<u64>,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if let Some(ts) = timestamps {
        if ts.len() != user_ids.len() {
            return Err(MfError::InvalidArgument(format!(
                "timestamps has length {}, expected {}",
                ts.len(),
                user_ids.len()
            )));
        }
    }

    // Group interactions by user
    let mut by_user: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (idx, &user) in user_ids.iter().enumerate() {
        by_user.entry(user).or_default().push(idx);
    }

    let mut rng = make_rng(seed);
    let mut train = Vec::with_capacity(user_ids.len());
    let mut test = Vec::with_capacity(by_user.len());

    for indices in by_user.into_values() {
        if indices.len() == 1 {
            train.push(indices[0]);
            continue;
        }
        let held_out = match timestamps {
            Some(ts) => indices
                .iter()
                .copied()
                .reduce(|best, idx| if ts[idx] > ts[best] { idx } else { best })
                .unwrap_or(indices[0]),
            None => indices[rng.random_range(0..indices.len())],
        };
        test.push(held_out);
        train.extend(indices.into_iter().filter(|&idx| idx != held_out));
    }

    Ok((train, test))
}
