use crate::error::{MfError, Result};

/// Observed ratings in CSR form, one row per user.
///
/// Enumeration order is the storage order: rows by ascending user, and within
/// a row the order the column indices are stored in. Rows built through
/// [`Interactions::from_triples`] are sorted by item.
#[derive(Debug, Clone, PartialEq)]
pub struct Interactions {
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f32>,
    num_users: usize,
    num_items: usize,
}

impl Interactions {
    /// Wrap existing CSR arrays after checking their shape.
    pub fn from_csr(
        indptr: Vec<usize>,
        indices: Vec<usize>,
        data: Vec<f32>,
        num_users: usize,
        num_items: usize,
    ) -> Result<Self> {
        if indptr.len() != num_users + 1 {
            return Err(MfError::InvalidInteractions(format!(
                "indptr has length {}, expected num_users + 1 = {}",
                indptr.len(),
                num_users + 1
            )));
        }
        if indptr[0] != 0 || indptr.windows(2).any(|w| w[0] > w[1]) {
            return Err(MfError::InvalidInteractions(
                "indptr must start at 0 and be non-decreasing".into(),
            ));
        }
        let nnz = indptr[num_users];
        if indices.len() != nnz || data.len() != nnz {
            return Err(MfError::InvalidInteractions(format!(
                "indptr declares {} entries but indices/data have {}/{}",
                nnz,
                indices.len(),
                data.len()
            )));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i >= num_items) {
            return Err(MfError::InvalidInteractions(format!(
                "item index {bad} out of range for {num_items} items"
            )));
        }
        if data.iter().any(|r| !r.is_finite()) {
            return Err(MfError::InvalidInteractions("ratings must be finite".into()));
        }
        Ok(Self { indptr, indices, data, num_users, num_items })
    }

    /// Build from COO arrays. Duplicate (user, item) pairs are summed.
    pub fn from_triples(
        users: &[usize],
        items: &[usize],
        ratings: &[f32],
        num_users: usize,
        num_items: usize,
    ) -> Result<Self> {
        if users.len() != items.len() || users.len() != ratings.len() {
            return Err(MfError::InvalidInteractions(format!(
                "users/items/ratings lengths differ: {}/{}/{}",
                users.len(),
                items.len(),
                ratings.len()
            )));
        }
        if let Some(&bad) = users.iter().find(|&&u| u >= num_users) {
            return Err(MfError::InvalidInteractions(format!(
                "user index {bad} out of range for {num_users} users"
            )));
        }
        if let Some(&bad) = items.iter().find(|&&i| i >= num_items) {
            return Err(MfError::InvalidInteractions(format!(
                "item index {bad} out of range for {num_items} items"
            )));
        }

        // Count nnz per user
        let mut indptr = vec![0usize; num_users + 1];
        for &u in users {
            indptr[u + 1] += 1;
        }
        for u in 0..num_users {
            indptr[u + 1] += indptr[u];
        }
        let mut row: Vec<(usize, f32)> = vec![(0, 0.0); users.len()];
        let mut pos = indptr[..num_users].to_vec();
        for ((&u, &i), &r) in users.iter().zip(items).zip(ratings) {
            row[pos[u]] = (i, r);
            pos[u] += 1;
        }

        // Sort each row by item and merge duplicates
        let mut merged_indptr = Vec::with_capacity(num_users + 1);
        let mut indices = Vec::with_capacity(users.len());
        let mut data = Vec::with_capacity(users.len());
        merged_indptr.push(0);
        for u in 0..num_users {
            let entries = &mut row[indptr[u]..indptr[u + 1]];
            entries.sort_by_key(|&(i, _)| i);
            for &(i, r) in entries.iter() {
                if indices.len() > merged_indptr[u] && indices.last() == Some(&i) {
                    if let Some(last) = data.last_mut() {
                        *last += r;
                    }
                } else {
                    indices.push(i);
                    data.push(r);
                }
            }
            merged_indptr.push(indices.len());
        }

        Self::from_csr(merged_indptr, indices, data, num_users, num_items)
    }

    pub fn num_users(&self) -> usize {
        self.num_users
    }

    pub fn num_items(&self) -> usize {
        self.num_items
    }

    /// Number of stored interactions.
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Items and ratings of one user.
    pub fn row(&self, user: usize) -> (&[usize], &[f32]) {
        let start = self.indptr[user];
        let end = self.indptr[user + 1];
        (&self.indices[start..end], &self.data[start..end])
    }

    pub fn ratings(&self) -> &[f32] {
        &self.data
    }

    /// `(user, item, rating)` triples in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        (0..self.num_users).flat_map(move |u| {
            let (items, ratings) = self.row(u);
            items.iter().zip(ratings).map(move |(&i, &r)| (u, i, r))
        })
    }

    /// Number of interactions per item.
    pub fn item_counts(&self) -> Vec<u64> {
        let mut counts = vec![0u64; self.num_items];
        for &i in &self.indices {
            counts[i] += 1;
        }
        counts
    }
}

/// The training data a recommender is fitted on.
pub trait Dataset {
    fn interactions(&self) -> &Interactions;

    fn num_users(&self) -> usize {
        self.interactions().num_users()
    }

    fn num_items(&self) -> usize {
        self.interactions().num_items()
    }

    /// Average observed rating.
    fn global_mean(&self) -> f32;

    /// Smallest observed rating.
    fn min_rating(&self) -> f32;

    fn is_unknown_user(&self, user: usize) -> bool {
        user >= self.num_users()
    }

    fn is_unknown_item(&self, item: usize) -> bool {
        item >= self.num_items()
    }
}

/// In-memory [`Dataset`] with rating statistics computed once at construction.
#[derive(Debug, Clone)]
pub struct TrainSet {
    interactions: Interactions,
    global_mean: f32,
    min_rating: f32,
    max_rating: f32,
}

impl TrainSet {
    pub fn new(interactions: Interactions) -> Self {
        let ratings = interactions.ratings();
        let (global_mean, min_rating, max_rating) = if ratings.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            let total: f64 = ratings.iter().map(|&r| r as f64).sum();
            let min = ratings.iter().copied().fold(f32::INFINITY, f32::min);
            let max = ratings.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            ((total / ratings.len() as f64) as f32, min, max)
        };
        Self { interactions, global_mean, min_rating, max_rating }
    }

    /// Build from `(user, item, rating)` triples; the catalog spans the largest
    /// user and item index seen.
    pub fn from_triples(triples: &[(usize, usize, f32)]) -> Result<Self> {
        let num_users = triples.iter().map(|t| t.0 + 1).max().unwrap_or(0);
        let num_items = triples.iter().map(|t| t.1 + 1).max().unwrap_or(0);
        Self::from_triples_with_shape(triples, num_users, num_items)
    }

    /// Like [`TrainSet::from_triples`] but with explicit catalog sizes, so
    /// users or items without interactions still get a row.
    pub fn from_triples_with_shape(
        triples: &[(usize, usize, f32)],
        num_users: usize,
        num_items: usize,
    ) -> Result<Self> {
        let users: Vec<usize> = triples.iter().map(|t| t.0).collect();
        let items: Vec<usize> = triples.iter().map(|t| t.1).collect();
        let ratings: Vec<f32> = triples.iter().map(|t| t.2).collect();
        let interactions = Interactions::from_triples(&users, &items, &ratings, num_users, num_items)?;
        Ok(Self::new(interactions))
    }

    pub fn max_rating(&self) -> f32 {
        self.max_rating
    }
}

impl Dataset for TrainSet {
    fn interactions(&self) -> &Interactions {
        &self.interactions
    }

    fn global_mean(&self) -> f32 {
        self.global_mean
    }

    fn min_rating(&self) -> f32 {
        self.min_rating
    }
}
