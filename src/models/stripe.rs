use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};

/// Round-robin striping layout of a file on a Lustre-like store.
///
/// Constructed through [`StripeLayout::new`], which rejects layouts the striping
/// reconstruction cannot handle (zero/negative/non-finite stripe size, empty
/// target list, or a target list that disagrees with the stripe count).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(try_from = "RawStripeLayout", into = "RawStripeLayout")]
pub struct StripeLayout {
    stripe_size: u64,
    ost_ids: Vec<u64>,
}

// Wire form, as carried by trace documents
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RawStripeLayout {
    pub stripe_size: f64,
    pub stripe_count: i64,
    pub ost_ids: Vec<u64>,
}

impl StripeLayout {
    pub fn new(stripe_size: f64, stripe_count: i64, ost_ids: Vec<u64>) -> Result<Self> {
        if !stripe_size.is_finite() || stripe_size < 1.0 {
            return Err(AnalysisError::InvalidStripeLayout(format!(
                "stripe_size must be a positive number, got {stripe_size}"
            )));
        }
        if stripe_count < 1 {
            return Err(AnalysisError::InvalidStripeLayout(format!(
                "stripe_count must be at least 1, got {stripe_count}"
            )));
        }
        if ost_ids.len() as i64 != stripe_count {
            return Err(AnalysisError::InvalidStripeLayout(format!(
                "stripe_count is {stripe_count} but {} OST ids were given",
                ost_ids.len()
            )));
        }

        Ok(Self {
            stripe_size: stripe_size as u64,
            ost_ids,
        })
    }

    pub fn stripe_size(&self) -> u64 {
        self.stripe_size
    }

    pub fn stripe_count(&self) -> usize {
        self.ost_ids.len()
    }

    pub fn ost_ids(&self) -> &[u64] {
        &self.ost_ids
    }
}

impl TryFrom<RawStripeLayout> for StripeLayout {
    type Error = AnalysisError;

    fn try_from(raw: RawStripeLayout) -> Result<Self> {
        StripeLayout::new(raw.stripe_size, raw.stripe_count, raw.ost_ids)
    }
}

impl From<StripeLayout> for RawStripeLayout {
    fn from(layout: StripeLayout) -> Self {
        RawStripeLayout {
            stripe_size: layout.stripe_size as f64,
            stripe_count: layout.ost_ids.len() as i64,
            ost_ids: layout.ost_ids,
        }
    }
}
