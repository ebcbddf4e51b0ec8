use std::collections::BTreeMap;

use serde::Serialize;

use super::domain::{Ward, WardId};
use super::AdmissionError;

/// Immutable view of every ward at decision time, keyed in ascending id order.
///
/// Iteration order is the canonical tie-break order for the allocation policy. Updates never
/// mutate in place; [`WardSnapshot::with_admission`] hands back the
/// working copy a batch run carries forward.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WardSnapshot {
    wards: BTreeMap<WardId, Ward>,
}

impl WardSnapshot {
    pub fn from_wards(wards: impl IntoIterator<Item = Ward>) -> Result<Self, AdmissionError> {
        let mut indexed = BTreeMap::new();
        for ward in wards {
            if ward.current_occupancy > ward.max_capacity {
                return Err(AdmissionError::Validation(format!(
                    "ward {} reports occupancy {} above capacity {}",
                    ward.id, ward.current_occupancy, ward.max_capacity
                )));
            }
            let id = ward.id;
            if indexed.insert(id, ward).is_some() {
                return Err(AdmissionError::Validation(format!(
                    "ward {id} appears more than once in snapshot"
                )));
            }
        }
        Ok(Self { wards: indexed })
    }

    pub fn get(&self, id: WardId) -> Option<&Ward> {
        self.wards.get(&id)
    }

    /// Wards in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Ward> {
        self.wards.values()
    }

    pub fn len(&self) -> usize {
        self.wards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wards.is_empty()
    }

    pub fn available(&self) -> impl Iterator<Item = &Ward> {
        self.iter().filter(|ward| ward.has_free_bed())
    }

    pub fn total_capacity(&self) -> u32 {
        self.iter().map(|ward| ward.max_capacity).sum()
    }

    pub fn total_occupancy(&self) -> u32 {
        self.iter().map(|ward| ward.current_occupancy).sum()
    }

    /// Working copy with one more bed taken in `ward_id`.
    pub fn with_admission(&self, ward_id: WardId) -> Result<Self, AdmissionError> {
        let mut next = self.clone();
        next.occupy(ward_id)?;
        Ok(next)
    }

    /// Working copy without `ward_id`, for wards removed after the snapshot was taken.
    pub fn without(&self, ward_id: WardId) -> Self {
        let mut next = self.clone();
        next.wards.remove(&ward_id);
        next
    }

    fn occupy(&mut self, ward_id: WardId) -> Result<(), AdmissionError> {
        let ward = self
            .wards
            .get_mut(&ward_id)
            .ok_or(AdmissionError::WardNotFound { ward_id })?;
        if !ward.has_free_bed() {
            return Err(AdmissionError::CapacityExceeded { ward_id });
        }
        ward.current_occupancy += 1;
        Ok(())
    }
}
