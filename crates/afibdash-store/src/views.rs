//! Read models derived from raw rows, shared by both backends.

use std::collections::HashMap;

use afibdash_core::{ElementType, Result, SurveyCard};
use rand::seq::SliceRandom;
use tracing::error;

use crate::types::*;
use crate::Store;

/// Survey cards from element rows; rows without a usable name are dropped.
pub fn to_cards(rows: Vec<ElementRow>) -> Vec<SurveyCard> {
    rows.into_iter()
        .map(|row| SurveyCard {
            id: Some(row.id),
            title: row.name.as_deref().map(str::trim).unwrap_or("").to_string(),
            description: row.description.as_deref().map(str::trim).unwrap_or("").to_string(),
        })
        .filter(|card| !card.title.is_empty())
        .collect()
}

/// Join elements with their vote totals, in element order.
pub fn build_stats(rows: Vec<ElementRow>, aggregates: &[AnswerAggregate]) -> Vec<ElementStat> {
    let mut counts: HashMap<i64, (u64, u64)> = rows.iter().map(|row| (row.id, (0, 0))).collect();
    for aggregate in aggregates {
        if let Some(bucket) = counts.get_mut(&aggregate.element_id) {
            bucket.0 += aggregate.yes;
            bucket.1 += aggregate.no;
        }
    }

    rows.into_iter()
        .map(|row| {
            let (yes, no) = counts.get(&row.id).copied().unwrap_or((0, 0));
            let name = row.name.as_deref().map(str::trim).unwrap_or("");
            ElementStat {
                id: row.id,
                name: if name.is_empty() { "Untitled".to_string() } else { name.to_string() },
                description: row.description.as_deref().map(str::trim).unwrap_or("").to_string(),
                yes,
                no,
                diff: yes as i64 - no as i64,
            }
        })
        .collect()
}

impl Store {
    /// Survey cards for a category in random order.
    pub async fn element_cards(&self, element_type: ElementType) -> Result<Vec<SurveyCard>> {
        let mut cards = to_cards(self.list_elements(element_type).await?);
        cards.shuffle(&mut rand::thread_rng());
        Ok(cards)
    }

    /// Yes/no totals for every element of a category.
    ///
    /// A failed aggregation is logged and reported as zero votes rather than
    /// hiding the elements.
    pub async fn element_stats(&self, element_type: ElementType) -> Result<Vec<ElementStat>> {
        let rows = self.list_elements(element_type).await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let aggregates = match self.count_answers_by_elements(&ids).await {
            Ok(aggregates) => aggregates,
            Err(e) => {
                error!(
                    error = %e,
                    type_id = element_type.id(),
                    "Failed to aggregate disease element answers"
                );
                Vec::new()
            }
        };
        Ok(build_stats(rows, &aggregates))
    }

    /// Newest clinical pictures with the total share count.
    pub async fn clinical_picture_feed(&self, limit: usize) -> Result<ClinicalPictureFeed> {
        let records = self.recent_clinical_pictures(limit).await?;
        let total_count = self.count_clinical_pictures().await?;
        Ok(ClinicalPictureFeed {
            records,
            total_count,
        })
    }
}
