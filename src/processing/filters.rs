//! Post-fusion hard-constraint filtering.

use crate::domain::property::PropertyRecord;
use crate::domain::search::PropertyFilters;
use crate::error::{Error, Result};

/// Decides whether a candidate satisfies one required amenity.
///
/// Isolated behind a trait because the shipped default matches against the
/// free-text description, which is looser than the structured feature
/// lists; swapping matchers never touches the fusion logic.
pub trait AmenityMatcher: Send + Sync {
    fn matches(&self, record: &PropertyRecord, amenity: &str) -> bool;
}

/// Matches a required amenity as a raw substring of the listing
/// description. Mirrors the historical behavior, including its case
/// sensitivity.
pub struct DescriptionMatcher;

impl AmenityMatcher for DescriptionMatcher {
    fn matches(&self, record: &PropertyRecord, amenity: &str) -> bool {
        record
            .description
            .as_deref()
            .unwrap_or("")
            .contains(amenity)
    }
}

/// Matches a required amenity against the structured feature lists the
/// features embedding is built from, case-insensitively.
pub struct FeatureListMatcher;

impl AmenityMatcher for FeatureListMatcher {
    fn matches(&self, record: &PropertyRecord, amenity: &str) -> bool {
        let needle = amenity.to_lowercase();
        record
            .feature_entries()
            .any(|entry| entry.to_lowercase().contains(&needle))
    }
}

fn parse_price_range(range: &str) -> Result<(f64, f64)> {
    let (low, high) = range
        .split_once('-')
        .ok_or_else(|| Error::Validation(format!("malformed price_range '{range}'")))?;
    let low: f64 = low
        .trim()
        .parse()
        .map_err(|_| Error::Validation(format!("malformed price_range '{range}'")))?;
    let high: f64 = high
        .trim()
        .parse()
        .map_err(|_| Error::Validation(format!("malformed price_range '{range}'")))?;
    Ok((low, high))
}

/// Evaluates the predicates in their fixed order (price, bedrooms,
/// bathrooms, property type, amenities, sale/lease), short-circuiting on
/// the first failure. Unset filter fields are vacuously true, but a
/// candidate missing price, bedroom or bathroom information is always
/// excluded.
fn passes(
    record: &PropertyRecord,
    filters: &PropertyFilters,
    matcher: &dyn AmenityMatcher,
) -> Result<bool> {
    // Price: a range passes on overlap with the filter bounds, a scalar on
    // containment; no price information excludes the candidate.
    match (&record.price_range, record.list_price) {
        (Some(range), _) if !range.is_empty() => {
            let (low, high) = parse_price_range(range)?;
            if filters.min_price.is_some_and(|min| high < min) {
                return Ok(false);
            }
            if filters.max_price.is_some_and(|max| low > max) {
                return Ok(false);
            }
        }
        (_, Some(price)) => {
            if filters.min_price.is_some_and(|min| price < min) {
                return Ok(false);
            }
            if filters.max_price.is_some_and(|max| price > max) {
                return Ok(false);
            }
        }
        _ => return Ok(false),
    }

    match record.bedrooms {
        Some(bedrooms) => {
            if filters.min_bedrooms.is_some_and(|min| bedrooms < min)
                || filters.max_bedrooms.is_some_and(|max| bedrooms > max)
            {
                return Ok(false);
            }
        }
        None => return Ok(false),
    }

    match record.bathrooms {
        Some(bathrooms) => {
            if filters.min_bathrooms.is_some_and(|min| bathrooms < min)
                || filters.max_bathrooms.is_some_and(|max| bathrooms > max)
            {
                return Ok(false);
            }
        }
        None => return Ok(false),
    }

    if let Some(wanted) = &filters.property_type {
        if record.property_type.as_deref() != Some(wanted.as_str()) {
            return Ok(false);
        }
    }

    for amenity in &filters.must_have_amenities {
        if !matcher.matches(record, amenity) {
            return Ok(false);
        }
    }

    if let Some(wanted) = &filters.sale_lease {
        if record.sale_lease.as_deref() != Some(wanted.as_str()) {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Filters candidates in the order given. A candidate whose evaluation
/// errors is logged and excluded; the rest of the batch is unaffected.
pub fn apply_filters(
    candidates: &[PropertyRecord],
    filters: &PropertyFilters,
    matcher: &dyn AmenityMatcher,
) -> Vec<PropertyRecord> {
    candidates
        .iter()
        .filter(|candidate| match passes(candidate, filters, matcher) {
            Ok(pass) => {
                if !pass {
                    log::debug!("Property {} excluded by filters", candidate.id);
                }
                pass
            }
            Err(e) => {
                log::warn!("Error applying filters to property {}: {e}", candidate.id);
                false
            }
        })
        .cloned()
        .collect()
}
