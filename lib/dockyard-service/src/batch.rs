//! Batch normalization.

use std::collections::{hash_map::Entry, HashMap};

use tracing::debug;

use crate::{
    declaration::RawDeclaration,
    errors::{BatchError, BatchFailure, ValidationError},
    spec::{normalize, ServiceSpec},
};

/// Normalizes a batch of declarations.
///
/// Every declaration is normalized independently and the results are returned in declaration order. Service names must
/// be unique across the batch.
///
/// # Errors
///
/// If any declaration fails to normalize, or two declarations share a name, a [`BatchError`] listing every failure is
/// returned and no specs are produced.
pub fn normalize_batch<I>(declarations: I) -> Result<Vec<ServiceSpec>, BatchError>
where
    I: IntoIterator<Item = RawDeclaration>,
{
    let mut specs = Vec::new();
    let mut failures = Vec::new();
    let mut first_seen = HashMap::new();
    let mut total = 0;

    for (index, declaration) in declarations.into_iter().enumerate() {
        total += 1;
        let name = declaration.name().map(str::to_string);

        let spec = match normalize(declaration) {
            Ok(spec) => spec,
            Err(error) => {
                debug!(
                    index,
                    name = name.as_deref().unwrap_or("<unnamed>"),
                    error = %error,
                    "Rejected service declaration."
                );
                failures.push(BatchFailure { index, name, error });
                continue;
            }
        };

        match first_seen.entry(spec.name().to_string()) {
            Entry::Occupied(entry) => {
                let error = ValidationError::DuplicateName {
                    name: entry.key().clone(),
                    first_index: *entry.get(),
                };
                failures.push(BatchFailure {
                    index,
                    name,
                    error: error.into(),
                });
            }
            Entry::Vacant(entry) => {
                entry.insert(index);
                specs.push(spec);
            }
        }
    }

    if failures.is_empty() {
        Ok(specs)
    } else {
        Err(BatchError::new(failures, total))
    }
}
