//! A process-wide collection of built validators keyed by caller-chosen ids,
//! so gateways can validate against many contracts without rebuilding them
//! per request.

use crate::validator::builder::{OpenApiValidatorBuilder, ValidatorBuildError};
use crate::validator::OpenApiValidator;
use dashmap::{DashMap, Entry};
use std::fmt::{Display, Formatter};
use std::hash::Hash;
use std::path::Path;
use std::sync::{Arc, OnceLock};

static GLOBAL_CACHE: OnceLock<ValidatorCollection<String>> = OnceLock::new();

pub fn global_validator_cache() -> &'static ValidatorCollection<String> {
    GLOBAL_CACHE.get_or_init(ValidatorCollection::new)
}

#[derive(Debug)]
pub enum CacheError {
    /// The validator with the specified id was not found in the cache.
    ValidatorNotFound,
    /// The validator with the specified id already exists in the cache.
    ValidatorAlreadyExists,
    /// Attempted to create a new validator but failed.
    FailedToCreateValidator(ValidatorBuildError),
}

impl Display for CacheError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::ValidatorNotFound => write!(f, "Validator not found in cache"),
            CacheError::ValidatorAlreadyExists => write!(f, "Validator already exists in cache"),
            CacheError::FailedToCreateValidator(err) => {
                write!(f, "Failed to create new validator: {}", err)
            }
        }
    }
}

impl std::error::Error for CacheError {}

pub struct ValidatorCollection<K> {
    cache: DashMap<K, Arc<OpenApiValidator>>,
}

impl<K> Default for ValidatorCollection<K>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> ValidatorCollection<K>
where
    K: Hash + Eq,
{
    pub fn new() -> Self {
        ValidatorCollection { cache: DashMap::new() }
    }

    pub fn insert_from_file_path<P>(
        &self,
        id: K,
        file_path: P,
    ) -> Result<Arc<OpenApiValidator>, CacheError>
    where
        P: AsRef<Path>,
    {
        let builder = OpenApiValidatorBuilder::new()
            .load_from_file(file_path.as_ref().to_string_lossy().to_string());
        self.insert_built(id, builder)
    }

    pub fn insert<V>(&self, id: K, spec: V) -> Result<Arc<OpenApiValidator>, CacheError>
    where
        V: serde::Serialize,
    {
        let spec = serde_json::to_value(spec).map_err(|e| {
            CacheError::FailedToCreateValidator(ValidatorBuildError::InvalidSpecification(
                e.to_string(),
            ))
        })?;
        self.insert_built(id, OpenApiValidatorBuilder::new().with_value(spec))
    }

    fn insert_built(
        &self,
        id: K,
        builder: OpenApiValidatorBuilder,
    ) -> Result<Arc<OpenApiValidator>, CacheError> {
        match self.cache.entry(id) {
            Entry::Occupied(_) => Err(CacheError::ValidatorAlreadyExists),
            Entry::Vacant(entry) => match builder.build() {
                Ok(validator) => {
                    let validator = Arc::new(validator);
                    entry.insert(Arc::clone(&validator));
                    Ok(validator)
                }
                Err(e) => Err(CacheError::FailedToCreateValidator(e)),
            },
        }
    }

    /// Returns the cached validator for `id`, building and inserting it from
    /// `spec` when absent. Claims the entry before building, so a caller that
    /// loses the race receives the winner's stored instance instead of an
    /// already-exists error.
    pub fn get_or_insert<V>(&self, id: K, spec: V) -> Result<Arc<OpenApiValidator>, CacheError>
    where
        V: serde::Serialize,
    {
        if let Ok(existing) = self.get(&id) {
            return Ok(existing);
        }
        let spec = serde_json::to_value(spec).map_err(|e| {
            CacheError::FailedToCreateValidator(ValidatorBuildError::InvalidSpecification(
                e.to_string(),
            ))
        })?;
        match self.cache.entry(id) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                match OpenApiValidatorBuilder::new().with_value(spec).build() {
                    Ok(validator) => {
                        let validator = Arc::new(validator);
                        entry.insert(Arc::clone(&validator));
                        Ok(validator)
                    }
                    Err(e) => Err(CacheError::FailedToCreateValidator(e)),
                }
            }
        }
    }

    pub fn get(&self, id: &K) -> Result<Arc<OpenApiValidator>, CacheError> {
        match self.cache.get(id) {
            Some(validator) => Ok(Arc::clone(validator.value())),
            None => Err(CacheError::ValidatorNotFound),
        }
    }

    pub fn remove(&self, id: &K) -> Result<(), CacheError> {
        if self.cache.remove(id).is_none() {
            return Err(CacheError::ValidatorNotFound);
        }
        Ok(())
    }

    pub fn contains(&self, id: &K) -> bool {
        self.cache.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&self) {
        self.cache.clear();
        log::debug!("Cleared validator cache");
    }
}
