//! String pool
//!
//! Deduplicates the strings of one batch into an ordered table. Ordinals are
//! only meaningful inside the batch the pool was built for.

use std::collections::HashMap;

use crate::error::{BatchError, OutOfRangeError};

/// Ordered table of unique strings addressed by ordinal
#[derive(Debug, Clone, Default)]
pub struct StringPool {
    values: Vec<String>,
    index: HashMap<String, u32>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the ordinal of `value`, appending it on first sight
    ///
    /// Fails with `PoolFull` once every `u32` ordinal is taken.
    pub fn intern(&mut self, value: &str) -> Result<u32, BatchError> {
        if let Some(&ordinal) = self.index.get(value) {
            return Ok(ordinal);
        }
        let ordinal = next_ordinal(self.values.len())?;
        self.values.push(value.to_owned());
        self.index.insert(value.to_owned(), ordinal);
        Ok(ordinal)
    }

    /// Looks up a previously interned string
    pub fn resolve(&self, ordinal: u32) -> Result<&str, OutOfRangeError> {
        resolve(&self.values, ordinal)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consumes the pool, yielding the table in ordinal order
    pub fn into_vec(self) -> Vec<String> {
        self.values
    }
}

fn next_ordinal(len: usize) -> Result<u32, BatchError> {
    u32::try_from(len).map_err(|_| BatchError::PoolFull { len })
}

/// Ordinal lookup into a plain string table
pub fn resolve(table: &[String], ordinal: u32) -> Result<&str, OutOfRangeError> {
    table
        .get(ordinal as usize)
        .map(String::as_str)
        .ok_or(OutOfRangeError {
            ordinal,
            len: table.len(),
        })
}
