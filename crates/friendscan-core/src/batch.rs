use crate::contact::Contact;
use crate::error::{CoreError, Result};

pub const DEFAULT_BATCH_SIZE: usize = 34;

/// A bounded, ordered slice of eligible contacts probed in one group-chat cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// 0-based position of the batch within the run
    pub index: usize,
    pub contacts: Vec<Contact>,
}

impl Batch {
    pub fn ids(&self) -> Vec<String> {
        self.contacts.iter().map(|c| c.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.id == id)
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }
}

/// Number of batches needed for `total` contacts.
pub fn batch_count(total: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return 0;
    }
    total.div_ceil(batch_size)
}

/// Split `contacts` into batches of at most `batch_size`, keeping list order.
/// Only the last batch may be shorter.
pub fn partition(contacts: &[Contact], batch_size: usize) -> Result<Vec<Batch>> {
    if batch_size == 0 {
        return Err(CoreError::InvalidBatchSize(batch_size));
    }

    Ok(contacts
        .chunks(batch_size)
        .enumerate()
        .map(|(index, chunk)| Batch {
            index,
            contacts: chunk.to_vec(),
        })
        .collect())
}
