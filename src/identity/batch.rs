use serde::{Serialize, Serializer, ser::SerializeStruct};

/// One page of a larger result set. The items serialize under `key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<T> {
    key: &'static str,
    number: u32,
    size: u32,
    total: u64,
    items: Vec<T>,
}

impl<T> Batch<T> {
    #[must_use]
    pub fn new(key: &'static str, number: u32, size: u32, total: u64, items: Vec<T>) -> Self {
        Self {
            key,
            number,
            size,
            total,
            items,
        }
    }

    #[must_use]
    pub fn number(&self) -> u32 {
        self.number
    }

    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of pages needed for `total` rows.
    #[must_use]
    pub fn count(&self) -> u64 {
        if self.size == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.size))
    }

    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }
}

impl<T: Serialize> Serialize for Batch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Batch", 5)?;
        state.serialize_field("number", &self.number)?;
        state.serialize_field("count", &self.count())?;
        state.serialize_field("size", &self.size)?;
        state.serialize_field("total", &self.total)?;
        state.serialize_field(self.key, &self.items)?;
        state.end()
    }
}
