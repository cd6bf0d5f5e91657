// Entity-level storage shared by every node kind: flag bitmask and the
// opaque per-node user-data store.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Flag masks. Every node keeps its boolean attributes in one `u32` for
/// memory density; callers go through typed accessors, never raw masks.
///
/// The low 16 bits are common to all node kinds, the high bits are one
/// namespace per kind.
pub(crate) mod masks {
    // Common
    pub const IS_ENTRY: u32 = 0x0001;
    pub const IS_DELETED: u32 = 0x0002;
    pub const IS_INITIALIZED: u32 = 0x0004;
    pub const IS_BUILT: u32 = 0x0008;
    pub const IS_STATIC: u32 = 0x0010;
    pub const IS_FINAL: u32 = 0x0020;
    // Two bits encoding the access modifier
    pub const ACCESS_BITS: u32 = 0x00C0;
    pub const ACCESS_SHIFT: u32 = 6;

    // Class
    pub const CLASS_IS_ANONYMOUS: u32 = 0x10000;
    pub const CLASS_IS_INTERFACE: u32 = 0x20000;
    pub const CLASS_IS_UTILITY: u32 = 0x40000;
    pub const CLASS_IS_ABSTRACT: u32 = 0x80000;
    pub const CLASS_IS_EJB: u32 = 0x100000;
    pub const CLASS_IS_APPLET: u32 = 0x200000;
    pub const CLASS_IS_SERVLET: u32 = 0x400000;
    pub const CLASS_IS_TESTCASE: u32 = 0x800000;
    pub const CLASS_IS_LOCAL: u32 = 0x1000000;

    // Method
    pub const METHOD_IS_APPMAIN: u32 = 0x10000;
    pub const METHOD_IS_LIBRARY_OVERRIDE: u32 = 0x20000;
    pub const METHOD_IS_CONSTRUCTOR: u32 = 0x40000;
    pub const METHOD_IS_ABSTRACT: u32 = 0x80000;
    pub const METHOD_BODY_EMPTY: u32 = 0x100000;
    pub const METHOD_ONLY_CALLS_SUPER: u32 = 0x200000;
    pub const METHOD_RETURN_VALUE_USED: u32 = 0x400000;
    pub const METHOD_IS_TEST: u32 = 0x4000000;
    pub const METHOD_CALLED_ON_SUBCLASS: u32 = 0x8000000;

    // Field
    pub const FIELD_USED_FOR_READING: u32 = 0x10000;
    pub const FIELD_USED_FOR_WRITING: u32 = 0x20000;
    pub const FIELD_ASSIGNED_ONLY_IN_INITIALIZER: u32 = 0x40000;
    // Internal marker: a write outside any initializer was seen, so
    // FIELD_ASSIGNED_ONLY_IN_INITIALIZER must stay off regardless of the
    // order reference ops are applied in.
    pub const FIELD_WROTE_OUTSIDE_INITIALIZER: u32 = 0x80000;
}

/// One integer bitmask of boolean node attributes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags(u32);

impl Flags {
    pub fn check(self, mask: u32) -> bool {
        self.0 & mask != 0
    }

    pub fn set(&mut self, value: bool, mask: u32) {
        if value {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

/// Opaque key/value store attached to a node. Unrelated analysis passes can
/// get/put concurrently; locking is per node, there is no global lock.
#[derive(Default)]
pub struct UserData {
    slots: Mutex<HashMap<&'static str, Arc<dyn Any + Send + Sync>>>,
}

impl UserData {
    pub fn put<T: Any + Send + Sync>(&self, key: &'static str, value: T) {
        self.slots
            .lock()
            .expect("user data lock poisoned")
            .insert(key, Arc::new(value));
    }

    pub fn get<T: Any + Send + Sync>(&self, key: &'static str) -> Option<Arc<T>> {
        self.slots
            .lock()
            .expect("user data lock poisoned")
            .get(key)
            .and_then(|v| Arc::clone(v).downcast::<T>().ok())
    }

    pub fn remove(&self, key: &'static str) {
        self.slots
            .lock()
            .expect("user data lock poisoned")
            .remove(key);
    }
}

impl std::fmt::Debug for UserData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.slots.lock().map(|m| m.len()).unwrap_or(0);
        write!(f, "UserData({} entries)", len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_set_and_clear() {
        let mut flags = Flags::default();
        assert!(!flags.check(masks::IS_ENTRY));

        flags.set(true, masks::IS_ENTRY);
        flags.set(true, masks::CLASS_IS_INTERFACE);
        assert!(flags.check(masks::IS_ENTRY));
        assert!(flags.check(masks::CLASS_IS_INTERFACE));

        flags.set(false, masks::IS_ENTRY);
        assert!(!flags.check(masks::IS_ENTRY));
        assert!(flags.check(masks::CLASS_IS_INTERFACE));
    }

    #[test]
    fn test_user_data_typed_access() {
        let data = UserData::default();
        data.put("hits", 3usize);

        assert_eq!(*data.get::<usize>("hits").unwrap(), 3);
        // Wrong type reads as absent
        assert!(data.get::<String>("hits").is_none());

        data.remove("hits");
        assert!(data.get::<usize>("hits").is_none());
    }
}
