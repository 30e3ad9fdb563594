//! Process-wide registry linking kernels discovered in PTX to the host
//! function stubs the runtime later binds to them.
//!
//! Registration happens on module load (effectively single threaded);
//! launches read concurrently from many threads afterwards, so the record
//! list sits behind a read-mostly RwLock and launches go through a
//! concurrent host-token index.

use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dashmap::DashMap;

/// One kernel discovered during fat-binary registration.
#[derive(Debug)]
pub struct KernelRecord {
    device_name: String,
    fat_binary: u64,
    host_fn: OnceLock<u64>,
    arg_widths: Vec<u32>,
}

impl KernelRecord {
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// The container token this kernel was registered under.
    pub fn fat_binary(&self) -> u64 {
        self.fat_binary
    }

    /// The bound host stub, if function registration has happened.
    pub fn host_fn(&self) -> Option<u64> {
        self.host_fn.get().copied()
    }

    /// Bytes to copy per launch argument slot, in declared order.
    pub fn arg_widths(&self) -> &[u32] {
        &self.arg_widths
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    records: RwLock<Vec<Arc<KernelRecord>>>,
    by_host: DashMap<u64, Arc<KernelRecord>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn records_read(&self) -> RwLockReadGuard<'_, Vec<Arc<KernelRecord>>> {
        self.records.read().unwrap_or_else(|e| e.into_inner())
    }

    fn records_write(&self) -> RwLockWriteGuard<'_, Vec<Arc<KernelRecord>>> {
        self.records.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a kernel discovered by the PTX scanner. The walker produces
    /// distinct names per container, so no deduplication happens here.
    pub fn append(&self, device_name: String, fat_binary: u64, arg_widths: Vec<u32>) {
        let record = Arc::new(KernelRecord {
            device_name,
            fat_binary,
            host_fn: OnceLock::new(),
            arg_widths,
        });
        self.records_write().push(record);
    }

    /// Bind a host function stub to the first record with the given device
    /// name. A record binds once: a second binding with a different token
    /// leaves both the record and the host index untouched. An unknown
    /// name is dropped silently — the host runtime may register kernels
    /// the scanner never saw.
    pub fn bind_host(&self, device_name: &str, host_fn: u64) {
        let records = self.records_read();
        let Some(record) = records.iter().find(|r| r.device_name == device_name) else {
            return;
        };
        if record.host_fn.set(host_fn).is_ok() || record.host_fn() == Some(host_fn) {
            self.by_host
                .entry(host_fn)
                .or_insert_with(|| Arc::clone(record));
        }
    }

    pub fn lookup_by_host(&self, host_fn: u64) -> Option<Arc<KernelRecord>> {
        self.by_host.get(&host_fn).map(|r| Arc::clone(&r))
    }

    pub fn len(&self) -> usize {
        self.records_read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records_read().is_empty()
    }

    /// Snapshot of the records in registration order.
    pub fn records(&self) -> Vec<Arc<KernelRecord>> {
        self.records_read().clone()
    }
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// The process-wide registry, constructed on first use.
pub fn global() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}
