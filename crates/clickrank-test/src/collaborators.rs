//! Scripted collaborators
//!
//! Stand-ins for the identity provider and the score store whose timing and
//! failures are under the test's control.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::Semaphore;

use clickrank_core::{ClickrankError, ClickrankResult, NewUser, RankingEntry, UserId};
use clickrank_identity::IdentityVerifier;
use clickrank_store::{MemoryScoreStore, ScoreStore};

// ============================================================================
// IDENTITY
// ============================================================================

/// Verifier with a fixed credential table.
///
/// When held, each resolution waits for a permit from [`GatedVerifier::release`].
pub struct GatedVerifier {
    users: HashMap<String, UserId>,
    gate: Option<Semaphore>,
    verify_calls: AtomicUsize,
    create_calls: AtomicUsize,
}

impl GatedVerifier {
    /// Resolutions complete as soon as they are polled
    pub fn open() -> Self {
        GatedVerifier {
            users: HashMap::new(),
            gate: None,
            verify_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
        }
    }

    /// Resolutions wait until released
    pub fn held() -> Self {
        GatedVerifier {
            gate: Some(Semaphore::new(0)),
            ..Self::open()
        }
    }

    /// Accept `credential` as `user`
    pub fn with_user(mut self, credential: &str, user: &str) -> Self {
        self.users.insert(credential.to_string(), UserId::from(user));
        self
    }

    /// Let `n` held resolutions finish
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }
}

impl IdentityVerifier for GatedVerifier {
    async fn verify(&self, credential: &str) -> ClickrankResult<UserId> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| ClickrankError::Identity("verifier shut down".into()))?
                .forget();
        }
        self.users
            .get(credential)
            .cloned()
            .ok_or(ClickrankError::InvalidCredential)
    }

    async fn create_user(&self, user: NewUser) -> ClickrankResult<UserId> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        Ok(UserId::new(user.email))
    }
}

// ============================================================================
// STORE
// ============================================================================

/// Score store with switchable failures, call counters and an optional
/// gate on point reads
pub struct FlakyStore {
    inner: MemoryScoreStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_queries: AtomicBool,
    read_gate: Option<Semaphore>,
    hold_next_write: AtomicBool,
    write_gate: Semaphore,
    reads: AtomicUsize,
    writes: AtomicUsize,
    queries: AtomicUsize,
}

impl Default for FlakyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FlakyStore {
    /// Healthy store over unstamped in-memory records
    pub fn new() -> Self {
        FlakyStore {
            inner: MemoryScoreStore::unstamped(),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_queries: AtomicBool::new(false),
            read_gate: None,
            hold_next_write: AtomicBool::new(false),
            write_gate: Semaphore::new(0),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
        }
    }

    /// Point reads wait for [`FlakyStore::release_reads`]
    pub fn with_held_reads(mut self) -> Self {
        self.read_gate = Some(Semaphore::new(0));
        self
    }

    pub fn release_reads(&self, n: usize) {
        if let Some(gate) = &self.read_gate {
            gate.add_permits(n);
        }
    }

    /// The next write waits for [`FlakyStore::release_held_write`]; later
    /// writes go straight through
    pub fn hold_next_write(&self) {
        self.hold_next_write.store(true, Ordering::SeqCst);
    }

    pub fn release_held_write(&self) {
        self.write_gate.add_permits(1);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// The records behind the failures
    pub fn inner(&self) -> &MemoryScoreStore {
        &self.inner
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn injected(&self, flag: &AtomicBool, what: &str) -> ClickrankResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(ClickrankError::Store(format!("injected {} failure", what)))
        } else {
            Ok(())
        }
    }
}

impl ScoreStore for FlakyStore {
    async fn read_count(&self, user: &UserId) -> ClickrankResult<u64> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.read_gate {
            gate.acquire()
                .await
                .map_err(|_| ClickrankError::Store("store shut down".into()))?
                .forget();
        }
        self.injected(&self.fail_reads, "read")?;
        self.inner.read_count(user).await
    }

    async fn write_count(&self, user: &UserId, count: u64) -> ClickrankResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.hold_next_write.swap(false, Ordering::SeqCst) {
            self.write_gate
                .acquire()
                .await
                .map_err(|_| ClickrankError::Store("store shut down".into()))?
                .forget();
        }
        self.injected(&self.fail_writes, "write")?;
        self.inner.write_count(user, count).await
    }

    async fn top(&self, limit: usize) -> ClickrankResult<Vec<RankingEntry>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.injected(&self.fail_queries, "query")?;
        self.inner.top(limit).await
    }

    async fn total(&self) -> ClickrankResult<u64> {
        self.inner.total().await
    }
}
