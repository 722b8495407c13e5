//! Short code allocation with storage-enforced uniqueness.

use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::repositories::LinkRepository;
use crate::error::AppError;
use crate::utils::code_generator::{self, CodeRejection};

/// Random candidates tried before giving up.
pub const MAX_ATTEMPTS: usize = 10;

#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("Short code must be 4-32 characters of a-z, A-Z, 0-9, '_' or '-'")]
    InvalidFormat { code: String },

    #[error("Short code is reserved")]
    Reserved { code: String },

    #[error("Short code already exists")]
    Conflict { code: String },

    #[error("Could not allocate a unique short code after {attempts} attempts")]
    Exhausted { attempts: usize },

    #[error("Entropy source unavailable: {0}")]
    Entropy(String),

    #[error(transparent)]
    Storage(#[from] AppError),
}

impl From<AllocationError> for AppError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::InvalidFormat { ref code } => AppError::bad_request(
                err.to_string(),
                json!({ "field": "short_code", "code": code }),
            ),
            AllocationError::Reserved { ref code } => AppError::bad_request(
                err.to_string(),
                json!({ "field": "short_code", "code": code, "reason": "reserved" }),
            ),
            AllocationError::Conflict { ref code } => {
                AppError::conflict(err.to_string(), json!({ "code": code }))
            }
            AllocationError::Exhausted { attempts } => {
                tracing::error!(attempts, "Short code space exhausted");
                AppError::exhausted(err.to_string(), json!({ "attempts": attempts }))
            }
            AllocationError::Entropy(_) => {
                tracing::error!(error = %err, "Short code generation failed");
                AppError::internal("Internal server error", json!({}))
            }
            AllocationError::Storage(e) => e,
        }
    }
}

/// Hands out short codes that no other link holds.
///
/// The repository's unique constraint is the authority: the existence check
/// only saves a doomed insert, and a conflict reported by the insert itself
/// sends a generated code back for another attempt. See
/// [`code_generator`] for the collision math behind [`MAX_ATTEMPTS`].
pub struct ShortCodeAllocator<L: LinkRepository + ?Sized> {
    repository: Arc<L>,
}

impl<L: LinkRepository + ?Sized> ShortCodeAllocator<L> {
    pub fn new(repository: Arc<L>) -> Self {
        Self { repository }
    }

    /// Returns a usable code: the checked `candidate`, or a fresh random one.
    ///
    /// Nothing is reserved by this call; a concurrent writer can still take
    /// the code before it is inserted. Use [`allocate_with`](Self::allocate_with)
    /// to allocate and insert as one step.
    pub async fn allocate(&self, candidate: Option<&str>) -> Result<String, AllocationError> {
        match candidate {
            Some(code) => self.check_candidate(code).await,
            None => {
                for _ in 0..MAX_ATTEMPTS {
                    if let Some(code) = self.next_random().await? {
                        return Ok(code);
                    }
                }
                Err(AllocationError::Exhausted {
                    attempts: MAX_ATTEMPTS,
                })
            }
        }
    }

    /// Allocates a code and runs `insert` with it.
    ///
    /// `insert` reporting [`AppError::Conflict`] means another writer won the
    /// code: a candidate fails with [`AllocationError::Conflict`], a generated
    /// code is retried until [`MAX_ATTEMPTS`] is spent.
    pub async fn allocate_with<T, F, Fut>(
        &self,
        candidate: Option<&str>,
        mut insert: F,
    ) -> Result<T, AllocationError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        if let Some(code) = candidate {
            let code = self.check_candidate(code).await?;
            return match insert(code.clone()).await {
                Err(AppError::Conflict { .. }) => Err(AllocationError::Conflict { code }),
                other => Ok(other?),
            };
        }

        for attempt in 1..=MAX_ATTEMPTS {
            let Some(code) = self.next_random().await? else {
                continue;
            };

            match insert(code).await {
                Err(AppError::Conflict { .. }) => {
                    metrics::counter!("short_code_retries_total").increment(1);
                    tracing::debug!(attempt, "Short code taken at insert, retrying");
                }
                other => return Ok(other?),
            }
        }

        Err(AllocationError::Exhausted {
            attempts: MAX_ATTEMPTS,
        })
    }

    /// A candidate is used exactly as given; surrounding whitespace is
    /// outside the alphabet and rejected like any other symbol.
    async fn check_candidate(&self, code: &str) -> Result<String, AllocationError> {
        match code_generator::check_code(code) {
            Ok(()) => {}
            Err(CodeRejection::Reserved) => {
                return Err(AllocationError::Reserved { code: code.into() });
            }
            Err(CodeRejection::Length | CodeRejection::Alphabet) => {
                return Err(AllocationError::InvalidFormat { code: code.into() });
            }
        }

        if self.repository.find_by_code(code).await?.is_some() {
            return Err(AllocationError::Conflict { code: code.into() });
        }

        Ok(code.to_string())
    }

    /// One attempt: a random code that is neither reserved nor visibly taken.
    async fn next_random(&self) -> Result<Option<String>, AllocationError> {
        let code =
            code_generator::generate_code().map_err(|e| AllocationError::Entropy(e.to_string()))?;

        if code_generator::is_reserved(&code) {
            return Ok(None);
        }

        if self.repository.find_by_code(&code).await?.is_some() {
            metrics::counter!("short_code_retries_total").increment(1);
            return Ok(None);
        }

        Ok(Some(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Link, NewLink};
    use crate::domain::repositories::MockLinkRepository;
    use crate::infrastructure::memory::MemoryLinkRepository;
    use crate::utils::code_generator::{ALPHABET, GENERATED_LENGTH, RESERVED_CODES};
    use chrono::Utc;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn existing_link(code: &str) -> Link {
        Link {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            short_code: code.to_string(),
            target_url: "https://example.com".to_string(),
            title: None,
            is_active: true,
            click_count: 0,
            last_clicked_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn new_link(code: String) -> NewLink {
        NewLink {
            user_id: Uuid::new_v4(),
            short_code: code,
            target_url: "https://example.com".to_string(),
            title: None,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_candidate_too_short() {
        let allocator = ShortCodeAllocator::new(Arc::new(MockLinkRepository::new()));

        assert!(matches!(
            allocator.allocate(Some("ab")).await,
            Err(AllocationError::InvalidFormat { .. })
        ));
    }

    #[tokio::test]
    async fn test_candidate_bad_characters() {
        let allocator = ShortCodeAllocator::new(Arc::new(MockLinkRepository::new()));

        assert!(matches!(
            allocator.allocate(Some("hello world")).await,
            Err(AllocationError::InvalidFormat { .. })
        ));
    }

    #[tokio::test]
    async fn test_candidate_with_whitespace_is_not_trimmed() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code().times(0);
        let allocator = ShortCodeAllocator::new(Arc::new(repo));

        for code in [" promo", "  promo ", "promo\t"] {
            assert!(matches!(
                allocator.allocate(Some(code)).await,
                Err(AllocationError::InvalidFormat { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_candidate_reserved() {
        let allocator = ShortCodeAllocator::new(Arc::new(MockLinkRepository::new()));

        assert!(matches!(
            allocator.allocate(Some("login")).await,
            Err(AllocationError::Reserved { .. })
        ));
    }

    #[tokio::test]
    async fn test_candidate_taken() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code()
            .withf(|code| code == "promo2025")
            .times(1)
            .returning(|code| Ok(Some(existing_link(code))));

        let allocator = ShortCodeAllocator::new(Arc::new(repo));

        assert!(matches!(
            allocator.allocate(Some("promo2025")).await,
            Err(AllocationError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_candidate_returned_unchanged() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code().returning(|_| Ok(None));

        let allocator = ShortCodeAllocator::new(Arc::new(repo));

        assert_eq!(
            allocator.allocate(Some("My_Promo-1")).await.unwrap(),
            "My_Promo-1"
        );
    }

    #[tokio::test]
    async fn test_generated_code_shape() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code().returning(|_| Ok(None));

        let allocator = ShortCodeAllocator::new(Arc::new(repo));
        let code = allocator.allocate(None).await.unwrap();

        assert_eq!(code.len(), GENERATED_LENGTH);
        assert!(code.bytes().all(|b| ALPHABET.contains(&b)));
        assert!(!RESERVED_CODES.contains(&code.as_str()));
    }

    #[tokio::test]
    async fn test_generated_code_exhausted_when_every_code_is_taken() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code()
            .times(MAX_ATTEMPTS)
            .returning(|code| Ok(Some(existing_link(code))));

        let allocator = ShortCodeAllocator::new(Arc::new(repo));

        assert!(matches!(
            allocator.allocate(None).await,
            Err(AllocationError::Exhausted { attempts: MAX_ATTEMPTS })
        ));
    }

    #[tokio::test]
    async fn test_insert_conflict_triggers_retry() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code().returning(|_| Ok(None));
        let allocator = ShortCodeAllocator::new(Arc::new(repo));

        let inserts = AtomicUsize::new(0);
        let code = allocator
            .allocate_with(None, |code| {
                let n = inserts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(AppError::conflict("Unique constraint violation", json!({})))
                    } else {
                        Ok(code)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(inserts.load(Ordering::SeqCst), 3);
        assert_eq!(code.len(), GENERATED_LENGTH);
    }

    #[tokio::test]
    async fn test_insert_conflict_exhausts_attempts() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code().returning(|_| Ok(None));
        let allocator = ShortCodeAllocator::new(Arc::new(repo));

        let inserts = AtomicUsize::new(0);
        let result: Result<(), _> = allocator
            .allocate_with(None, |_| {
                inserts.fetch_add(1, Ordering::SeqCst);
                async { Err(AppError::conflict("taken", json!({}))) }
            })
            .await;

        assert!(matches!(result, Err(AllocationError::Exhausted { .. })));
        assert_eq!(inserts.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_candidate_insert_conflict_is_not_retried() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code().returning(|_| Ok(None));
        let allocator = ShortCodeAllocator::new(Arc::new(repo));

        let inserts = AtomicUsize::new(0);
        let result: Result<(), _> = allocator
            .allocate_with(Some("raced-code"), |_| {
                inserts.fetch_add(1, Ordering::SeqCst);
                async { Err(AppError::conflict("taken", json!({}))) }
            })
            .await;

        assert!(matches!(result, Err(AllocationError::Conflict { .. })));
        assert_eq!(inserts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_storage_errors_are_not_retried() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code()
            .times(1)
            .returning(|_| Err(AppError::internal("Database error", json!({}))));

        let allocator = ShortCodeAllocator::new(Arc::new(repo));

        assert!(matches!(
            allocator.allocate(None).await,
            Err(AllocationError::Storage(AppError::Internal { .. }))
        ));
    }

    #[tokio::test]
    async fn test_same_candidate_twice_conflicts() {
        let repo = Arc::new(MemoryLinkRepository::new());
        let allocator = ShortCodeAllocator::new(Arc::clone(&repo));

        let first = allocator
            .allocate_with(Some("summer-sale"), |code| repo.create(new_link(code)))
            .await;
        assert!(first.is_ok());

        let second = allocator
            .allocate_with(Some("summer-sale"), |code| repo.create(new_link(code)))
            .await;
        assert!(matches!(second, Err(AllocationError::Conflict { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_allocations_are_distinct() {
        const WRITERS: usize = 64;

        let repo = Arc::new(MemoryLinkRepository::new());
        let allocator = Arc::new(ShortCodeAllocator::new(Arc::clone(&repo)));

        let handles: Vec<_> = (0..WRITERS)
            .map(|_| {
                let repo = Arc::clone(&repo);
                let allocator = Arc::clone(&allocator);
                tokio::spawn(async move {
                    allocator
                        .allocate_with(None, |code| repo.create(new_link(code)))
                        .await
                        .map(|link| link.short_code)
                })
            })
            .collect();

        let mut codes = HashSet::new();
        for handle in handles {
            let code = handle.await.unwrap().unwrap();
            assert!(!RESERVED_CODES.contains(&code.as_str()));
            codes.insert(code);
        }

        assert_eq!(codes.len(), WRITERS);
        assert_eq!(repo.count().await.unwrap(), WRITERS as i64);
    }
}
