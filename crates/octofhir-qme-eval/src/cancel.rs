//! Cooperative cancellation

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Flag plus optional deadline.
///
/// Blocking workers poll [`is_cancelled`](Self::is_cancelled) between
/// records; async code awaits [`cancelled`](Self::cancelled). Clones share
/// the flag. A [`child`](Self::child) token is cancelled with its parent but
/// can also be cancelled on its own.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    flags: Vec<Arc<watch::Sender<bool>>>,
    deadline: Option<Instant>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

fn flag() -> Arc<watch::Sender<bool>> {
    Arc::new(watch::Sender::new(false))
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            flags: vec![flag()],
            deadline: None,
        }
    }

    /// Token that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().deadline_in(timeout)
    }

    /// Tighten the deadline to at most `timeout` from now
    pub fn deadline_in(mut self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Token cancelled whenever this one is, with a flag of its own
    pub fn child(&self) -> Self {
        let mut flags = self.flags.clone();
        flags.push(flag());
        Self {
            flags,
            deadline: self.deadline,
        }
    }

    /// Cancel this token and its children; parents are unaffected
    pub fn cancel(&self) {
        if let Some(own) = self.flags.last() {
            own.send_replace(true);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flags.iter().any(|flag| *flag.borrow())
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Resolves once any flag in the chain is set or the deadline passes
    pub async fn cancelled(&self) {
        let flags: Vec<BoxFuture<'static, ()>> = self
            .flags
            .iter()
            .map(|flag| {
                let mut changes = flag.subscribe();
                async move {
                    // the sender lives in `self`, so this only ends on cancel
                    let _ = changes.wait_for(|cancelled| *cancelled).await;
                }
                .boxed()
            })
            .collect();
        let flags = async move {
            if flags.is_empty() {
                future::pending::<()>().await;
            } else {
                future::select_all(flags).await;
            }
        };

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = flags => {}
                    _ = tokio::time::sleep_until(deadline.into()) => {}
                }
            }
            None => flags.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_flag() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_child_does_not_cancel_parent() {
        let parent = CancellationToken::new();
        let child = parent.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());

        let other = parent.child();
        parent.cancel();
        assert!(other.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiter() {
        let parent = CancellationToken::new();
        let child = parent.child();

        let waiter = tokio::spawn(async move { child.cancelled().await });
        tokio::task::yield_now().await;
        parent.cancel();

        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_resolves_at_deadline() {
        let token = CancellationToken::with_timeout(Duration::from_millis(20));
        tokio::time::timeout(Duration::from_secs(5), token.cancelled())
            .await
            .unwrap();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_expired_deadline() {
        let token = CancellationToken::with_timeout(Duration::ZERO);
        assert!(token.is_cancelled());

        let token = CancellationToken::new().deadline_in(Duration::from_secs(3600));
        assert!(!token.is_cancelled());
    }
}
