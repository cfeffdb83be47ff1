use tokio::sync::watch;

/// Owner side of a one-shot, sticky shutdown flag.
pub struct ShutdownSignal {
    sender: watch::Sender<bool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    /// Fires the signal. Repeated calls are no-ops.
    pub fn trigger(&self) -> bool {
        !self.sender.send_replace(true)
    }

    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct CancellationToken {
    receiver: watch::Receiver<bool>,
}

impl CancellationToken {
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once the signal fires. Never resolves if the signal is dropped unfired.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        while !*receiver.borrow_and_update() {
            if receiver.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        let (_, receiver) = watch::channel(false);
        Self { receiver }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_wakes_waiters() {
        let signal = ShutdownSignal::new();
        let token = signal.token();
        assert!(!token.is_cancelled());

        let waiter = tokio::spawn({
            let token = token.clone();
            async move { token.cancelled().await }
        });

        assert!(signal.trigger());
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_trigger_is_sticky_and_idempotent() {
        let signal = ShutdownSignal::new();
        assert!(signal.trigger());
        assert!(!signal.trigger());
        assert!(signal.is_triggered());

        let late = signal.token();
        tokio::time::timeout(Duration::from_millis(100), late.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_default_token_never_fires() {
        let token = CancellationToken::default();
        let fired = tokio::time::timeout(Duration::from_millis(50), token.cancelled()).await;
        assert!(fired.is_err());
    }
}
