use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

/// Route-level cache invalidation.
/// Mutating actions publish the affected path; connected clients refetch it.
#[derive(Clone)]
pub struct Revalidator {
    tx: broadcast::Sender<String>,
}

impl Revalidator {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Mark a route path stale
    pub fn revalidate_path(&self, path: &str) {
        // No subscribers is not an error
        let receivers = self.tx.send(path.to_string()).unwrap_or(0);
        tracing::debug!("Revalidated {} ({} subscribers)", path, receivers);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

impl Default for Revalidator {
    fn default() -> Self {
        Self::new()
    }
}
