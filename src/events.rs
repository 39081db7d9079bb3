/// Callback told which entity changed, or `None` when every entity of the
/// kind should be treated as changed.
pub type Listener = Box<dyn FnMut(Option<&str>) + Send>;

/// Handle returned by [`RefreshEmitter::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription(u64);

/// Observer list for one kind of entity.
#[derive(Default)]
pub struct RefreshEmitter {
    listeners: Vec<(Subscription, Listener)>,
    next_id: u64,
}

impl RefreshEmitter {
    pub fn subscribe<F>(&mut self, listener: F) -> Subscription
    where
        F: FnMut(Option<&str>) + Send + 'static,
    {
        let subscription = Subscription(self.next_id);
        self.next_id += 1;
        self.listeners.push((subscription, Box::new(listener)));
        subscription
    }

    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(s, _)| *s != subscription);
        self.listeners.len() != before
    }

    /// Calls every listener in registration order.
    pub fn fire(&mut self, id: Option<&str>) {
        for (_, listener) in &mut self.listeners {
            listener(id);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
