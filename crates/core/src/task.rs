//! Stoppable background tasks.
//!
//! The keep-alive timer and the update poller run for the life of the process
//! but must stop cleanly on shutdown. [`TaskHandle::spawn`] hands the task a
//! [`ShutdownSignal`]; [`TaskHandle::stop`] raises it and waits for the task.

use std::future::Future;

use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};

/// Raises a [`ShutdownSignal`] for work that is not owned by a [`TaskHandle`],
/// such as a server's graceful-shutdown future.
#[derive(Debug)]
pub struct ShutdownTrigger {
    sender: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        // The receiver may already be gone if the work returned on its own.
        let _ = self.sender.send(true);
    }
}

pub fn shutdown_pair() -> (ShutdownTrigger, ShutdownSignal) {
    let (sender, receiver) = watch::channel(false);
    (ShutdownTrigger { sender }, ShutdownSignal { receiver })
}

pub struct TaskHandle {
    name: &'static str,
    shutdown: ShutdownTrigger,
    join: JoinHandle<()>,
}

impl TaskHandle {
    pub fn spawn<F, Fut>(name: &'static str, task: F) -> Self
    where
        F: FnOnce(ShutdownSignal) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown, signal) = shutdown_pair();
        let join = tokio::spawn(task(signal));
        Self { name, shutdown, join }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub async fn stop(self) -> Result<(), JoinError> {
        self.shutdown.trigger();
        self.join.await
    }
}

#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn is_requested(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once stop was requested or the owning handle was dropped.
    pub async fn requested(&mut self) {
        while !*self.receiver.borrow_and_update() {
            if self.receiver.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::TaskHandle;

    #[tokio::test]
    async fn stop_interrupts_a_waiting_task() {
        let ticks = Arc::new(AtomicU32::new(0));
        let task_ticks = ticks.clone();

        let handle = TaskHandle::spawn("ticker", move |mut shutdown| async move {
            loop {
                tokio::select! {
                    _ = shutdown.requested() => return,
                    _ = tokio::time::sleep(Duration::from_millis(5)) => {
                        task_ticks.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(handle.name(), "ticker");
        handle.stop().await.expect("task should join cleanly");

        let observed = ticks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), observed, "no ticks after stop");
    }

    #[tokio::test]
    async fn stop_after_task_finished_is_ok() {
        let handle = TaskHandle::spawn("one-shot", |_shutdown| async {});
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(handle.is_finished());
        handle.stop().await.expect("finished task should still join");
    }

    #[tokio::test]
    async fn trigger_raises_signal_for_every_clone() {
        let (trigger, signal) = super::shutdown_pair();
        let mut waiter = signal.clone();
        assert!(!signal.is_requested());

        trigger.trigger();

        assert!(signal.is_requested());
        waiter.requested().await;
    }

    #[tokio::test]
    async fn dropped_trigger_releases_waiters() {
        let (trigger, mut signal) = super::shutdown_pair();
        drop(trigger);
        signal.requested().await;
        assert!(!signal.is_requested());
    }
}
