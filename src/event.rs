use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Connectivity events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
  /// The remote service answered again after being unreachable
  ConnectivityRestored,
  /// The remote service stopped answering
  ConnectivityLost,
}

/// Produces connectivity events by probing the remote service on a timer.
///
/// Connectivity starts out unknown and is treated as offline, so the first
/// successful probe reports `ConnectivityRestored`. That is what flushes
/// reviews left over from a previous run.
pub struct ConnectivityMonitor {
  rx: mpsc::UnboundedReceiver<Event>,
}

impl ConnectivityMonitor {
  /// Spawn the probe loop with the given probe interval.
  pub fn spawn<P, Fut>(probe: P, interval: Duration) -> Self
  where
    P: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = bool> + Send + 'static,
  {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
      let mut online = false;
      let mut ticker = tokio::time::interval(interval);
      // A probe that hangs until its timeout must not be followed by a burst
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

      loop {
        ticker.tick().await;

        let reachable = probe().await;
        if reachable == online {
          continue;
        }
        online = reachable;

        let event = if online {
          Event::ConnectivityRestored
        } else {
          Event::ConnectivityLost
        };
        debug!(?event, "connectivity changed");

        if tx.send(event).is_err() {
          break;
        }
      }
    });

    Self { rx }
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;

  #[tokio::test]
  async fn test_reports_transitions_only() {
    // offline, online, online, offline, online
    let script = [false, true, true, false, true];
    let calls = Arc::new(AtomicUsize::new(0));
    let probe_calls = Arc::clone(&calls);

    let mut monitor = ConnectivityMonitor::spawn(
      move || {
        let n = probe_calls.fetch_add(1, Ordering::SeqCst);
        let reachable = script.get(n).copied().unwrap_or(true);
        async move { reachable }
      },
      Duration::from_millis(1),
    );

    assert_eq!(monitor.next().await, Some(Event::ConnectivityRestored));
    assert_eq!(monitor.next().await, Some(Event::ConnectivityLost));
    assert_eq!(monitor.next().await, Some(Event::ConnectivityRestored));
    assert!(calls.load(Ordering::SeqCst) >= 5);
  }

  #[tokio::test(start_paused = true)]
  async fn test_slow_probe_does_not_cause_a_burst() {
    let calls = Arc::new(AtomicUsize::new(0));
    let probe_calls = Arc::clone(&calls);

    let mut monitor = ConnectivityMonitor::spawn(
      move || {
        let n = probe_calls.fetch_add(1, Ordering::SeqCst);
        async move {
          if n == 0 {
            // Hangs for six intervals, then fails
            tokio::time::sleep(Duration::from_secs(30)).await;
            return false;
          }
          n == 1
        }
      },
      Duration::from_secs(5),
    );

    assert_eq!(monitor.next().await, Some(Event::ConnectivityRestored));
    // The late tick fires once; the ones missed while hanging are skipped
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_first_successful_probe_restores() {
    let mut monitor = ConnectivityMonitor::spawn(|| async { true }, Duration::from_millis(1));
    assert_eq!(monitor.next().await, Some(Event::ConnectivityRestored));
  }
}
