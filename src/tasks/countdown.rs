//! A cancellable ticker for running tasks.
//!
//! The ticker lives exactly as long as its `Countdown`: dropping the handle
//! aborts the background task, and the task ends on its own once the
//! countdown hits zero or nobody is listening anymore.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

use std::time::Duration;

use super::data::Task;
use super::time::{countdown_end, format_countdown, millis_until};

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CountdownTick {
    pub remaining_ms: i64,
    pub display: String,
}

impl CountdownTick {
    pub fn at(end: DateTime<Utc>, now: DateTime<Utc>) -> CountdownTick {
        let remaining_ms = millis_until(end, now);
        CountdownTick {
            remaining_ms,
            display: format_countdown(remaining_ms),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.remaining_ms == 0
    }
}

pub struct Countdown {
    receiver: watch::Receiver<CountdownTick>,
    handle: JoinHandle<()>,
}

impl Countdown {
    /// Must be called from within a tokio runtime.
    pub fn start(end: DateTime<Utc>, period: Duration) -> Countdown {
        let (sender, receiver) = watch::channel(CountdownTick::at(end, Utc::now()));

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                let tick = CountdownTick::at(end, Utc::now());
                let finished = tick.is_finished();

                if sender.send(tick).is_err() {
                    debug!("Countdown has no listeners left");
                    break;
                }
                if finished {
                    break;
                }
            }
        });

        Countdown { receiver, handle }
    }

    /// `None` unless the task is in progress with a start time and an estimate.
    pub fn for_task(task: &Task, period: Duration) -> Option<Countdown> {
        countdown_end(task).map(|end| Countdown::start(end, period))
    }

    pub fn current(&self) -> CountdownTick {
        self.receiver.borrow().clone()
    }

    /// Waits for the next tick; `None` once the countdown has finished.
    pub async fn next(&mut self) -> Option<CountdownTick> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::data::{sample_task, Priority, TaskStatus};
    use crate::tasks::time::ZERO_COUNTDOWN;

    #[tokio::test]
    async fn expired_countdown_finishes_at_zero() {
        let end = Utc::now() - chrono::Duration::seconds(5);
        let mut countdown = Countdown::start(end, Duration::from_millis(5));

        assert_eq!(countdown.current().display, ZERO_COUNTDOWN);

        let mut last = countdown.current();
        while let Some(tick) = countdown.next().await {
            last = tick;
        }
        assert!(last.is_finished());
        assert!(countdown.next().await.is_none());
    }

    #[tokio::test]
    async fn short_countdown_ticks_down_to_zero() {
        let end = Utc::now() + chrono::Duration::milliseconds(60);
        let mut countdown = Countdown::start(end, Duration::from_millis(10));

        let first = countdown.current();
        assert!(first.remaining_ms > 0);

        let mut ticks = vec![];
        while let Some(tick) = countdown.next().await {
            ticks.push(tick);
        }

        assert!(!ticks.is_empty());
        assert!(ticks.windows(2).all(|w| w[0].remaining_ms >= w[1].remaining_ms));
        assert_eq!(ticks.last().unwrap().display, ZERO_COUNTDOWN);
    }

    #[tokio::test]
    async fn dropping_the_countdown_stops_the_ticker() {
        let end = Utc::now() + chrono::Duration::hours(1);
        let countdown = Countdown::start(end, Duration::from_millis(5));
        assert!(countdown.is_running());

        let mut receiver = countdown.receiver.clone();
        drop(countdown);

        // the sender goes away with the aborted task
        let closed = tokio::time::timeout(Duration::from_secs(1), async {
            while receiver.changed().await.is_ok() {}
        })
        .await;
        assert!(closed.is_ok());
    }

    #[tokio::test]
    async fn only_running_tasks_get_a_countdown() {
        let mut task = sample_task(Priority::High, TaskStatus::Todo);
        task.estimated_minutes = Some(10);
        assert!(Countdown::for_task(&task, Duration::from_millis(10)).is_none());

        task.status = TaskStatus::InProgress;
        task.start_time = Some(Utc::now());
        let countdown = Countdown::for_task(&task, Duration::from_millis(10)).unwrap();
        assert!(countdown.current().remaining_ms > 9 * 60 * 1000);
    }
}
