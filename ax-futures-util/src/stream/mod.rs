mod interval;
mod take_until_condition;
mod take_until_signaled;
mod yield_after;

pub use interval::Interval;
pub use take_until_condition::TakeUntilCondition;
pub use take_until_signaled::TakeUntilSignaled;
pub use yield_after::YieldAfter;

use futures::prelude::*;
use tokio::time::Duration;

/// Create a stream of ticks starting immediately and with the given cadence.
pub fn interval(period: Duration) -> Interval {
    Interval::new(period)
}

pub trait AxStreamExt: Stream + Sized {
    /// Take from this stream up to and including the element on which the predicate turns true.
    fn take_until_condition<Fut, F>(self, f: F) -> TakeUntilCondition<Self, Fut, F>
    where
        F: FnMut(&Self::Item) -> Fut,
        Fut: Future<Output = bool>,
    {
        TakeUntilCondition::new(self, f)
    }

    /// Resubmit this stream's task after `items` successfully polled elements, so a
    /// long-running stream cannot starve sibling streams on the same executor.
    fn yield_after(self, items: u64) -> YieldAfter<Self> {
        YieldAfter::new(self, items)
    }

    /// Take from this stream until the given future completes.
    fn take_until_signaled<F>(self, f: F) -> TakeUntilSignaled<Self, F>
    where
        F: Future,
    {
        TakeUntilSignaled::new(self, f)
    }
}

impl<T: Sized + Stream> AxStreamExt for T {}
