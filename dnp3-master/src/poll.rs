//! Periodic polls of an association

use crate::request::ReadRequest;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;

/// Scheduling decision returned by the association
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Next<T> {
    /// Run this now
    Now(T),
    /// Nothing can run before this instant
    NotBefore(Instant),
    /// Nothing to run until something changes
    None,
}

/// A poll due for execution
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DuePoll {
    pub(crate) id: u64,
    pub(crate) request: ReadRequest,
    /// Run because of a demand rather than the period
    pub(crate) demanded: bool,
}

#[derive(Debug, Clone)]
struct Poll {
    request: ReadRequest,
    period: Duration,
    next: Instant,
    demanded: bool,
    /// Executing or waiting for a retry
    running: bool,
}

impl Poll {
    fn is_ready(&self, now: Instant) -> bool {
        !self.running && (self.demanded || self.next <= now)
    }
}

/// Polls keyed by id, evaluated in id order
#[derive(Debug, Default)]
pub(crate) struct PollMap {
    next_id: u64,
    polls: BTreeMap<u64, Poll>,
}

impl PollMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Schedule `request` every `period`, first run one period from `now`
    pub(crate) fn add(&mut self, request: ReadRequest, period: Duration, now: Instant) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.polls.insert(
            id,
            Poll {
                request,
                period,
                next: now + period,
                demanded: false,
                running: false,
            },
        );
        id
    }

    pub(crate) fn remove(&mut self, id: u64) -> bool {
        self.polls.remove(&id).is_some()
    }

    /// Run the poll as soon as possible without moving its periodic schedule
    pub(crate) fn demand(&mut self, id: u64) -> bool {
        match self.polls.get_mut(&id) {
            Some(poll) => {
                poll.demanded = true;
                true
            }
            None => false,
        }
    }

    /// Mark a due poll as handed to the scheduler
    ///
    /// The run consumes any pending demand; a demand made while it executes runs the
    /// poll again afterwards.
    pub(crate) fn start(&mut self, id: u64) {
        if let Some(poll) = self.polls.get_mut(&id) {
            poll.running = true;
            poll.demanded = false;
        }
    }

    /// Record completion (success or terminal failure) of a poll run
    pub(crate) fn complete(&mut self, id: u64, demanded: bool, now: Instant) {
        if let Some(poll) = self.polls.get_mut(&id) {
            poll.running = false;
            if demanded && poll.next > now {
                return;
            }
            poll.next = now + poll.period;
        }
    }

    pub(crate) fn next(&self, now: Instant) -> Next<DuePoll> {
        let mut earliest: Option<Instant> = None;
        for (id, poll) in &self.polls {
            if poll.is_ready(now) {
                return Next::Now(DuePoll {
                    id: *id,
                    request: poll.request.clone(),
                    demanded: poll.demanded,
                });
            }
            if !poll.running {
                earliest = Some(earliest.map_or(poll.next, |x| x.min(poll.next)));
            }
        }
        match earliest {
            Some(at) => Next::NotBefore(at),
            None => Next::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dnp3_core::Classes;

    fn request() -> ReadRequest {
        ReadRequest::class_scan(Classes::class123())
    }

    #[test]
    fn test_empty_map() {
        let map = PollMap::new();
        assert_eq!(map.next(Instant::now()), Next::None);
    }

    #[test]
    fn test_period_schedule() {
        let now = Instant::now();
        let mut map = PollMap::new();
        let id = map.add(request(), Duration::from_secs(10), now);
        assert_eq!(map.next(now), Next::NotBefore(now + Duration::from_secs(10)));

        let later = now + Duration::from_secs(10);
        let Next::Now(due) = map.next(later) else {
            panic!("poll should be due");
        };
        assert_eq!(due.id, id);
        assert!(!due.demanded);
        map.complete(id, false, later);
        assert_eq!(map.next(later), Next::NotBefore(later + Duration::from_secs(10)));
    }

    #[test]
    fn test_demand_keeps_schedule() {
        let now = Instant::now();
        let mut map = PollMap::new();
        let id = map.add(request(), Duration::from_secs(10), now);
        assert!(map.demand(id));

        let soon = now + Duration::from_secs(1);
        let Next::Now(due) = map.next(soon) else {
            panic!("demanded poll should be due");
        };
        assert!(due.demanded);
        map.start(id);
        assert_eq!(map.next(soon), Next::None);
        map.complete(id, true, soon);
        assert_eq!(map.next(soon), Next::NotBefore(now + Duration::from_secs(10)));
    }

    #[test]
    fn test_remove() {
        let now = Instant::now();
        let mut map = PollMap::new();
        let id = map.add(request(), Duration::from_secs(1), now);
        assert!(map.remove(id));
        assert!(!map.remove(id));
        assert!(!map.demand(id));
        assert_eq!(map.next(now + Duration::from_secs(5)), Next::None);
    }

    #[test]
    fn test_demand_during_demanded_run() {
        let now = Instant::now();
        let mut map = PollMap::new();
        let id = map.add(request(), Duration::from_secs(60), now);
        map.demand(id);
        let Next::Now(due) = map.next(now) else {
            panic!("demanded poll should be due");
        };
        map.start(due.id);

        // demanded again while the first run executes
        assert!(map.demand(id));
        assert_eq!(map.next(now), Next::None);
        map.complete(due.id, due.demanded, now);

        let Next::Now(again) = map.next(now) else {
            panic!("second demand should run");
        };
        assert!(again.demanded);
        map.start(again.id);
        map.complete(again.id, again.demanded, now);
        assert_eq!(map.next(now), Next::NotBefore(now + Duration::from_secs(60)));
    }
}
