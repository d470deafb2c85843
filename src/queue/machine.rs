use crate::models::QueueStatus;

/// State-changing events on a queue entry. `add` is not listed: it creates
/// the entry rather than transitioning it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Call,
    Start,
    Complete,
    NoShow,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Call => "call",
            Event::Start => "start",
            Event::Complete => "complete",
            Event::NoShow => "no_show",
        }
    }
}

const ALL_STATUSES: [QueueStatus; 5] = [
    QueueStatus::Waiting,
    QueueStatus::Called,
    QueueStatus::InService,
    QueueStatus::Completed,
    QueueStatus::NoShow,
];

/// The full transition table. Anything not covered here is illegal and must
/// leave the entry untouched.
pub fn next_status(from: QueueStatus, event: Event) -> Option<QueueStatus> {
    match (from, event) {
        (QueueStatus::Waiting, Event::Call) => Some(QueueStatus::Called),
        (QueueStatus::Called, Event::Start) => Some(QueueStatus::InService),
        (QueueStatus::InService, Event::Complete) => Some(QueueStatus::Completed),
        (QueueStatus::Waiting, Event::NoShow) | (QueueStatus::Called, Event::NoShow) => {
            Some(QueueStatus::NoShow)
        }
        _ => None,
    }
}

/// States an event may legally fire from, derived from the table. Used by
/// the store to build the status guard of its conditional update.
pub fn prior_states(event: Event) -> Vec<QueueStatus> {
    ALL_STATUSES
        .into_iter()
        .filter(|status| next_status(*status, event).is_some())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_EVENTS: [Event; 4] = [Event::Call, Event::Start, Event::Complete, Event::NoShow];

    #[test]
    fn legal_transitions_match_the_table() {
        assert_eq!(
            next_status(QueueStatus::Waiting, Event::Call),
            Some(QueueStatus::Called)
        );
        assert_eq!(
            next_status(QueueStatus::Called, Event::Start),
            Some(QueueStatus::InService)
        );
        assert_eq!(
            next_status(QueueStatus::InService, Event::Complete),
            Some(QueueStatus::Completed)
        );
        assert_eq!(
            next_status(QueueStatus::Waiting, Event::NoShow),
            Some(QueueStatus::NoShow)
        );
        assert_eq!(
            next_status(QueueStatus::Called, Event::NoShow),
            Some(QueueStatus::NoShow)
        );
    }

    #[test]
    fn every_other_pair_is_rejected() {
        let legal = [
            (QueueStatus::Waiting, Event::Call),
            (QueueStatus::Called, Event::Start),
            (QueueStatus::InService, Event::Complete),
            (QueueStatus::Waiting, Event::NoShow),
            (QueueStatus::Called, Event::NoShow),
        ];
        for status in ALL_STATUSES {
            for event in ALL_EVENTS {
                if legal.contains(&(status, event)) {
                    continue;
                }
                assert_eq!(
                    next_status(status, event),
                    None,
                    "{status:?} must not accept {}",
                    event.name()
                );
            }
        }
    }

    #[test]
    fn terminal_states_accept_nothing() {
        for status in [QueueStatus::Completed, QueueStatus::NoShow] {
            for event in ALL_EVENTS {
                assert_eq!(next_status(status, event), None);
            }
        }
    }

    #[test]
    fn prior_states_follow_the_table() {
        assert_eq!(prior_states(Event::Call), vec![QueueStatus::Waiting]);
        assert_eq!(prior_states(Event::Start), vec![QueueStatus::Called]);
        assert_eq!(prior_states(Event::Complete), vec![QueueStatus::InService]);
        assert_eq!(
            prior_states(Event::NoShow),
            vec![QueueStatus::Waiting, QueueStatus::Called]
        );
    }
}
