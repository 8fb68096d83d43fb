//! Round lifecycle: deadlines, seat admission, the coordinator and its scheduler

pub mod clock;
pub mod coordinator;
pub mod draw;
pub mod events;
pub mod queue;
pub mod scheduler;
pub mod types;

pub use clock::{Clock, ManualClock, RoundClock, SystemClock};
pub use coordinator::{RoundCoordinator, RoundCoordinatorBuilder};
pub use draw::{DrawSource, FixedDraw, RandomDraw};
pub use events::{EventBus, RoundEvent};
pub use queue::QueueManager;
pub use scheduler::RoundScheduler;
pub use types::{
    Admission, LeaveOutcome, Participant, ParticipantId, Round, RoundId, RoundOutcome,
    RoundSnapshot, RoundStatus, SessionStatus, UserId,
};
