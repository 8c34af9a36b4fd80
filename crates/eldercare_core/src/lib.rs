pub mod alarm;
pub mod domain;
pub mod ports;
pub mod registry;
pub mod relay;
pub mod scheduler;
pub mod verification;
pub mod workflow;

pub use alarm::{AlarmController, AlarmPhase};
pub use domain::{
    ActivityTask, ActivityType, AlarmSession, CareProfile, FamilyContact, NewTask, NoticeKind,
    PhotoEvidence, StatusNotice, TaskChanges, TimeOfDay, VerificationResult,
};
pub use ports::{AttentionSignal, Clock, NotificationChannel, PortError, PortResult, VisionService};
pub use registry::TaskRegistry;
pub use relay::NotificationRelay;
pub use scheduler::MinuteScheduler;
pub use verification::VerificationClient;
pub use workflow::{
    CareWorkflow, PhotoOutcome, WorkflowEvent, WorkflowPorts, WorkflowSettings, WorkflowSnapshot,
};
