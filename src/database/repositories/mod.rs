pub mod overtime_submission;

pub use overtime_submission::OvertimeSubmissionRepository;
