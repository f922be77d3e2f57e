//! Campaign engine: governor, pipeline and runner

pub mod governor;
pub mod pacer;
pub mod pipeline;
pub mod progress;
pub mod runner;
pub mod sender_pool;
pub mod traits;

pub use governor::{CampaignRunState, SendGovernor, SenderReservation};
pub use pacer::{PaceOutcome, Pacer};
pub use pipeline::{
    LeadOutcome, LeadPipeline, PipelineSettings, RunContext, RunTemplates, TempDocument,
};
pub use progress::ProgressReporter;
pub use runner::{CampaignRunner, Collaborators};
pub use sender_pool::SenderPool;
pub use traits::{DocumentGenerator, LeadStore, MailTransport, TemplateSource};
