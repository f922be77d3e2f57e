//! Client modules for external services

pub mod pdf;
pub mod smtp;
pub mod supabase;
pub mod templates;

// Re-export all client types
pub use pdf::PdfService;
pub use smtp::SmtpMailer;
pub use supabase::SupabaseClient;
pub use templates::FileTemplateSource;
