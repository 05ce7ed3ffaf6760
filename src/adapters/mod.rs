// Adapters layer: concrete implementations for external systems (backend, auth, local files).

pub mod auth;
pub mod storage;
pub mod supabase;

pub use auth::{StaticSession, SupabaseAuth};
pub use storage::{DraftStore, LocalStorage};
pub use supabase::SupabaseClient;
