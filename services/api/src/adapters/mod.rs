pub mod db;
pub mod keys;
pub mod local_storage;
pub mod memory;
pub mod supabase_storage;

pub use db::DbAdapter;
pub use local_storage::LocalStorage;
pub use memory::MemoryDatabase;
pub use supabase_storage::SupabaseStorage;
