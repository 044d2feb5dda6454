pub mod memory;
pub mod pool;
pub mod queries;
pub mod repository;

pub use memory::MemoryRepository;
pub use pool::{create_pool, init_schema};
pub use queries::PgRepository;
pub use repository::{NotaRepository, UsuarioRepository};
