pub mod decimal;
pub mod nota;
pub mod report;
pub mod usuario;

pub use nota::{Item, Nota, NovaNota, NovoItem};
pub use report::{
    Alerta, DadosCnpj, Estatisticas, InterpretacaoResponse, ItemResumo, PerguntaRequest,
    RelatorioCnpj, ResumoGeral,
};
pub use usuario::{Credenciais, Usuario};
