pub mod parser;

use std::sync::Arc;

use crate::db::NotaRepository;
use crate::error::Result;

pub use parser::parse_csv;

/// 导入结果统计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub notas: usize,
    pub itens: usize,
}

/// CSV 导入: 解析全部行成功后才一次性写库
pub struct CsvIngestor {
    repo: Arc<dyn NotaRepository>,
}

impl CsvIngestor {
    pub fn new(repo: Arc<dyn NotaRepository>) -> Self {
        Self { repo }
    }

    pub async fn ingest(&self, content: &[u8]) -> Result<IngestSummary> {
        let notas = parse_csv(content)?;
        let summary = IngestSummary {
            notas: notas.len(),
            itens: notas.iter().map(|n| n.itens.len()).sum(),
        };

        if summary.notas == 0 {
            tracing::info!("CSV 无数据行, 跳过写库");
            return Ok(summary);
        }

        self.repo.insert_notas(&notas).await?;
        tracing::info!("导入完成: {} 张发票, {} 条明细", summary.notas, summary.itens);
        Ok(summary)
    }
}
