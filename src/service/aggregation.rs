use bigdecimal::{BigDecimal, Zero};
use indexmap::IndexMap;
use std::sync::Arc;

use crate::db::NotaRepository;
use crate::error::Result;
use crate::models::{
    Alerta, DadosCnpj, Estatisticas, ItemResumo, Nota, RelatorioCnpj, ResumoGeral,
};

/// 差额阈值 (绝对金额, 严格大于才报警)
pub const ANOMALY_THRESHOLD: i64 = 50;

/// 空集合的平均值为 0
fn media(total: BigDecimal, count: usize) -> BigDecimal {
    if count == 0 {
        BigDecimal::zero()
    } else {
        total / BigDecimal::from(count as u64)
    }
}

/// 按 CNPJ 分组 (保持首次出现顺序)
fn agrupar_por_cnpj(notas: &[Nota]) -> IndexMap<&str, Vec<&Nota>> {
    let mut grupos: IndexMap<&str, Vec<&Nota>> = IndexMap::new();
    for nota in notas {
        grupos.entry(nota.cnpj.as_str()).or_default().push(nota);
    }
    grupos
}

/// 每个 CNPJ: 税额合计, 以及每张发票 |金额-税额| 的平均值
pub fn relatorio_por_cnpj(notas: &[Nota]) -> Vec<RelatorioCnpj> {
    agrupar_por_cnpj(notas)
        .into_iter()
        .map(|(cnpj, grupo)| {
            let total_impostos = grupo
                .iter()
                .fold(BigDecimal::zero(), |acc, n| acc + n.imposto_total());
            let soma_diferencas = grupo
                .iter()
                .fold(BigDecimal::zero(), |acc, n| acc + n.diferenca());
            RelatorioCnpj {
                cnpj: cnpj.to_string(),
                total_impostos,
                media_diferenca: media(soma_diferencas, grupo.len()),
            }
        })
        .collect()
}

/// 差额超过阈值的发票
pub fn alertas(notas: &[Nota]) -> Vec<Alerta> {
    let limite = BigDecimal::from(ANOMALY_THRESHOLD);
    notas
        .iter()
        .filter_map(|nota| {
            let valor_total = nota.valor_total();
            let imposto_total = nota.imposto_total();
            let diferenca = (&valor_total - &imposto_total).abs();
            (diferenca > limite).then(|| Alerta {
                numero_nota: nota.numero_nota.clone(),
                cnpj: nota.cnpj.clone(),
                valor_total,
                imposto_total,
                diferenca,
            })
        })
        .collect()
}

pub fn estatisticas(notas: &[Nota]) -> Estatisticas {
    let itens = notas.iter().flat_map(|n| n.itens.iter());

    let mut total_itens = 0usize;
    let mut valor_total = BigDecimal::zero();
    let mut imposto_total = BigDecimal::zero();
    for item in itens {
        total_itens += 1;
        valor_total += item.valor();
        imposto_total += &item.imposto_item;
    }

    Estatisticas {
        total_notas: notas.len() as i64,
        total_itens: total_itens as i64,
        valor_total,
        media_imposto_item: media(imposto_total.clone(), total_itens),
        imposto_total,
    }
}

/// 解读用的数据: 总体摘要 + 按 CNPJ 的明细
pub fn resumo(notas: &[Nota]) -> (ResumoGeral, Vec<DadosCnpj>) {
    let dados: Vec<DadosCnpj> = agrupar_por_cnpj(notas)
        .into_iter()
        .map(|(cnpj, grupo)| {
            let itens: Vec<ItemResumo> = grupo
                .iter()
                .flat_map(|n| n.itens.iter())
                .map(|i| ItemResumo {
                    descricao_item: i.descricao_item.clone(),
                    quantidade: i.quantidade.clone(),
                    valor_unitario: i.valor_unitario.clone(),
                    imposto: i.imposto_item.clone(),
                })
                .collect();
            DadosCnpj {
                cnpj: cnpj.to_string(),
                total_notas: grupo.len() as i64,
                valor_total: grupo.iter().fold(BigDecimal::zero(), |acc, n| acc + n.valor_total()),
                imposto_total: grupo.iter().fold(BigDecimal::zero(), |acc, n| acc + n.imposto_total()),
                itens,
            }
        })
        .collect();

    let geral = ResumoGeral {
        total_notas: dados.iter().map(|d| d.total_notas).sum(),
        total_itens: dados.iter().map(|d| d.itens.len() as i64).sum(),
        valor_total: dados.iter().fold(BigDecimal::zero(), |acc, d| acc + &d.valor_total),
        imposto_total: dados.iter().fold(BigDecimal::zero(), |acc, d| acc + &d.imposto_total),
    };

    (geral, dados)
}

/// 统计服务: 每次调用都从存储重新计算, 不做缓存
pub struct AggregationService {
    repo: Arc<dyn NotaRepository>,
}

impl AggregationService {
    pub fn new(repo: Arc<dyn NotaRepository>) -> Self {
        Self { repo }
    }

    /// 空字符串视为不过滤
    pub async fn relatorio(&self, cnpj: Option<&str>) -> Result<Vec<RelatorioCnpj>> {
        let filtro = cnpj.map(str::trim).filter(|c| !c.is_empty());
        let notas = self.repo.list_notas(filtro).await?;
        Ok(relatorio_por_cnpj(&notas))
    }

    pub async fn alertas(&self) -> Result<Vec<Alerta>> {
        let notas = self.repo.list_notas(None).await?;
        let alertas = alertas(&notas);
        tracing::debug!("{} 张发票中 {} 张超过阈值", notas.len(), alertas.len());
        Ok(alertas)
    }

    pub async fn estatisticas(&self) -> Result<Estatisticas> {
        let notas = self.repo.list_notas(None).await?;
        Ok(estatisticas(&notas))
    }

    pub async fn resumo(&self) -> Result<(ResumoGeral, Vec<DadosCnpj>)> {
        let notas = self.repo.list_notas(None).await?;
        Ok(resumo(&notas))
    }
}
