use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use super::decimal;

/// GET /relatorio 每个 CNPJ 一行
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatorioCnpj {
    pub cnpj: String,
    #[serde(serialize_with = "decimal::serialize")]
    pub total_impostos: BigDecimal,
    #[serde(serialize_with = "decimal::serialize")]
    pub media_diferenca: BigDecimal,
}

/// GET /alertas: 差额超过阈值的发票
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alerta {
    #[serde(rename = "numero_nota")]
    pub numero_nota: String,
    pub cnpj: String,
    #[serde(serialize_with = "decimal::serialize")]
    pub valor_total: BigDecimal,
    #[serde(serialize_with = "decimal::serialize")]
    pub imposto_total: BigDecimal,
    #[serde(serialize_with = "decimal::serialize")]
    pub diferenca: BigDecimal,
}

/// GET /estatisticas
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Estatisticas {
    pub total_notas: i64,
    pub total_itens: i64,
    #[serde(serialize_with = "decimal::serialize")]
    pub valor_total: BigDecimal,
    #[serde(serialize_with = "decimal::serialize")]
    pub imposto_total: BigDecimal,
    #[serde(serialize_with = "decimal::serialize")]
    pub media_imposto_item: BigDecimal,
}

/// 提示词中的总体摘要, 同时随解读结果返回
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumoGeral {
    pub total_notas: i64,
    pub total_itens: i64,
    #[serde(serialize_with = "decimal::serialize")]
    pub valor_total: BigDecimal,
    #[serde(serialize_with = "decimal::serialize")]
    pub imposto_total: BigDecimal,
}

/// 按 CNPJ 展开的明细 (仅用于渲染提示词)
#[derive(Debug, Clone, PartialEq)]
pub struct DadosCnpj {
    pub cnpj: String,
    pub total_notas: i64,
    pub valor_total: BigDecimal,
    pub imposto_total: BigDecimal,
    pub itens: Vec<ItemResumo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemResumo {
    pub descricao_item: String,
    pub quantidade: BigDecimal,
    pub valor_unitario: BigDecimal,
    pub imposto: BigDecimal,
}

#[derive(Debug, Deserialize)]
pub struct PerguntaRequest {
    #[serde(alias = "Pergunta")]
    pub pergunta: String,
}

#[derive(Debug, Serialize)]
pub struct InterpretacaoResponse {
    pub resumo: ResumoGeral,
    pub interpretacao: String,
}
