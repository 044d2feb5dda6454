use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;

use super::aggregation::AggregationService;
use crate::config::OpenAiConfig;
use crate::error::{AppError, Result};
use crate::models::{DadosCnpj, InterpretacaoResponse, ResumoGeral};

pub const SYSTEM_PROMPT: &str =
    "Você é um analista fiscal que escreve resumos objetivos de dados fiscais.";

/// 文本生成服务 (单轮对话, 返回第一条回复)
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: [Message<'a>; 2],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Azure OpenAI chat/completions
pub struct AzureOpenAiClient {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl AzureOpenAiClient {
    pub fn new(client: reqwest::Client, config: OpenAiConfig) -> Self {
        Self { client, config }
    }

    pub fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.deployment,
            self.config.api_version
        )
    }
}

#[async_trait]
impl ChatCompletion for AzureOpenAiClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        if self.config.endpoint.is_empty() || self.config.deployment.is_empty() {
            return Err(AppError::Config("openai.endpoint / openai.deployment não configurados".into()));
        }

        let request = ChatRequest {
            messages: [
                Message { role: "system", content: system },
                Message { role: "user", content: user },
            ],
        };

        let response = self
            .client
            .post(self.completions_url())
            .header("api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Upstream { status: 502, body: e.to_string() })?;

        let status = response.status();
        tracing::info!("Azure OpenAI 响应状态: {}", status);
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream { status: status.as_u16(), body });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream { status: 502, body: e.to_string() })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::Upstream {
                status: 502,
                body: "resposta sem conteúdo".to_string(),
            })
    }
}

/// 金额: 两位小数, 千位逗号分隔
pub fn format_moeda(value: &BigDecimal) -> String {
    let fixed = value.round(2).with_scale(2).to_string();
    let (sign, digits) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (inteiro, fracao) = digits.split_once('.').unwrap_or((digits, "00"));

    let mut agrupado = String::with_capacity(inteiro.len() + inteiro.len() / 3);
    for (i, ch) in inteiro.chars().enumerate() {
        if i > 0 && (inteiro.len() - i) % 3 == 0 {
            agrupado.push(',');
        }
        agrupado.push(ch);
    }

    format!("{}{}.{}", sign, agrupado, fracao)
}

/// 渲染发给模型的提示词
pub fn render_prompt(geral: &ResumoGeral, dados: &[DadosCnpj], pergunta: &str) -> String {
    let mut prompt = String::new();
    // String 写入不会失败
    let _ = writeln!(
        prompt,
        "Resumo geral: Total Notas: {}, Total Itens: {}, Valor Total: {}, Imposto Total: {}.",
        geral.total_notas,
        geral.total_itens,
        format_moeda(&geral.valor_total),
        format_moeda(&geral.imposto_total)
    );
    let _ = writeln!(prompt, "Dados detalhados por CNPJ:");
    for cnpj in dados {
        let _ = writeln!(
            prompt,
            "CNPJ: {}, Total Notas: {}, Valor Total: {}, Imposto Total: {}",
            cnpj.cnpj,
            cnpj.total_notas,
            format_moeda(&cnpj.valor_total),
            format_moeda(&cnpj.imposto_total)
        );
        let _ = writeln!(prompt, "Itens:");
        for item in &cnpj.itens {
            let _ = writeln!(
                prompt,
                " - Descrição: {}, Quantidade: {}, Valor Unitário: {}, Imposto: {}",
                item.descricao_item,
                item.quantidade,
                format_moeda(&item.valor_unitario),
                format_moeda(&item.imposto)
            );
        }
    }
    let _ = writeln!(prompt, "Pergunta do usuário: {}", pergunta);
    prompt
}

/// 数据解读: 汇总全部发票 → 提示词 → 模型
pub struct InsightService {
    aggregation: Arc<AggregationService>,
    chat: Arc<dyn ChatCompletion>,
}

impl InsightService {
    pub fn new(aggregation: Arc<AggregationService>, chat: Arc<dyn ChatCompletion>) -> Self {
        Self { aggregation, chat }
    }

    pub async fn interpretar(&self, pergunta: &str) -> Result<InterpretacaoResponse> {
        let pergunta = pergunta.trim();
        if pergunta.is_empty() {
            return Err(AppError::InvalidInput("Pergunta vazia.".to_string()));
        }

        let (resumo, dados) = self.aggregation.resumo().await?;
        // TODO: 提示词随发票数量线性增长, 需要按 CNPJ 截断或只发送汇总
        let prompt = render_prompt(&resumo, &dados, pergunta);
        tracing::info!(
            "生成解读: {} 张发票, {} 条明细, 提示词 {} 字节",
            resumo.total_notas,
            resumo.total_itens,
            prompt.len()
        );

        let interpretacao = self.chat.complete(SYSTEM_PROMPT, &prompt).await?;
        Ok(InterpretacaoResponse { resumo, interpretacao })
    }
}
