use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use std::io::Read;
use std::str::FromStr;

use crate::error::{AppError, Result};
use crate::models::{NovaNota, NovoItem};

/// cnpj;razao_social;numero_nota;data_emissao;codigo_item;descricao_item;quantidade;valor_unitario;imposto_item
const COLUMNS: usize = 9;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

/// 解析上传的 CSV (分号分隔, 首行为表头)
///
/// 按发票号分组, 保持首次出现顺序; 发票级字段取该发票号的第一行。
/// 任意一行出错即整体失败, 错误中带 1 起始的行号。
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<NovaNota>> {
    // 不处理引号, 字段按原文保留
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut notas: IndexMap<String, NovaNota> = IndexMap::new();

    // 按字节读取, 非 UTF-8 (Latin-1 / Windows-1252 导出) 有损解码
    for record in rdr.byte_records() {
        let record = record.map_err(|e| {
            let line = e.position().map(|p| p.line()).unwrap_or(0);
            AppError::csv(line, e.to_string())
        })?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let fields: Vec<String> = record
            .iter()
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .collect();

        check_columns(&fields, line)?;

        let item = NovoItem {
            codigo_item: fields[4].clone(),
            descricao_item: fields[5].clone(),
            quantidade: parse_decimal(&fields[6], "quantidade", line)?,
            valor_unitario: parse_decimal(&fields[7], "valor_unitario", line)?,
            imposto_item: parse_decimal(&fields[8], "imposto_item", line)?,
        };

        let numero_nota = &fields[2];
        if let Some(nota) = notas.get_mut(numero_nota) {
            nota.itens.push(item);
            continue;
        }

        let data_emissao = parse_data(&fields[3])
            .ok_or_else(|| AppError::csv(line, format!("data_emissao inválida: '{}'", fields[3])))?;
        notas.insert(
            numero_nota.clone(),
            NovaNota {
                cnpj: fields[0].clone(),
                razao_social: fields[1].clone(),
                numero_nota: numero_nota.clone(),
                data_emissao,
                itens: vec![item],
            },
        );
    }

    Ok(notas.into_values().collect())
}

/// 多出的列只允许为空 (行尾分号)
fn check_columns(fields: &[String], line: u64) -> Result<()> {
    let extra_non_empty = fields.iter().skip(COLUMNS).any(|f| !f.is_empty());
    if fields.len() < COLUMNS || extra_non_empty {
        return Err(AppError::csv(
            line,
            format!("esperadas {} colunas, encontradas {}", COLUMNS, fields.len()),
        ));
    }
    Ok(())
}

/// 仅接受 `[+-]digits[.digits]`, 不接受 `,` 小数点、`_` 分隔和科学计数法
fn parse_decimal(raw: &str, field: &str, line: u64) -> Result<BigDecimal> {
    let invalid = || AppError::csv(line, format!("{} inválido: '{}'", field, raw));

    let digits = raw.strip_prefix(|c| c == '+' || c == '-').unwrap_or(raw);
    let (inteiro, fracao) = digits.split_once('.').unwrap_or((digits, ""));
    let plain = inteiro.len() + fracao.len() > 0
        && inteiro.bytes().all(|b| b.is_ascii_digit())
        && fracao.bytes().all(|b| b.is_ascii_digit());
    if !plain {
        return Err(invalid());
    }
    BigDecimal::from_str(raw).map_err(|_| invalid())
}

fn parse_data(raw: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
